use chrono::{NaiveDate, Utc};
use sha2::{Digest, Sha256};

/// Title given to entities created without one.
pub const UNTITLED: &str = "Untitled";

/// Appended to the title of a duplicated entity.
pub const DUPLICATE_MARKER: &str = " I";

const MAX_TITLE_CHARS: usize = 255;

/// Source of globally unique external identifiers.
pub trait ElabidGenerator {
    fn generate(&self) -> String;
}

/// `YYYYMMDD-` followed by 20 hex chars of SHA-256 over a random UUID.
#[derive(Debug, Default, Clone, Copy)]
pub struct DatedHashGenerator;

impl ElabidGenerator for DatedHashGenerator {
    fn generate(&self) -> String {
        let hash = Sha256::digest(uuid::Uuid::new_v4().as_bytes());
        let hex = hex::encode(hash);
        format!("{}-{}", Utc::now().format("%Y%m%d"), &hex[..20])
    }
}

/// Normalize a user-supplied title: collapse whitespace, cap the length,
/// and fall back to "Untitled" when nothing is left.
pub fn filter_title(input: &str) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return UNTITLED.to_string();
    }
    collapsed.chars().take(MAX_TITLE_CHARS).collect()
}

/// Normalize a tag: trim and collapse inner whitespace. Empty tags are dropped.
pub fn filter_tag(input: &str) -> Option<String> {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}
