use serde::{Deserialize, Serialize};

/// Configuration loaded from `~/.benchbook/config.json`.
///
/// Every field has a default, so an empty object (or a missing file) is a
/// valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Database file. `None` means `~/.benchbook/benchbook.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
    /// Length of an exclusive edit lease.
    #[serde(default = "default_exclusive_edit_minutes")]
    pub exclusive_edit_minutes: i64,
}

/// Longest accepted exclusive edit lease: one year.
pub const MAX_EXCLUSIVE_EDIT_MINUTES: i64 = 60 * 24 * 365;

fn default_exclusive_edit_minutes() -> i64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            exclusive_edit_minutes: default_exclusive_edit_minutes(),
        }
    }
}
