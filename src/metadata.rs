//! Structured extra fields stored as a JSON object in the `metadata` column.
//!
//! ```json
//! {"extra_fields": {"Sample": {"type": "text", "value": "S-12",
//!                              "blank_value_on_duplicate": true}}}
//! ```

use serde_json::{Map, Value};

pub const EXTRA_FIELDS_KEY: &str = "extra_fields";
pub const BLANK_ON_DUPLICATE_KEY: &str = "blank_value_on_duplicate";

/// Validate a metadata blob: it must be a JSON object.
pub fn validate(raw: &str) -> Result<(), String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(_)) => Ok(()),
        Ok(_) => Err("Metadata must be a JSON object".to_string()),
        Err(e) => Err(format!("Invalid metadata JSON: {e}")),
    }
}

/// Reset the value of every extra field flagged `blank_value_on_duplicate`.
///
/// Field definitions and every other key are kept. A blob that is not
/// valid JSON is returned untouched.
pub fn blank_extra_fields_on_duplicate(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    let mut value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("Metadata is not valid JSON, copying verbatim: {e}");
            return Some(raw.to_string());
        }
    };

    if let Some(fields) = value
        .get_mut(EXTRA_FIELDS_KEY)
        .and_then(Value::as_object_mut)
    {
        for field in fields.values_mut() {
            if let Some(obj) = field.as_object_mut() {
                if is_flagged(obj) {
                    obj.insert("value".to_string(), Value::String(String::new()));
                }
            }
        }
    }

    Some(value.to_string())
}

fn is_flagged(field: &Map<String, Value>) -> bool {
    match field.get(BLANK_ON_DUPLICATE_KEY) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => s == "1" || s == "true",
        _ => false,
    }
}
