use crate::error::{Result, SinkError};
use crate::types::IndexRecord;

/// Structural presence check run before a record is queued.
///
/// Fields are checked in the order `index`, `type`, `body`; the first one
/// missing is reported. Empty strings and JSON `null` count as missing.
pub fn validate_record(record: &IndexRecord) -> Result<()> {
    if record.index.is_empty() {
        return Err(SinkError::Validation { field: "index" });
    }
    if record.doc_type.is_empty() {
        return Err(SinkError::Validation { field: "type" });
    }
    if is_missing(&record.body) {
        return Err(SinkError::Validation { field: "body" });
    }
    Ok(())
}

fn is_missing(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.is_empty(),
        _ => false,
    }
}
