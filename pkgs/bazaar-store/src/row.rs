//! Untyped rows and conversions to typed records

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, StoreError};

/// A single table row, keyed by column name.
///
/// Timestamps travel as integer microseconds since the Unix epoch so that
/// every backend can order and compare them numerically.
pub type Row = Map<String, Value>;

/// Decode a row into a typed record
pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

/// Encode a typed record into a row. The record must serialize to a JSON object.
pub fn to_row<T: Serialize>(record: &T) -> Result<Row> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::MalformedRow(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

/// Current time in the row timestamp unit
pub fn now_micros() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Profile {
        id: String,
        username: String,
        avatar_url: Option<String>,
    }

    #[test]
    fn test_missing_optional_column_decodes_as_none() {
        let mut row = Row::new();
        row.insert("id".into(), "u1".into());
        row.insert("username".into(), "alice".into());

        let profile: Profile = from_row(row).unwrap();
        assert_eq!(profile.avatar_url, None);
    }

    #[test]
    fn test_to_row_rejects_non_objects() {
        let err = to_row(&42).unwrap_err();
        assert!(matches!(err, StoreError::MalformedRow(_)));
    }
}
