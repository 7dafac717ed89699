//! Upstream result normalization.
//!
//! Ledger getters answer with arrays, JSON-encoded strings, bare objects or
//! nothing at all. Everything downstream works on `Option<Vec<Value>>`:
//! `None` means the call produced no result, `Some(vec![])` means it
//! succeeded with zero matches.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Unable to parse upstream result: {0}")]
pub struct NormalizeError(#[from] serde_json::Error);

/// Normalize an upstream value into an ordered record sequence.
pub fn normalize(value: Value) -> Result<Option<Vec<Value>>, NormalizeError> {
    match value {
        Value::Null => Ok(None),
        Value::Array(records) => Ok(Some(records)),
        Value::String(text) => match serde_json::from_str::<Value>(&text)? {
            Value::Null => Ok(None),
            Value::Array(records) => Ok(Some(records)),
            record => Ok(Some(vec![record])),
        },
        record => Ok(Some(vec![record])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_array_is_returned_unchanged() {
        let records = normalize(json!([3, 1, 2])).unwrap().unwrap();
        assert_eq!(records, vec![json!(3), json!(1), json!(2)]);
    }

    #[test]
    fn test_json_array_string() {
        let records = normalize(json!(r#"[{"key":"k1"},{"key":"k2"}]"#)).unwrap().unwrap();
        assert_eq!(records, vec![json!({"key": "k1"}), json!({"key": "k2"})]);
    }

    #[test]
    fn test_json_object_string() {
        let records = normalize(json!(r#"{"key":"k1","value":42}"#)).unwrap().unwrap();
        assert_eq!(records, vec![json!({"key": "k1", "value": 42})]);
    }

    #[test]
    fn test_bare_object_is_wrapped() {
        let records = normalize(json!({"height": 10})).unwrap().unwrap();
        assert_eq!(records, vec![json!({"height": 10})]);
    }

    #[test]
    fn test_absent_differs_from_empty() {
        assert_eq!(normalize(Value::Null).unwrap(), None);
        assert_eq!(normalize(json!([])).unwrap(), Some(vec![]));
        assert_eq!(normalize(json!("[]")).unwrap(), Some(vec![]));
        assert_eq!(normalize(json!("null")).unwrap(), None);
    }

    #[test]
    fn test_unparseable_string_is_an_error() {
        let err = normalize(json!("not json")).unwrap_err();
        assert!(err.to_string().starts_with("Unable to parse upstream result"));
    }
}
