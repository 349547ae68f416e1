//! Primary keys of tracked records.

use crate::snapshot::stringify_value;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Primary key of a tracked record, either a single value or a set of columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordKey {
    Scalar(Value),
    Composite(BTreeMap<String, Value>),
}

impl RecordKey {
    pub fn scalar(value: impl Into<Value>) -> Self {
        Self::Scalar(value.into())
    }

    pub fn composite<K, V>(columns: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Composite(
            columns
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Key from primary key columns, collapsing a single column to a scalar.
    pub fn from_columns(mut columns: BTreeMap<String, Value>) -> Self {
        if columns.len() == 1 {
            if let Some((_, value)) = columns.pop_first() {
                return Self::Scalar(value);
            }
        }
        Self::Composite(columns)
    }

    /// Key from a JSON value: objects become composite keys, anything else is scalar.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Composite(map.into_iter().collect()),
            other => Self::Scalar(other),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Composite(_))
    }

    /// Text stored in the `model_id` column.
    ///
    /// Scalars are written as-is, composite keys as a JSON object with column
    /// names in sorted order, so the same key always yields the same text.
    pub fn normalized(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Scalar(value) => Ok(stringify_value(value)),
            Self::Composite(columns) => serde_json::to_string(columns),
        }
    }
}

impl From<i32> for RecordKey {
    fn from(value: i32) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<i64> for RecordKey {
    fn from(value: i64) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<u64> for RecordKey {
    fn from(value: u64) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<&str> for RecordKey {
    fn from(value: &str) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<String> for RecordKey {
    fn from(value: String) -> Self {
        Self::Scalar(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_passes_through() {
        assert_eq!(RecordKey::from(7).normalized().unwrap(), "7");
        assert_eq!(RecordKey::from("abc-1").normalized().unwrap(), "abc-1");
    }

    #[test]
    fn test_composite_is_sorted_json() {
        let a = RecordKey::composite([("user_id", json!(3)), ("group_id", json!(9))]);
        let b = RecordKey::composite([("group_id", json!(9)), ("user_id", json!(3))]);
        assert_eq!(a.normalized().unwrap(), r#"{"group_id":9,"user_id":3}"#);
        assert_eq!(a.normalized().unwrap(), b.normalized().unwrap());
    }

    #[test]
    fn test_from_columns_collapses_single_column() {
        let mut cols = BTreeMap::new();
        cols.insert("id".to_string(), json!(12));
        assert_eq!(RecordKey::from_columns(cols.clone()), RecordKey::scalar(12));

        cols.insert("tenant".to_string(), json!("acme"));
        assert!(RecordKey::from_columns(cols).is_composite());
    }

    #[test]
    fn test_from_json() {
        assert!(RecordKey::from_json(json!({"a": 1, "b": 2})).is_composite());
        assert_eq!(RecordKey::from_json(json!(5)), RecordKey::scalar(5));
    }
}
