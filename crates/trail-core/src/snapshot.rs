//! Attribute snapshots of tracked records.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Attribute name to value mapping captured at a point in time.
///
/// Snapshots are replaced wholesale on every lifecycle event, never merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, Value>);

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from a JSON object. Returns `None` for any other value.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(map.into_iter().collect()),
            _ => None,
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Stored text form of an attribute, as it would be written to a trail row.
    pub fn text(&self, name: &str) -> Option<String> {
        self.0.get(name).map(stringify_value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy of this snapshot keeping only attributes accepted by `keep`.
    pub fn retained(&self, mut keep: impl FnMut(&str) -> bool) -> Self {
        self.0
            .iter()
            .filter(|(name, _)| keep(name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Same attribute names and same stored values, ignoring order.
    ///
    /// Values are compared through their stored text form, so `30` and `"30"`
    /// are the same value here.
    pub fn same_values_as(&self, other: &Snapshot) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().all(|(name, value)| {
                other
                    .0
                    .get(name)
                    .is_some_and(|o| stringify_value(o) == stringify_value(value))
            })
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.0.clone().into_iter().collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<BTreeMap<String, Value>> for Snapshot {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl From<serde_json::Map<String, Value>> for Snapshot {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        map.into_iter().collect()
    }
}

/// Text form of an attribute value as stored in `old_value` / `new_value`.
///
/// `null` becomes the empty string, booleans become `"1"` / `"0"`, strings are
/// kept verbatim and anything else is written as compact JSON.
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stringify_value() {
        assert_eq!(stringify_value(&Value::Null), "");
        assert_eq!(stringify_value(&json!(true)), "1");
        assert_eq!(stringify_value(&json!(false)), "0");
        assert_eq!(stringify_value(&json!(31)), "31");
        assert_eq!(stringify_value(&json!(1.5)), "1.5");
        assert_eq!(stringify_value(&json!("Bob")), "Bob");
        assert_eq!(stringify_value(&json!([1, 2])), "[1,2]");
        assert_eq!(stringify_value(&json!({"a": 1})), "{\"a\":1}");
    }

    #[test]
    fn test_same_values_ignores_order_and_representation() {
        let a = Snapshot::new().with("name", "Bob").with("age", 30);
        let b = Snapshot::new().with("age", "30").with("name", "Bob");
        assert!(a.same_values_as(&b));
        assert!(b.same_values_as(&a));
    }

    #[test]
    fn test_same_values_detects_extra_keys() {
        let a = Snapshot::new().with("name", "Bob");
        let b = Snapshot::new().with("name", "Bob").with("age", 30);
        assert!(!a.same_values_as(&b));
        assert!(!b.same_values_as(&a));
    }

    #[test]
    fn test_from_json() {
        let snap = Snapshot::from_json(json!({"id": 1, "name": "Bob"})).unwrap();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.text("id").as_deref(), Some("1"));
        assert!(Snapshot::from_json(json!([1, 2])).is_none());
    }

    #[test]
    fn test_retained() {
        let snap = Snapshot::new().with("a", 1).with("b", 2).with("c", 3);
        let kept = snap.retained(|name| name != "b");
        assert_eq!(kept.names().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(snap.len(), 3);
    }
}
