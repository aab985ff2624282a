//! Request and predicate value tree.
//!
//! Requests and predicate operands are JSON-shaped. They are converted once
//! into [`Value`] so normalization and comparison can match exhaustively on the
//! variant instead of probing runtime types.

use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// Field name to value mapping. Keys are kept sorted, which makes the
/// serialized form canonical.
pub type Mapping = BTreeMap<String, Value>;

/// A JSON-like value: scalar, ordered sequence, or mapping.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    /// Repeated field (e.g. a query parameter given several times)
    Sequence(Vec<Value>),
    Mapping(Mapping),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a field. Non-mapping values have no fields.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.as_mapping().and_then(|m| m.get(field))
    }

    /// JavaScript-style truthiness, used to decide whether a request tree is
    /// present at all. Empty mappings and sequences are truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
            Value::Text(s) => !s.is_empty(),
            Value::Sequence(_) | Value::Mapping(_) => true,
        }
    }

    /// Textual form of the value. Structured values render as canonical JSON.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Value::Text(s) => Cow::Borrowed(s),
            Value::Null => Cow::Borrowed(""),
            Value::Bool(b) => Cow::Owned(b.to_string()),
            Value::Number(n) => Cow::Owned(n.to_string()),
            Value::Sequence(_) | Value::Mapping(_) => Cow::Owned(self.canonical()),
        }
    }

    /// Canonical JSON serialization: mapping keys sorted, no whitespace.
    pub fn canonical(&self) -> String {
        serde_json::Value::from(self).to_string()
    }

    /// Replace every boolean and number leaf with its string form.
    pub fn stringify_scalars(self) -> Value {
        match self {
            Value::Bool(b) => Value::Text(b.to_string()),
            Value::Number(n) => Value::Text(n.to_string()),
            Value::Sequence(items) => {
                Value::Sequence(items.into_iter().map(Value::stringify_scalars).collect())
            }
            Value::Mapping(map) => Value::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, v.stringify_scalars()))
                    .collect(),
            ),
            other => other,
        }
    }

    /// Sort sequence elements into a deterministic order (by textual form).
    pub(crate) fn sort_sequence(items: &mut [Value]) {
        items.sort_by_cached_key(|v| v.to_text().into_owned());
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(arr) => {
                Value::Sequence(arr.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => {
                Value::Mapping(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Mapping(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        serde_json::Value::from(&value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Mapping> for Value {
    fn from(value: Mapping) -> Self {
        Value::Mapping(value)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_from_json() {
        let value = Value::from(json!({"path": "/test", "query": {"q": ["a", "b"]}, "port": 80}));
        assert_eq!(value.get("path"), Some(&Value::text("/test")));
        assert_eq!(
            value.get("query").and_then(|q| q.get("q")),
            Some(&Value::Sequence(vec![Value::text("a"), Value::text("b")]))
        );
        assert!(matches!(value.get("port"), Some(Value::Number(_))));
        assert_eq!(value.get("missing"), None);
        assert_eq!(Value::text("scalar").get("path"), None);
    }

    #[test]
    fn test_canonical_sorts_keys() {
        let a = Value::from(json!({"b": "1", "a": ["x", {"d": 1, "c": true}]}));
        assert_eq!(a.canonical(), r#"{"a":["x",{"c":true,"d":1}],"b":"1"}"#);
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::text("").is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::from(json!(0)).is_truthy());
        assert!(Value::text("x").is_truthy());
        assert!(Value::Mapping(Mapping::new()).is_truthy());
        assert!(Value::Sequence(vec![]).is_truthy());
    }

    #[test]
    fn test_stringify_scalars() {
        let value = Value::from(json!({"n": 5, "flags": [true, 1.5], "s": "x", "z": null}));
        assert_eq!(
            value.stringify_scalars(),
            Value::from(json!({"n": "5", "flags": ["true", "1.5"], "s": "x", "z": null}))
        );
    }

    #[test]
    fn test_value_serde_roundtrip() {
        let value: Value = serde_json::from_str(r#"{"headers": {"Accept": "text/plain"}}"#).unwrap();
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"headers":{"Accept":"text/plain"}}"#
        );
    }
}
