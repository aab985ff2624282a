//! Mountebank-compatible predicate model.
//!
//! A predicate is authored as a JSON object with exactly one operator key
//! (equals, deepEquals, contains, startsWith, endsWith, matches, exists, not,
//! or, and, inject) plus optional parameters (caseSensitive, except, xpath,
//! jsonpath). It is parsed once into [`Predicate`]; evaluation then matches
//! exhaustively on [`Operator`] and never looks at the raw JSON again.
//!
//! # Module Structure
//!
//! - `options` - Predicate parameters and request encoding
//! - `normalize` - Decoding, except stripping, case folding, selection
//! - `selector` - XPath and JSONPath selection
//! - `string_matcher` - Leaf comparisons (equals, contains, startsWith, etc.)
//! - `field_matcher` - Field-by-field evaluation of the expected mapping
//! - `deep_equals` - Exact equality of named fields
//! - `logical` - Logical operators (NOT, OR, AND)

pub mod deep_equals;
pub mod field_matcher;
pub mod logical;
mod normalize;
mod options;
mod selector;
mod string_matcher;

pub use field_matcher::missing_as_empty;
pub use options::{Encoding, JsonPathSelector, PredicateOptions, XPathSelector};
pub use selector::{select_jsonpath, select_xpath};
pub use string_matcher::FieldOperator;

use crate::error::{PredicateError, Result};
use crate::value::Value;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A parsed predicate: one operator plus the parameters that modify it.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub operator: Operator,
    pub options: PredicateOptions,
}

/// Predicate operator with its operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    /// equals, contains, startsWith, endsWith, matches, exists
    Field(FieldOperator, Value),
    DeepEquals(Value),
    Not(Box<Predicate>),
    Or(Vec<Predicate>),
    And(Vec<Predicate>),
    /// Rhai source of a `(request, logger) -> bool` matcher
    Inject(String),
}

impl Operator {
    /// Predicate key this operator is written as.
    pub fn key(&self) -> &'static str {
        match self {
            Operator::Field(op, _) => op.key(),
            Operator::DeepEquals(_) => "deepEquals",
            Operator::Not(_) => "not",
            Operator::Or(_) => "or",
            Operator::And(_) => "and",
            Operator::Inject(_) => "inject",
        }
    }

    fn operand(&self) -> serde_json::Value {
        match self {
            Operator::Field(_, expected) | Operator::DeepEquals(expected) => {
                serde_json::Value::from(expected)
            }
            Operator::Not(inner) => inner.to_json(),
            Operator::Or(predicates) | Operator::And(predicates) => {
                serde_json::Value::Array(predicates.iter().map(Predicate::to_json).collect())
            }
            Operator::Inject(script) => serde_json::Value::String(script.clone()),
        }
    }
}

impl Predicate {
    pub fn new(operator: Operator) -> Self {
        Self {
            operator,
            options: PredicateOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PredicateOptions) -> Self {
        self.options = options;
        self
    }

    /// Field predicate from a JSON-shaped expected mapping.
    pub fn field(operator: FieldOperator, expected: serde_json::Value) -> Self {
        Self::new(Operator::Field(operator, Value::from(expected)))
    }

    pub fn not(inner: Predicate) -> Self {
        Self::new(Operator::Not(Box::new(inner)))
    }

    pub fn or(predicates: Vec<Predicate>) -> Self {
        Self::new(Operator::Or(predicates))
    }

    pub fn and(predicates: Vec<Predicate>) -> Self {
        Self::new(Operator::And(predicates))
    }

    /// Parse a predicate from its JSON form.
    ///
    /// Keys are scanned in document order and the first recognized operator
    /// wins. Operand shapes and parameters are validated here, so a parsed
    /// predicate can only fail at evaluation time because of the request.
    pub fn parse(source: &serde_json::Value) -> Result<Self> {
        let object = source.as_object().ok_or_else(|| {
            PredicateError::validation_with_context(
                "predicate must be an object",
                source.to_string(),
            )
        })?;

        let options: PredicateOptions = serde_json::from_value(source.clone()).map_err(|e| {
            PredicateError::validation_with_context(
                format!("malformed predicate parameters: {e}"),
                source.to_string(),
            )
        })?;
        if let Some(except) = options.except.as_deref() {
            Regex::new(except).map_err(|e| {
                PredicateError::validation_with_context(
                    "malformed except pattern",
                    format!("{except}: {e}"),
                )
            })?;
        }

        for (key, operand) in object {
            if let Some(operator) = parse_operator(key, operand)? {
                return Ok(Self { operator, options });
            }
        }

        let keys: Vec<&String> = object.keys().collect();
        Err(PredicateError::validation_with_context(
            format!(
                "missing predicate: {}",
                serde_json::to_string(&keys).unwrap_or_default()
            ),
            source.to_string(),
        ))
    }

    /// JSON form of the predicate: operator key first, then parameters.
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        object.insert(self.operator.key().to_string(), self.operator.operand());
        if let Ok(serde_json::Value::Object(options)) = serde_json::to_value(&self.options) {
            object.extend(options);
        }
        serde_json::Value::Object(object)
    }
}

fn parse_operator(key: &str, operand: &serde_json::Value) -> Result<Option<Operator>> {
    let operator = match key {
        "deepEquals" => Operator::DeepEquals(expect_object(key, operand)?),
        "not" => {
            if !operand.is_object() {
                return Err(shape_error(key, "an object", operand));
            }
            Operator::Not(Box::new(Predicate::parse(operand)?))
        }
        "or" | "and" => {
            let items = operand
                .as_array()
                .ok_or_else(|| shape_error(key, "an array", operand))?;
            let predicates = items
                .iter()
                .map(Predicate::parse)
                .collect::<Result<Vec<_>>>()?;
            if key == "or" {
                Operator::Or(predicates)
            } else {
                Operator::And(predicates)
            }
        }
        "inject" => {
            let script = operand
                .as_str()
                .ok_or_else(|| shape_error(key, "a string", operand))?;
            Operator::Inject(script.to_string())
        }
        _ => match FieldOperator::from_key(key) {
            Some(op) => Operator::Field(op, expect_object(key, operand)?),
            None => return Ok(None),
        },
    };
    Ok(Some(operator))
}

fn expect_object(key: &str, operand: &serde_json::Value) -> Result<Value> {
    if operand.is_object() {
        Ok(Value::from(operand.clone()))
    } else {
        Err(shape_error(key, "an object", operand))
    }
}

fn shape_error(key: &str, shape: &str, operand: &serde_json::Value) -> PredicateError {
    PredicateError::validation_with_context(
        format!("the {key} predicate requires {shape}"),
        operand.to_string(),
    )
}

impl TryFrom<&serde_json::Value> for Predicate {
    type Error = PredicateError;

    fn try_from(value: &serde_json::Value) -> Result<Self> {
        Predicate::parse(value)
    }
}

impl TryFrom<serde_json::Value> for Predicate {
    type Error = PredicateError;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        Predicate::parse(&value)
    }
}

impl<'de> Deserialize<'de> for Predicate {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let source = serde_json::Value::deserialize(deserializer)?;
        Predicate::parse(&source).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Predicate {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_field_predicate() {
        let predicate =
            Predicate::parse(&json!({"equals": {"path": "/test"}, "caseSensitive": true})).unwrap();
        assert_eq!(
            predicate.operator,
            Operator::Field(FieldOperator::Equals, Value::from(json!({"path": "/test"})))
        );
        assert!(predicate.options.case_sensitive);
    }

    #[test]
    fn test_parse_nested_logical() {
        let predicate = Predicate::parse(&json!({
            "or": [
                {"startsWith": {"path": "/api"}},
                {"not": {"exists": {"body": true}}}
            ]
        }))
        .unwrap();
        let Operator::Or(items) = &predicate.operator else {
            panic!("expected or, got {:?}", predicate.operator);
        };
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1].operator, Operator::Not(_)));
    }

    #[test]
    fn test_first_operator_in_document_order_wins() {
        let predicate =
            Predicate::parse(&json!({"contains": {"path": "a"}, "equals": {"path": "b"}})).unwrap();
        assert_eq!(predicate.operator.key(), "contains");
    }

    #[test]
    fn test_unknown_operator_names_keys() {
        let err = Predicate::parse(&json!({"bogus": "x"})).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), r#"missing predicate: ["bogus"]"#);

        let err = Predicate::parse(&json!({"caseSensitive": true})).unwrap_err();
        assert_eq!(err.to_string(), r#"missing predicate: ["caseSensitive"]"#);
    }

    #[test]
    fn test_operand_shapes_are_checked() {
        for source in [
            json!({"equals": "x"}),
            json!({"deepEquals": ["x"]}),
            json!({"not": []}),
            json!({"or": {"equals": {}}}),
            json!({"inject": 42}),
            json!({"equals": {}, "xpath": "//a"}),
            json!({"equals": {}, "except": "("}),
            json!("equals"),
        ] {
            let err = Predicate::parse(&source).unwrap_err();
            assert!(err.is_validation(), "{source}: {err:?}");
        }
    }

    #[test]
    fn test_nested_errors_propagate() {
        let err = Predicate::parse(&json!({"and": [{"equals": {}}, {"bogus": 1}]})).unwrap_err();
        assert_eq!(err.to_string(), r#"missing predicate: ["bogus"]"#);
    }

    #[test]
    fn test_to_json_round_trip() {
        let source = json!({
            "not": {"matches": {"body": "^a"}, "except": "\\d"},
            "caseSensitive": true
        });
        let predicate = Predicate::parse(&source).unwrap();
        assert_eq!(predicate.to_json(), source);
    }

    #[test]
    fn test_serde_integration() {
        let predicates: Vec<Predicate> =
            serde_json::from_str(r#"[{"equals": {"method": "GET"}}, {"inject": "|r, l| true"}]"#)
                .unwrap();
        assert_eq!(predicates[1].operator, Operator::Inject("|r, l| true".to_string()));

        let err = serde_json::from_str::<Predicate>(r#"{"nope": 1}"#).unwrap_err();
        assert!(err.to_string().contains("missing predicate"));

        let json = serde_json::to_value(&predicates[0]).unwrap();
        assert_eq!(json, json!({"equals": {"method": "GET"}}));
    }

    #[test]
    fn test_builders() {
        let predicate = Predicate::not(Predicate::field(FieldOperator::Exists, json!({"body": true})));
        assert_eq!(predicate.to_json(), json!({"not": {"exists": {"body": true}}}));
        assert_eq!(Predicate::or(vec![]).to_json(), json!({"or": []}));
        assert_eq!(Predicate::and(vec![]).operator.key(), "and");
    }
}
