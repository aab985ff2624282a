//! Leaf comparisons shared by the field predicates.
//!
//! Both sides are already normalized when these run, so plain comparisons are
//! enough for everything except `matches`, which carries its own
//! case-insensitivity flag into the regex.

use crate::error::{PredicateError, Result};
use crate::value::Value;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

/// Field predicate operator.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum FieldOperator {
    /// Exact equality
    Equals,
    /// Actual contains expected as a substring
    Contains,
    /// Actual starts with expected
    StartsWith,
    /// Actual ends with expected
    EndsWith,
    /// Expected is a regex that must match actual
    Matches,
    /// Expected `true`: actual is non-empty; `false`: actual is empty
    Exists,
}

impl FieldOperator {
    pub const ALL: [FieldOperator; 6] = [
        FieldOperator::Equals,
        FieldOperator::Contains,
        FieldOperator::StartsWith,
        FieldOperator::EndsWith,
        FieldOperator::Matches,
        FieldOperator::Exists,
    ];

    /// Predicate key for this operator.
    pub fn key(self) -> &'static str {
        match self {
            FieldOperator::Equals => "equals",
            FieldOperator::Contains => "contains",
            FieldOperator::StartsWith => "startsWith",
            FieldOperator::EndsWith => "endsWith",
            FieldOperator::Matches => "matches",
            FieldOperator::Exists => "exists",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.key() == key)
    }

    /// Compare one expected leaf against one actual leaf.
    ///
    /// `case_sensitive` only matters for `matches`; for the other operators
    /// case has already been folded during normalization.
    pub fn test(self, expected: &Value, actual: &Value, case_sensitive: bool) -> Result<bool> {
        let result = match self {
            FieldOperator::Equals => expected == actual,
            FieldOperator::Contains => actual.to_text().contains(&*expected.to_text()),
            FieldOperator::StartsWith => actual.to_text().starts_with(&*expected.to_text()),
            FieldOperator::EndsWith => actual.to_text().ends_with(&*expected.to_text()),
            FieldOperator::Matches => {
                let pattern = expected.to_text();
                let regex = RegexBuilder::new(&pattern)
                    .case_insensitive(!case_sensitive)
                    .build()
                    .map_err(|e| {
                        PredicateError::validation_with_context(
                            "malformed matches predicate pattern",
                            format!("{pattern}: {e}"),
                        )
                    })?;
                regex.is_match(&actual.to_text())
            }
            FieldOperator::Exists => {
                if expected.is_truthy() {
                    !is_empty(actual)
                } else {
                    is_empty(actual)
                }
            }
        };
        Ok(result)
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Text(s) => s.is_empty(),
        Value::Sequence(items) => items.is_empty(),
        Value::Mapping(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
