//! Deep equality predicate.
//!
//! Unlike `equals`, `deepEquals` requires an EXACT match of each top-level
//! field it names:
//! - nested mappings must have the same keys and values, no extras
//! - repeated fields must have the same values (in any order)
//!
//! Numbers and booleans are compared as strings on both sides, so a query
//! string `"5"` equals a JSON body `5`.

use super::normalize::Normalizer;
use super::options::{Encoding, PredicateOptions};
use crate::error::{PredicateError, Result};
use crate::value::Value;

/// Evaluate a `deepEquals` predicate against a request.
pub fn evaluate(
    expected: &Value,
    options: &PredicateOptions,
    request: &Value,
    encoding: Encoding,
) -> Result<bool> {
    let normalizer = Normalizer::new(options, encoding)?;
    let expected = normalizer.expected(&expected.clone().stringify_scalars())?;
    let actual = normalizer.actual(&request.clone().stringify_scalars())?;

    let expected = match expected {
        Some(Value::Mapping(expected)) => expected,
        other => {
            return Err(PredicateError::validation_with_context(
                "the deepEquals predicate requires an object",
                format!("{other:?}"),
            ))
        }
    };

    Ok(expected.iter().all(|(field, expected_value)| {
        actual
            .as_ref()
            .and_then(|actual| actual.get(field))
            .is_some_and(|actual_value| actual_value.canonical() == expected_value.canonical())
    }))
}
