//! Field predicates: equals, contains, startsWith, endsWith, matches, exists.
//!
//! The expected operand is a mapping shaped like the request. Every field it
//! names must be satisfied by the corresponding request field, recursing into
//! nested mappings. A multi-valued request field is satisfied when any of its
//! values is.

use super::normalize::Normalizer;
use super::options::{Encoding, PredicateOptions};
use super::string_matcher::FieldOperator;
use crate::error::{PredicateError, Result};
use crate::value::{Mapping, Value};
use std::borrow::Cow;

/// Evaluate a field predicate against a request.
pub fn evaluate(
    operator: FieldOperator,
    expected: &Value,
    options: &PredicateOptions,
    request: &Value,
    encoding: Encoding,
) -> Result<bool> {
    // Case folding would mangle regex metacharacters such as \S or \W, so
    // `matches` normalizes case-sensitively and lets the regex flag decide.
    let regex_options;
    let normalize_options = if operator == FieldOperator::Matches {
        if encoding.is_binary() {
            return Err(PredicateError::validation(
                "the matches predicate is not allowed in binary mode",
            ));
        }
        regex_options = options.case_sensitive();
        &regex_options
    } else {
        options
    };

    let normalizer = Normalizer::new(normalize_options, encoding)?;
    let expected = normalizer.expected(expected)?;
    let actual = normalizer.actual(request)?;

    let expected = match expected {
        Some(Value::Mapping(expected)) => expected,
        other => {
            return Err(PredicateError::validation_with_context(
                format!("the {} predicate requires an object", operator.key()),
                format!("{other:?}"),
            ))
        }
    };

    let case_sensitive = options.case_sensitive;
    satisfied(&expected, actual.as_ref(), &|expected, actual| {
        operator.test(expected, actual, case_sensitive)
    })
}

/// A request field that is missing (or null) compares as the empty string.
pub fn missing_as_empty(actual: Option<&Value>) -> Cow<'_, Value> {
    match actual {
        None | Some(Value::Null) => Cow::Owned(Value::Text(String::new())),
        Some(value) => Cow::Borrowed(value),
    }
}

/// Every expected field must be satisfied by `actual`. An absent or falsy
/// `actual` satisfies nothing.
pub(crate) fn satisfied<F>(expected: &Mapping, actual: Option<&Value>, test: &F) -> Result<bool>
where
    F: Fn(&Value, &Value) -> Result<bool>,
{
    let Some(actual) = actual.filter(|value| value.is_truthy()) else {
        return Ok(false);
    };

    for (field, expected_value) in expected {
        if !field_satisfied(expected_value, actual.get(field), test)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn field_satisfied<F>(expected: &Value, actual: Option<&Value>, test: &F) -> Result<bool>
where
    F: Fn(&Value, &Value) -> Result<bool>,
{
    match (expected, actual) {
        // Existential: any value of a repeated field may satisfy the expectation
        (_, Some(Value::Sequence(items))) if !matches!(expected, Value::Sequence(_)) => {
            for item in items {
                if element_satisfied(expected, item, test)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        (Value::Mapping(fields), _) => satisfied(fields, actual, test),
        // Every expected value must be found in the actual field
        (Value::Sequence(expected_items), _) => {
            for expected_item in expected_items {
                if !field_satisfied(expected_item, actual, test)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => test(expected, &missing_as_empty(actual)),
    }
}

fn element_satisfied<F>(expected: &Value, item: &Value, test: &F) -> Result<bool>
where
    F: Fn(&Value, &Value) -> Result<bool>,
{
    match expected {
        Value::Mapping(fields) => satisfied(fields, Some(item), test),
        _ => test(expected, item),
    }
}
