//! Logical operators for combining predicates.
//!
//! Supports Mountebank's logical operators: not, or, and. Nested predicates
//! are resolved through the caller-supplied `resolve`, so combinators and
//! field predicates nest arbitrarily. The first error from a nested predicate
//! is returned unchanged.

use super::Predicate;
use crate::error::Result;

/// Negates the inner predicate.
pub fn not<F>(inner: &Predicate, mut resolve: F) -> Result<bool>
where
    F: FnMut(&Predicate) -> Result<bool>,
{
    Ok(!resolve(inner)?)
}

/// Matches if ANY of the predicates match. Empty is false.
pub fn any<F>(predicates: &[Predicate], mut resolve: F) -> Result<bool>
where
    F: FnMut(&Predicate) -> Result<bool>,
{
    for predicate in predicates {
        if resolve(predicate)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Matches if ALL of the predicates match. Empty is true.
pub fn all<F>(predicates: &[Predicate], mut resolve: F) -> Result<bool>
where
    F: FnMut(&Predicate) -> Result<bool>,
{
    for predicate in predicates {
        if !resolve(predicate)? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PredicateError;
    use serde_json::json;

    fn predicate(path: &str) -> Predicate {
        Predicate::parse(&json!({"equals": {"path": path}})).unwrap()
    }

    /// Resolves true when the predicate's expected path is "/yes".
    fn fake_resolve(predicate: &Predicate) -> Result<bool> {
        let json = predicate.to_json();
        match json["equals"]["path"].as_str() {
            Some("/yes") => Ok(true),
            Some("/error") => Err(PredicateError::validation("boom")),
            _ => Ok(false),
        }
    }

    #[test]
    fn test_logical_not() {
        assert!(!not(&predicate("/yes"), fake_resolve).unwrap());
        assert!(not(&predicate("/no"), fake_resolve).unwrap());
        assert!(not(&predicate("/error"), fake_resolve).is_err());
    }

    #[test]
    fn test_logical_or() {
        assert!(any(&[predicate("/no"), predicate("/yes")], fake_resolve).unwrap());
        assert!(!any(&[predicate("/no"), predicate("/no")], fake_resolve).unwrap());
        assert!(!any(&[], fake_resolve).unwrap());
    }

    #[test]
    fn test_logical_and() {
        assert!(all(&[predicate("/yes"), predicate("/yes")], fake_resolve).unwrap());
        assert!(!all(&[predicate("/yes"), predicate("/no")], fake_resolve).unwrap());
        assert!(all(&[], fake_resolve).unwrap());
    }

    #[test]
    fn test_short_circuit_skips_later_errors() {
        assert!(any(&[predicate("/yes"), predicate("/error")], fake_resolve).unwrap());
        assert!(!all(&[predicate("/no"), predicate("/error")], fake_resolve).unwrap());
        assert!(any(&[predicate("/error"), predicate("/yes")], fake_resolve).is_err());
    }

    #[test]
    fn test_resolution_order() {
        let mut seen = Vec::new();
        let predicates = [predicate("/a"), predicate("/b"), predicate("/yes"), predicate("/c")];
        let matched = any(&predicates, |p| {
            seen.push(p.to_json()["equals"]["path"].clone());
            fake_resolve(p)
        })
        .unwrap();
        assert!(matched);
        assert_eq!(seen, vec![json!("/a"), json!("/b"), json!("/yes")]);
    }
}
