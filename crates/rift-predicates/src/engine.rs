//! Predicate evaluation.
//!
//! [`PredicateEngine`] routes a parsed [`Predicate`] to the field matchers,
//! the logical combinators or the script injector. It holds no per-request
//! state and can be shared across threads.

use crate::config::EngineConfig;
use crate::error::{PredicateError, Result};
use crate::logger::Logger;
use crate::predicate::{deep_equals, field_matcher, logical, Encoding, Operator, Predicate};
use crate::scripting::Injector;
use crate::value::Value;
use tracing::debug;

#[derive(Debug)]
pub struct PredicateEngine {
    config: EngineConfig,
    injector: Injector,
}

impl PredicateEngine {
    pub fn new(config: EngineConfig) -> Self {
        let injector = Injector::new(&config.injection);
        Self { config, injector }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Decide whether `request` satisfies `predicate`.
    ///
    /// Errors are never folded into `false`: a malformed predicate or a failed
    /// script aborts the evaluation, including from inside `not`/`or`/`and`.
    pub fn resolve(
        &self,
        predicate: &Predicate,
        request: &Value,
        encoding: Encoding,
        logger: &dyn Logger,
    ) -> Result<bool> {
        let resolve = |nested: &Predicate| self.resolve(nested, request, encoding, logger);

        let matched = match &predicate.operator {
            Operator::Field(operator, expected) => field_matcher::evaluate(
                *operator,
                expected,
                &predicate.options,
                request,
                encoding,
            )?,
            Operator::DeepEquals(expected) => {
                deep_equals::evaluate(expected, &predicate.options, request, encoding)?
            }
            Operator::Not(inner) => logical::not(inner, resolve)?,
            Operator::Or(predicates) => logical::any(predicates, resolve)?,
            Operator::And(predicates) => logical::all(predicates, resolve)?,
            Operator::Inject(script) => self.inject(script, request, logger)?,
        };

        debug!(
            operator = predicate.operator.key(),
            matched, "Predicate resolved"
        );
        Ok(matched)
    }

    /// Parse a predicate from JSON and resolve it.
    pub fn resolve_json(
        &self,
        predicate: &serde_json::Value,
        request: &Value,
        encoding: Encoding,
        logger: &dyn Logger,
    ) -> Result<bool> {
        let predicate = Predicate::parse(predicate)?;
        self.resolve(&predicate, request, encoding, logger)
    }

    /// Stub matching: every predicate must hold. No predicates match anything.
    pub fn matches_all(
        &self,
        predicates: &[Predicate],
        request: &Value,
        encoding: Encoding,
        logger: &dyn Logger,
    ) -> Result<bool> {
        logical::all(predicates, |predicate| {
            self.resolve(predicate, request, encoding, logger)
        })
    }

    fn inject(&self, script: &str, request: &Value, logger: &dyn Logger) -> Result<bool> {
        if !self.config.allow_injection {
            return Err(PredicateError::validation_with_context(
                "inject predicates are not allowed unless allowInjection is enabled",
                script,
            ));
        }
        self.injector.evaluate(script, request, logger)
    }
}

impl Default for PredicateEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::MemoryLogger;
    use serde_json::json;

    fn resolve(predicate: serde_json::Value, request: serde_json::Value) -> Result<bool> {
        PredicateEngine::default().resolve_json(
            &predicate,
            &Value::from(request),
            Encoding::Text,
            &MemoryLogger::new(),
        )
    }

    fn injecting_engine() -> PredicateEngine {
        PredicateEngine::new(EngineConfig {
            allow_injection: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_dispatch_field_predicates() {
        let request = json!({"method": "GET", "path": "/api/users", "body": "hello"});
        assert!(resolve(json!({"equals": {"method": "get"}}), request.clone()).unwrap());
        assert!(resolve(json!({"startsWith": {"path": "/api"}}), request.clone()).unwrap());
        assert!(resolve(json!({"endsWith": {"path": "users"}}), request.clone()).unwrap());
        assert!(resolve(json!({"contains": {"body": "ell"}}), request.clone()).unwrap());
        assert!(resolve(json!({"matches": {"path": "^/api/\\w+$"}}), request.clone()).unwrap());
        assert!(resolve(json!({"exists": {"body": true}}), request.clone()).unwrap());
        assert!(resolve(json!({"deepEquals": {"path": "/api/users"}}), request).unwrap());
    }

    #[test]
    fn test_dispatch_logical_predicates() {
        let request = json!({"method": "GET", "path": "/test"});
        assert!(resolve(json!({"not": {"equals": {"method": "POST"}}}), request.clone()).unwrap());
        assert!(resolve(
            json!({"or": [{"equals": {"method": "POST"}}, {"equals": {"path": "/test"}}]}),
            request.clone()
        )
        .unwrap());
        assert!(!resolve(
            json!({"and": [{"equals": {"method": "GET"}}, {"equals": {"path": "/other"}}]}),
            request.clone()
        )
        .unwrap());
        assert!(resolve(json!({"and": []}), request.clone()).unwrap());
        assert!(!resolve(json!({"or": []}), request).unwrap());
    }

    #[test]
    fn test_nested_options_apply_to_nested_predicate_only() {
        let request = json!({"path": "/Test"});
        assert!(resolve(
            json!({"not": {"equals": {"path": "/test"}, "caseSensitive": true}}),
            request.clone()
        )
        .unwrap());
        assert!(!resolve(
            json!({"not": {"equals": {"path": "/test"}}, "caseSensitive": true}),
            request
        )
        .unwrap());
    }

    #[test]
    fn test_errors_propagate_through_combinators() {
        let request = json!({"body": "x"});
        let err = resolve(json!({"not": {"matches": {"body": "("}}}), request.clone()).unwrap_err();
        assert!(err.is_validation());
        let err = resolve(
            json!({"or": [{"matches": {"body": "("}}, {"equals": {"body": "x"}}]}),
            request,
        )
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_injection_disabled_by_default() {
        let err = resolve(json!({"inject": "|r, l| true"}), json!({"path": "/"})).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("allowInjection"));
    }

    #[test]
    fn test_injection_when_allowed() {
        let engine = injecting_engine();
        let logger = MemoryLogger::new();
        let request = Value::from(json!({"path": "/inject"}));
        assert!(engine
            .resolve_json(
                &json!({"inject": "|request, logger| request.path == \"/inject\""}),
                &request,
                Encoding::Text,
                &logger,
            )
            .unwrap());

        let err = engine
            .resolve_json(
                &json!({"not": {"inject": "|r, l| { throw \"nope\"; }"}}),
                &request,
                Encoding::Text,
                &logger,
            )
            .unwrap_err();
        assert!(err.is_injection());
        assert_eq!(err.code(), "invalid injection");
    }

    #[test]
    fn test_matches_all() {
        let engine = PredicateEngine::default();
        let logger = MemoryLogger::new();
        let request = Value::from(json!({"method": "GET", "path": "/a"}));
        let stub: Vec<Predicate> = serde_json::from_value(json!([
            {"equals": {"method": "GET"}},
            {"startsWith": {"path": "/a"}}
        ]))
        .unwrap();

        assert!(engine.matches_all(&stub, &request, Encoding::Text, &logger).unwrap());
        assert!(engine.matches_all(&[], &request, Encoding::Text, &logger).unwrap());

        let other = Value::from(json!({"method": "POST", "path": "/a"}));
        assert!(!engine.matches_all(&stub, &other, Encoding::Text, &logger).unwrap());
    }

    #[test]
    fn test_engine_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PredicateEngine>();
    }
}
