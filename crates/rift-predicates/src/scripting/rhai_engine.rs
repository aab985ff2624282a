use super::ScriptLogger;
use crate::config::InjectionConfig;
use crate::error::{PredicateError, Result};
use crate::logger::{Logger, MemoryLogger};
use crate::value::Value;
use regex::Regex;
use rhai::{CallFnOptions, Dynamic, Engine, FnPtr, Map, Scope, AST};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

const SCRIPT_TARGET: &str = "rift_predicates::inject";
const MATCHER_FN: &str = "matcher";

/// Runs `inject` predicates.
///
/// The script may be written three ways:
/// - a closure expression: `|request, logger| request.path == "/x"`
/// - a function taking `(request, logger)`: `fn matcher(request, logger) { ... }`
/// - a plain expression over the `request` and `logger` variables in scope
pub struct Injector {
    engine: Engine,
    limits: InjectionConfig,
}

impl Injector {
    pub fn new(limits: &InjectionConfig) -> Self {
        let mut engine = Engine::new();

        engine
            .set_max_operations(limits.max_operations)
            .set_max_call_levels(limits.max_call_levels)
            .set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth)
            .set_max_string_size(limits.max_string_size)
            .set_max_array_size(limits.max_collection_size)
            .set_max_map_size(limits.max_collection_size);
        engine.disable_symbol("eval");

        engine.on_print(|text| debug!(target: SCRIPT_TARGET, "{text}"));
        engine.on_debug(|text, _source, _pos| debug!(target: SCRIPT_TARGET, "{text}"));

        engine
            .register_type_with_name::<ScriptLogger>("Logger")
            .register_fn("debug", ScriptLogger::debug)
            .register_fn("info", ScriptLogger::info)
            .register_fn("warn", ScriptLogger::warn)
            .register_fn("error", ScriptLogger::error);

        Self {
            engine,
            limits: limits.clone(),
        }
    }

    pub fn limits(&self) -> &InjectionConfig {
        &self.limits
    }

    /// Run the matcher against a copy of `request`.
    ///
    /// Lines the script logs are forwarded to `logger` after the run. Any
    /// failure is logged with the script source and request snapshot, then
    /// returned as [`PredicateError::Injection`].
    pub fn evaluate(&self, script: &str, request: &Value, logger: &dyn Logger) -> Result<bool> {
        let buffer = Arc::new(MemoryLogger::new());
        let outcome = self.run(script, request, &buffer);
        buffer.drain_into(logger);

        outcome.map_err(|reason| {
            let snapshot = request.canonical();
            warn!(reason = %reason, "Injected predicate failed");
            logger.error(&format!("injection X=> {reason}"));
            logger.error(&format!("    source: {script}"));
            logger.error(&format!("    scope: {snapshot}"));
            PredicateError::Injection {
                script: script.to_string(),
                snapshot,
                reason,
            }
        })
    }

    fn run(
        &self,
        script: &str,
        request: &Value,
        buffer: &Arc<MemoryLogger>,
    ) -> std::result::Result<bool, String> {
        let ast = self
            .engine
            .compile(script)
            .map_err(|e| format!("Failed to compile script: {e}"))?;

        let request = value_to_dynamic(request);
        let logger = ScriptLogger::new(Arc::clone(buffer));

        let mut scope = Scope::new();
        scope.push("request", request.clone());
        scope.push("logger", logger.clone());

        let result: Dynamic = self
            .engine
            .eval_ast_with_scope(&mut scope, &ast)
            .map_err(|e| format!("Script execution error: {e}"))?;

        let result = if let Some(matcher) = result.clone().try_cast::<FnPtr>() {
            matcher
                .call::<Dynamic>(&self.engine, &ast, (request, logger))
                .map_err(|e| format!("Script execution error: {e}"))?
        } else if result.is_bool() {
            result
        } else if let Some(name) = named_matcher(&ast, script) {
            self.engine
                .call_fn_with_options::<Dynamic>(
                    CallFnOptions::new().eval_ast(false),
                    &mut scope,
                    &ast,
                    name,
                    (request, logger),
                )
                .map_err(|e| format!("Script execution error: {e}"))?
        } else {
            result
        };

        result
            .as_bool()
            .map_err(|type_name| format!("Script must return a boolean, got {type_name}"))
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

/// The script function taking `(request, logger)`: one named `matcher` if
/// present, otherwise the last one defined in `script`. The AST keeps its
/// functions unordered, so definition order comes from the source text.
fn named_matcher(ast: &AST, script: &str) -> Option<String> {
    let candidates: Vec<String> = ast
        .iter_functions()
        .filter(|f| f.params.len() == 2 && !f.name.starts_with("anon$"))
        .map(|f| f.name.to_string())
        .collect();
    if candidates.iter().any(|name| name == MATCHER_FN) {
        return Some(MATCHER_FN.to_string());
    }
    candidates
        .into_iter()
        .max_by_key(|name| definition_offset(script, name))
}

fn definition_offset(script: &str, name: &str) -> Option<usize> {
    Regex::new(&format!(r"\bfn\s+{}\s*\(", regex::escape(name)))
        .ok()?
        .find_iter(script)
        .last()
        .map(|m| m.start())
}

/// Deep copy of a request value as a Rhai value tree.
pub(super) fn value_to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Dynamic::from(i)
            } else if let Some(f) = n.as_f64() {
                Dynamic::from(f)
            } else {
                Dynamic::UNIT
            }
        }
        Value::Text(s) => Dynamic::from(s.clone()),
        Value::Sequence(items) => {
            let vec: Vec<Dynamic> = items.iter().map(value_to_dynamic).collect();
            Dynamic::from(vec)
        }
        Value::Mapping(map) => {
            let mut object = Map::new();
            for (k, v) in map {
                object.insert(k.as_str().into(), value_to_dynamic(v));
            }
            Dynamic::from(object)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::Level;
    use serde_json::json;

    fn request() -> Value {
        Value::from(json!({
            "method": "POST",
            "path": "/orders",
            "query": {"page": "2"},
            "headers": {"X-Id": ["1", "2"]},
            "body": "{\"count\": 5}",
            "count": 5
        }))
    }

    fn inject(script: &str) -> Result<bool> {
        Injector::new(&InjectionConfig::default()).evaluate(
            script,
            &request(),
            &MemoryLogger::new(),
        )
    }

    #[test]
    fn test_closure_matcher() {
        assert!(inject(r#"|request, logger| request.path == "/orders""#).unwrap());
        assert!(!inject(r#"|request, logger| request.method == "GET""#).unwrap());
        assert!(inject(r#"|r, l| r.query.page == "2" && r.count == 5"#).unwrap());
    }

    #[test]
    fn test_named_function_matcher() {
        let script = r#"
            fn matcher(request, logger) {
                request.headers["X-Id"].len() == 2
            }
        "#;
        assert!(inject(script).unwrap());
    }

    #[test]
    fn test_named_matcher_preferred_over_helpers() {
        let helper_first = r#"
            fn same(a, b) { a == b }
            fn check(request, logger) { same(request.method, "POST") }
        "#;
        assert!(inject(helper_first).unwrap());

        let named = r#"
            fn matcher(request, logger) { request.path == "/orders" }
            fn helper(a, b) { false }
        "#;
        assert!(inject(named).unwrap());
    }

    #[test]
    fn test_definition_offset() {
        let script = "fn helper(a, b) { a }\nfn check(r, l) { true }";
        assert_eq!(definition_offset(script, "helper"), Some(0));
        assert!(definition_offset(script, "check") > definition_offset(script, "helper"));
        assert_eq!(definition_offset(script, "missing"), None);
    }

    #[test]
    fn test_expression_over_scope() {
        assert!(inject(r#"request.method == "POST""#).unwrap());
    }

    #[test]
    fn test_throwing_script_is_injection_error() {
        let logger = MemoryLogger::new();
        let err = Injector::new(&InjectionConfig::default())
            .evaluate(r#"|r, l| { throw "boom"; }"#, &request(), &logger)
            .unwrap_err();

        let PredicateError::Injection { script, snapshot, reason } = &err else {
            panic!("expected injection error, got {err:?}");
        };
        assert_eq!(script, r#"|r, l| { throw "boom"; }"#);
        assert!(snapshot.contains("\"path\":\"/orders\""));
        assert!(reason.contains("boom"));

        let errors = logger.errors();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].starts_with("injection X=> "));
        assert!(errors[1].starts_with("    source: "));
        assert!(errors[2].starts_with("    scope: {"));
    }

    #[test]
    fn test_non_boolean_result_fails() {
        let err = inject("|r, l| 42").unwrap_err();
        assert!(err.is_injection());
        assert!(err.to_string().contains("boolean"));
    }

    #[test]
    fn test_compile_error_fails() {
        assert!(inject("|r, l| (").unwrap_err().is_injection());
    }

    #[test]
    fn test_eval_is_disabled() {
        assert!(inject(r#"|r, l| eval("true")"#).unwrap_err().is_injection());
    }

    #[test]
    fn test_operation_limit() {
        let limits = InjectionConfig {
            max_operations: 1_000,
            ..Default::default()
        };
        let err = Injector::new(&limits)
            .evaluate("|r, l| { loop {} }", &request(), &MemoryLogger::new())
            .unwrap_err();
        assert!(err.is_injection());
    }

    #[test]
    fn test_request_is_not_modified() {
        let original = request();
        let result = Injector::new(&InjectionConfig::default())
            .evaluate(
                r#"|request, logger| { request.path = "/changed"; request.query.page = "9"; true }"#,
                &original,
                &MemoryLogger::new(),
            )
            .unwrap();
        assert!(result);
        assert_eq!(original, request());
    }

    #[test]
    fn test_script_logging_is_forwarded() {
        let logger = MemoryLogger::new();
        let matched = Injector::new(&InjectionConfig::default())
            .evaluate(
                r#"|request, logger| { logger.info("saw " + request.path); logger.warn("careful"); true }"#,
                &request(),
                &logger,
            )
            .unwrap();
        assert!(matched);
        assert_eq!(
            logger.lines(),
            vec![
                (Level::Info, "saw /orders".to_string()),
                (Level::Warn, "careful".to_string()),
            ]
        );
    }

    #[test]
    fn test_value_to_dynamic() {
        let dynamic = value_to_dynamic(&Value::from(json!({"a": [1, "x", null], "b": 1.5})));
        let map = dynamic.cast::<Map>();
        let a = map["a"].clone().cast::<Vec<Dynamic>>();
        assert_eq!(a[0].as_int(), Ok(1));
        assert_eq!(a[1].clone().into_string().unwrap(), "x");
        assert!(a[2].is_unit());
        assert_eq!(map["b"].as_float(), Ok(1.5));
    }
}
