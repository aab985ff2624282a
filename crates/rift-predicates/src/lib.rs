//! Mountebank-compatible predicate engine.
//!
//! Decides whether a request recorded against a virtual service satisfies a
//! declarative predicate: field comparisons (equals, deepEquals, contains,
//! startsWith, endsWith, matches, exists), logical combinators (not, or, and)
//! and sandboxed script predicates (inject).
//!
//! ```
//! use rift_predicates::{Encoding, PredicateEngine, TracingLogger, Value};
//! use serde_json::json;
//!
//! let engine = PredicateEngine::default();
//! let request = Value::from(json!({"method": "GET", "path": "/Orders"}));
//! let matched = engine
//!     .resolve_json(
//!         &json!({"equals": {"path": "/orders"}}),
//!         &request,
//!         Encoding::Text,
//!         &TracingLogger,
//!     )
//!     .unwrap();
//! assert!(matched);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod logger;
pub mod predicate;
pub mod request;
pub mod scripting;
pub mod value;

pub use config::{EngineConfig, InjectionConfig};
pub use engine::PredicateEngine;
pub use error::{ConfigError, PredicateError, Result};
pub use logger::{Level, Logger, MemoryLogger, TracingLogger};
pub use predicate::{Encoding, FieldOperator, Operator, Predicate, PredicateOptions};
pub use request::{parse_query_string, HttpRequest, TcpRequest};
pub use value::{Mapping, Value};
