//! Custom predicates (`inject`) executed in an embedded Rhai engine.
//!
//! The script receives a private copy of the request and a logger object, and
//! must produce a boolean. Scripts cannot reach the file system or network,
//! `eval` is disabled, and every run is bounded by the limits in
//! [`InjectionConfig`](crate::config::InjectionConfig).

use crate::logger::{Level, MemoryLogger};
use std::sync::Arc;

mod rhai_engine;
pub use rhai_engine::Injector;

/// Logger handed to scripts as their second argument.
///
/// Lines are buffered during the run and forwarded to the caller's logger
/// once the script returns, so nothing is lost when the script fails.
#[derive(Clone)]
pub struct ScriptLogger {
    sink: Arc<MemoryLogger>,
}

impl ScriptLogger {
    pub fn new(sink: Arc<MemoryLogger>) -> Self {
        Self { sink }
    }

    /// `debug` is a Rhai keyword function; its result is passed on to the
    /// engine's debug callback, so it returns the message.
    pub fn debug(&mut self, message: String) -> String {
        self.sink.push(Level::Debug, &message);
        message
    }

    pub fn info(&mut self, message: String) {
        self.sink.push(Level::Info, &message);
    }

    pub fn warn(&mut self, message: String) {
        self.sink.push(Level::Warn, &message);
    }

    pub fn error(&mut self, message: String) {
        self.sink.push(Level::Error, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_logger_buffers_lines() {
        let sink = Arc::new(MemoryLogger::new());
        let mut logger = ScriptLogger::new(Arc::clone(&sink));
        assert_eq!(logger.debug("d".to_string()), "d");
        logger.info("i".to_string());
        logger.warn("w".to_string());
        logger.error("e".to_string());

        assert_eq!(
            sink.lines(),
            vec![
                (Level::Debug, "d".to_string()),
                (Level::Info, "i".to_string()),
                (Level::Warn, "w".to_string()),
                (Level::Error, "e".to_string()),
            ]
        );
    }
}
