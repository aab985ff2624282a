//! Logger capability handed to predicate evaluation.
//!
//! The engine does not own a logging backend. Callers pass something that
//! implements [`Logger`]; injected scripts receive it as their second argument.

use parking_lot::Mutex;

/// Logging operations available to the engine and to injected scripts.
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards to `tracing` under the `rift_predicates::inject` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(target: "rift_predicates::inject", "{message}");
    }

    fn info(&self, message: &str) {
        tracing::info!(target: "rift_predicates::inject", "{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "rift_predicates::inject", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "rift_predicates::inject", "{message}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Logger that keeps every line in memory. Useful for tests and for callers
/// that attach script output to a debug response.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<(Level, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|(level, _)| *level == Level::Error)
            .map(|(_, line)| line.clone())
            .collect()
    }

    pub(crate) fn push(&self, level: Level, message: &str) {
        self.lines.lock().push((level, message.to_string()));
    }

    /// Replay the buffered lines into another logger, in order.
    pub(crate) fn drain_into(&self, target: &dyn Logger) {
        for (level, line) in self.lines.lock().drain(..) {
            match level {
                Level::Debug => target.debug(&line),
                Level::Info => target.info(&line),
                Level::Warn => target.warn(&line),
                Level::Error => target.error(&line),
            }
        }
    }
}

impl Logger for MemoryLogger {
    fn debug(&self, message: &str) {
        self.push(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.push(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.push(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.push(Level::Error, message);
    }
}
