//! Error types for predicate evaluation and engine configuration.

use std::path::PathBuf;

/// Result alias used throughout the predicate engine.
pub type Result<T, E = PredicateError> = std::result::Result<T, E>;

/// Errors raised while parsing or evaluating a predicate.
///
/// A malformed rule is never reported as a non-match: every failure aborts the
/// evaluation and reaches the caller as one of these variants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredicateError {
    /// The predicate (or its combination with the request encoding) is invalid.
    #[error("{message}")]
    Validation {
        message: String,
        /// Offending selector, pattern or predicate source, when available
        context: Option<String>,
    },

    /// A custom `inject` predicate failed to compile or execute.
    #[error("invalid predicate injection: {reason}")]
    Injection {
        /// Script text that was evaluated
        script: String,
        /// JSON snapshot of the request the script received
        snapshot: String,
        /// Underlying failure message
        reason: String,
    },
}

impl PredicateError {
    pub fn validation(message: impl Into<String>) -> Self {
        PredicateError::Validation {
            message: message.into(),
            context: None,
        }
    }

    pub fn validation_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        PredicateError::Validation {
            message: message.into(),
            context: Some(context.into()),
        }
    }

    /// Mountebank-compatible error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            PredicateError::Validation { .. } => "bad data",
            PredicateError::Injection { .. } => "invalid injection",
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, PredicateError::Validation { .. })
    }

    pub fn is_injection(&self) -> bool {
        matches!(self, PredicateError::Injection { .. })
    }
}

/// Errors raised while loading an engine configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}
