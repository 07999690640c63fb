//! # Error Types
//!
//! Failure values produced by a single attempt ([`Fault`]), terminal errors
//! surfaced by a retry session ([`RetryError`]) and configuration errors
//! ([`ConfigError`]).

use thiserror::Error;

/// Diagnostic used when a session is started without an operation
pub const FUNCTION_REQUIRED: &str = "Function required";

/// The classified failure of one attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault<E> {
    /// The operation raised, failed its settle handle, or its future resolved to an error
    #[error("{0}")]
    Raised(E),

    /// No operation was supplied
    #[error("Function required")]
    FunctionRequired,

    /// Every settle handle was dropped before the attempt settled
    #[error("operation dropped its settle handle without settling")]
    Abandoned,
}

impl<E> Fault<E> {
    /// Returns the operation's own error, if this fault carries one
    pub fn into_raised(self) -> Option<E> {
        match self {
            Fault::Raised(err) => Some(err),
            _ => None,
        }
    }
}

/// The terminal error of a retry session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError<E> {
    /// The last attempt failed with the operation's own error
    #[error("{0}")]
    Operation(E),

    /// No operation was supplied
    #[error("Function required")]
    FunctionRequired,

    /// The last attempt abandoned its settle handle
    #[error("operation dropped its settle handle without settling")]
    Abandoned,

    /// The continuation predicate refused another attempt.
    ///
    /// `failures` counts the failed attempts before the one that triggered
    /// the refusal.
    #[error("retry declined after {failures} failed attempts")]
    Declined { failures: usize },

    /// The attempt budget ran out while a continuation predicate was configured
    #[error("retry exhausted after {failures} failed attempts")]
    Exhausted { failures: usize },
}

impl<E> RetryError<E> {
    /// The failure count carried by predicate-driven terminations
    pub fn failure_count(&self) -> Option<usize> {
        match self {
            RetryError::Declined { failures } | RetryError::Exhausted { failures } => {
                Some(*failures)
            }
            _ => None,
        }
    }

    /// Returns the operation's own error, if the session ended with one
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            RetryError::Operation(err) => Some(err),
            _ => None,
        }
    }

    /// Returns true if this error was produced by the continuation predicate path
    pub fn is_counted(&self) -> bool {
        self.failure_count().is_some()
    }
}

impl<E> From<Fault<E>> for RetryError<E> {
    fn from(fault: Fault<E>) -> Self {
        match fault {
            Fault::Raised(err) => RetryError::Operation(err),
            Fault::FunctionRequired => RetryError::FunctionRequired,
            Fault::Abandoned => RetryError::Abandoned,
        }
    }
}

/// Errors raised while building or loading a retry configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `max_attempts` must allow at least the initial attempt
    #[error("max_attempts must be greater than zero")]
    InvalidMaxAttempts,

    /// Backoff parameters are out of range
    #[error("invalid backoff: {0}")]
    InvalidBackoff(String),

    /// The configuration sources could not be read or deserialized
    #[error("failed to load retry settings: {0}")]
    Load(#[from] config::ConfigError),
}

/// Errors raised while installing the logging subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    /// A global subscriber was already installed by someone else
    #[error("failed to set global subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    /// File output was requested without a directory
    #[error("file output requires logging.log_dir")]
    MissingLogDir,
}
