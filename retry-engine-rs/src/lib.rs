//! # Retry Engine
//!
//! A retry orchestration engine for fallible operations that may report
//! their result through a settle handle, a returned value or future, or a
//! synchronous error.
//!
//! ## Features
//!
//! - One outcome normalizer for executor-style, direct-return,
//!   future-returning and throwing operations
//! - Attempt budget with constant, per-index or exponential delays
//! - Optional continuation predicate that reports failure counts
//! - Structured logging with per-session correlation IDs
//! - Session metrics through the `metrics` facade
//! - Settings loaded from files and `RETRY_*` environment variables
//!
//! ```no_run
//! use std::time::Duration;
//! use retry_engine_rs::{operation, Retry};
//!
//! # async fn example() {
//! let value = Retry::new(operation::returning(|| Ok::<_, String>(7)))
//!     .max_attempts(3)
//!     .delay(Duration::from_millis(2))
//!     .run()
//!     .await;
//! assert_eq!(value, Ok(7));
//! # }
//! ```

pub mod controller;
pub mod delay;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod operation;
pub mod outcome;
pub mod predicate;
pub mod settings;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use controller::{retry, Retry, RetrySession, SessionState};
pub use delay::{Delay, ExponentialBackoff, DEFAULT_DELAY};
pub use error::{ConfigError, Fault, LoggingError, RetryError, FUNCTION_REQUIRED};
pub use logging::{init_logging, LoggingConfig};
pub use operation::{Operation, Returned, Settle};
pub use outcome::Outcome;
pub use predicate::ContinuationPredicate;
pub use settings::{RetryConfig, RetrySettings, DEFAULT_MAX_ATTEMPTS};

/// Initializes logging with default settings
pub fn init() -> Result<(), LoggingError> {
    init_logging(None)
}

/// Initializes logging from a loaded configuration (`logging.*` keys)
pub fn init_with_config(config: config::Config) -> Result<(), LoggingError> {
    let log_config = config.try_into().ok();
    init_logging(log_config)
}
