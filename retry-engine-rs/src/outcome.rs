//! # Attempt Outcome
//!
//! The uniform result of running an operation once, whichever calling
//! convention the operation used.

use crate::error::Fault;

/// The classified result of a single attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    /// The attempt produced a value
    Success(T),
    /// The attempt failed
    Failure(Fault<E>),
}

impl<T, E> Outcome<T, E> {
    /// Converts the outcome to a standard Result
    pub fn into_result(self) -> Result<T, Fault<E>> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(fault) => Err(fault),
        }
    }

    /// Returns true if the outcome is a success
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Returns true if the outcome is a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    /// Maps a function over the success value
    pub fn map<U, F>(self, f: F) -> Outcome<U, E>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Failure(fault) => Outcome::Failure(fault),
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(err) => Outcome::Failure(Fault::Raised(err)),
        }
    }
}
