//! # Delay Provider
//!
//! Computes how long to wait before the upcoming retry. The index passed in
//! is zero-based: `0` is the first retry after the initial failed attempt.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Delay used when none is configured
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1000);

/// The wait schedule between attempts
#[derive(Clone)]
pub enum Delay {
    /// The same wait before every retry
    Constant(Duration),
    /// A caller-supplied function of the retry index
    Schedule(Arc<dyn Fn(usize) -> Duration + Send + Sync>),
    /// Capped exponential backoff with jitter
    Exponential(ExponentialBackoff),
}

impl Delay {
    /// A constant delay in milliseconds
    pub fn from_millis(millis: u64) -> Self {
        Delay::Constant(Duration::from_millis(millis))
    }

    /// A delay computed from the retry index on every scheduled retry
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(usize) -> Duration + Send + Sync + 'static,
    {
        Delay::Schedule(Arc::new(f))
    }

    /// A capped exponential backoff
    pub fn exponential(backoff: ExponentialBackoff) -> Self {
        Delay::Exponential(backoff)
    }

    /// Returns the wait before retry number `retry` (zero-based)
    pub fn for_retry(&self, retry: usize) -> Duration {
        match self {
            Delay::Constant(delay) => *delay,
            Delay::Schedule(schedule) => schedule(retry),
            Delay::Exponential(backoff) => backoff.for_retry(retry),
        }
    }
}

impl Default for Delay {
    fn default() -> Self {
        Delay::Constant(DEFAULT_DELAY)
    }
}

impl From<Duration> for Delay {
    fn from(delay: Duration) -> Self {
        Delay::Constant(delay)
    }
}

impl fmt::Debug for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delay::Constant(delay) => f.debug_tuple("Constant").field(delay).finish(),
            Delay::Schedule(_) => write!(f, "Schedule(..)"),
            Delay::Exponential(backoff) => f.debug_tuple("Exponential").field(backoff).finish(),
        }
    }
}

/// Exponential backoff parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExponentialBackoff {
    /// Wait before the first retry
    #[serde(with = "millis")]
    pub base: Duration,

    /// Upper bound for any single wait
    #[serde(with = "millis")]
    pub max: Duration,

    /// Jitter factor (0.0 - 1.0) to add randomness to backoff
    #[serde(default)]
    pub jitter: f64,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(100),
            max: Duration::from_secs(30),
            jitter: 0.1,
        }
    }
}

impl ExponentialBackoff {
    /// Checks that the jitter factor is within range and `base <= max`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::InvalidBackoff(format!(
                "jitter {} is outside 0.0..=1.0",
                self.jitter
            )));
        }
        if self.base > self.max {
            return Err(ConfigError::InvalidBackoff(format!(
                "base {:?} exceeds max {:?}",
                self.base, self.max
            )));
        }
        Ok(())
    }

    /// `base * 2^retry`, capped at `max`, with symmetric jitter
    pub fn for_retry(&self, retry: usize) -> Duration {
        let base_ms = self.base.as_millis() as f64;
        let max_ms = self.max.as_millis() as f64;

        if base_ms == 0.0 {
            return Duration::ZERO;
        }

        let exp_backoff = base_ms * 2.0_f64.powi(retry.min(i32::MAX as usize) as i32);
        let capped_backoff = exp_backoff.min(max_ms);

        let jitter_range = capped_backoff * self.jitter;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..jitter_range)
        } else {
            0.0
        };

        Duration::from_millis((capped_backoff + jitter).max(0.0) as u64)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
