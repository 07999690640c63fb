//! # Retry Configuration
//!
//! [`RetryConfig`] is what a session runs with. [`RetrySettings`] is its
//! serializable form, loaded from files and `RETRY_*` environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::delay::{Delay, ExponentialBackoff, DEFAULT_DELAY};
use crate::error::ConfigError;
use crate::predicate::ContinuationPredicate;

/// Attempt budget used when none is configured
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Environment variable prefix for [`RetrySettings`]
pub const ENV_PREFIX: &str = "RETRY";

/// Configuration for one retry session
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of invocations allowed, including the first
    pub max_attempts: usize,

    /// Wait schedule between attempts
    pub delay: Delay,

    /// Optional gate consulted after each failure that still has budget
    pub continue_if: Option<ContinuationPredicate>,

    /// Name used in logs and metric labels
    pub name: String,

    /// Whether to record metrics
    pub record_metrics: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Delay::default(),
            continue_if: None,
            name: "default".to_string(),
            record_metrics: true,
        }
    }
}

impl RetryConfig {
    /// A configuration with the given budget and delay, and no predicate
    pub fn new(max_attempts: usize, delay: impl Into<Delay>) -> Self {
        Self {
            max_attempts,
            delay: delay.into(),
            ..Self::default()
        }
    }

    /// Sets the continuation predicate
    pub fn with_predicate<F>(mut self, f: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.continue_if = Some(ContinuationPredicate::new(f));
        self
    }

    /// Sets the session name
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Checks that the configuration allows at least one attempt
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts);
        }
        if let Delay::Exponential(backoff) = &self.delay {
            backoff.validate()?;
        }
        Ok(())
    }

    /// Builds a validated configuration from loaded settings
    pub fn from_settings(settings: RetrySettings) -> Result<Self, ConfigError> {
        let delay = match settings.backoff {
            Some(backoff) => Delay::exponential(backoff),
            None => Delay::Constant(Duration::from_millis(settings.delay_ms)),
        };

        let config = Self {
            max_attempts: settings.max_attempts,
            delay,
            continue_if: None,
            name: settings.name,
            record_metrics: settings.record_metrics,
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads settings from `.env` and `RETRY_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_settings(RetrySettings::load(None)?)
    }
}

/// Serializable retry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Name used in logs and metric labels
    pub name: String,

    /// Total number of invocations allowed
    pub max_attempts: usize,

    /// Constant delay between attempts, ignored when `backoff` is set
    pub delay_ms: u64,

    /// Exponential backoff schedule
    pub backoff: Option<ExponentialBackoff>,

    /// Whether to record metrics
    pub record_metrics: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_ms: DEFAULT_DELAY.as_millis() as u64,
            backoff: None,
            record_metrics: true,
        }
    }
}

impl RetrySettings {
    /// Loads settings from an optional file, overridden by `RETRY_*` variables
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let cfg = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_config(cfg)
    }

    /// Deserializes settings from an already built configuration
    pub fn from_config(cfg: config::Config) -> Result<Self, ConfigError> {
        let settings: Self = cfg.try_deserialize()?;
        debug!(
            name = %settings.name,
            max_attempts = %settings.max_attempts,
            delay_ms = %settings.delay_ms,
            backoff = ?settings.backoff,
            "Loaded retry settings"
        );
        Ok(settings)
    }
}
