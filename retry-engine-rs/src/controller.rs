//! # Retry Controller
//!
//! Owns the attempt loop of one retry session: runs the operation through the
//! normalizer, checks the attempt budget and the continuation predicate,
//! sleeps according to the delay schedule, and settles the final result.

use std::fmt;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tokio::time::sleep;
use tracing::{debug, info, info_span, trace, warn, Instrument};
use uuid::Uuid;

use crate::delay::Delay;
use crate::error::RetryError;
use crate::normalize::run_once;
use crate::operation::Operation;
use crate::outcome::Outcome;
use crate::predicate::ContinuationPredicate;
use crate::settings::RetryConfig;

/// Where a session is in its attempt loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, nothing invoked yet
    Idle,
    /// An attempt is running
    Attempting,
    /// Sleeping before the next attempt
    AwaitingDelay,
    /// An attempt succeeded
    Succeeded,
    /// The budget ran out or the predicate refused another attempt
    Exhausted,
}

impl SessionState {
    /// Returns true for `Succeeded` and `Exhausted`
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Succeeded | SessionState::Exhausted)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Attempting => write!(f, "attempting"),
            SessionState::AwaitingDelay => write!(f, "awaiting_delay"),
            SessionState::Succeeded => write!(f, "succeeded"),
            SessionState::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// The working state of one call to the retry engine
#[derive(Debug)]
pub struct RetrySession<O> {
    id: Uuid,
    operation: Option<O>,
    config: RetryConfig,
    state: SessionState,
    attempts: usize,
    failures: usize,
}

impl<O> RetrySession<O> {
    /// Creates an idle session. A `None` operation fails every attempt with
    /// [`RetryError::FunctionRequired`].
    pub fn new(operation: Option<O>, config: RetryConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
            config,
            state: SessionState::Idle,
            attempts: 0,
            failures: 0,
        }
    }

    /// The correlation id attached to this session's logs
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current state; terminal once `run` has returned
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of invocations started so far
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Number of failed invocations so far
    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs the session to completion. State and counters stay readable
    /// afterwards; running again starts over from `Idle`.
    pub async fn run<T, E>(&mut self) -> Result<T, RetryError<E>>
    where
        O: Operation<T, E>,
        E: fmt::Debug,
    {
        let span = info_span!(
            "retry_session",
            session_id = %self.id,
            name = %self.config.name,
        );

        self.drive().instrument(span).await
    }

    async fn drive<T, E>(&mut self) -> Result<T, RetryError<E>>
    where
        O: Operation<T, E>,
        E: fmt::Debug,
    {
        self.state = SessionState::Idle;
        self.attempts = 0;
        self.failures = 0;

        let start_time = Instant::now();

        let max_attempts = if self.config.max_attempts == 0 {
            warn!("max_attempts is zero, allowing a single attempt");
            1
        } else {
            self.config.max_attempts
        };

        loop {
            self.transition(SessionState::Attempting);
            self.attempts += 1;
            self.record_attempt();

            let fault = match run_once::<T, E, O>(self.operation.as_mut()).await {
                Outcome::Success(value) => {
                    self.transition(SessionState::Succeeded);

                    if self.attempts > 1 {
                        info!(
                            attempt = %self.attempts,
                            duration_ms = %start_time.elapsed().as_millis(),
                            "Operation succeeded after retries"
                        );
                    }

                    self.record_outcome(true, start_time.elapsed());
                    return Ok(value);
                }
                Outcome::Failure(fault) => fault,
            };

            self.failures += 1;

            if self.attempts >= max_attempts {
                self.transition(SessionState::Exhausted);

                warn!(
                    attempt = %self.attempts,
                    max_attempts = %max_attempts,
                    duration_ms = %start_time.elapsed().as_millis(),
                    error = ?fault,
                    "Giving up after exhausting attempts"
                );

                self.record_outcome(false, start_time.elapsed());

                return Err(if self.config.continue_if.is_some() {
                    RetryError::Exhausted {
                        failures: self.failures,
                    }
                } else {
                    fault.into()
                });
            }

            let declined = self
                .config
                .continue_if
                .as_ref()
                .map_or(false, |predicate| !predicate.allows_retry());

            if declined {
                self.transition(SessionState::Exhausted);

                // The refused attempt is not part of the reported count.
                let failures = self.failures - 1;

                warn!(
                    attempt = %self.attempts,
                    failures = %failures,
                    error = ?fault,
                    "Continuation predicate declined another attempt"
                );

                self.record_outcome(false, start_time.elapsed());
                return Err(RetryError::Declined { failures });
            }

            self.transition(SessionState::AwaitingDelay);

            let retry = self.attempts - 1;
            let delay = self.config.delay.for_retry(retry);

            debug!(
                attempt = %self.attempts,
                max_attempts = %max_attempts,
                retry = %retry,
                delay_ms = %delay.as_millis(),
                error = ?fault,
                "Retrying after failure"
            );

            sleep(delay).await;
        }
    }

    fn transition(&mut self, next: SessionState) {
        trace!(from = %self.state, to = %next, "Session state change");
        self.state = next;
    }

    fn record_attempt(&self) {
        if !self.config.record_metrics {
            return;
        }

        counter!("retry.attempts", 1, "name" => self.config.name.clone());
    }

    fn record_outcome(&self, success: bool, duration: Duration) {
        if !self.config.record_metrics {
            return;
        }

        if success {
            counter!("retry.success", 1, "name" => self.config.name.clone());
        } else {
            counter!("retry.failure", 1, "name" => self.config.name.clone());
        }

        histogram!(
            "retry.duration_ms",
            duration.as_millis() as f64,
            "name" => self.config.name.clone()
        );
    }
}

/// Builder for a retry session
#[derive(Debug)]
pub struct Retry<O> {
    operation: Option<O>,
    config: RetryConfig,
}

impl<O> Retry<O> {
    /// Retries `operation` with the default configuration
    pub fn new(operation: O) -> Self {
        Self::from_option(Some(operation))
    }

    /// Like [`Retry::new`], but the operation may be missing
    pub fn from_option(operation: Option<O>) -> Self {
        Self {
            operation,
            config: RetryConfig::default(),
        }
    }

    /// Replaces the whole configuration
    pub fn with_config(mut self, config: RetryConfig) -> Self {
        self.config = config;
        self
    }

    /// Total number of invocations allowed, including the first
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    /// Wait schedule between attempts
    pub fn delay(mut self, delay: impl Into<Delay>) -> Self {
        self.config.delay = delay.into();
        self
    }

    /// Wait computed from the zero-based retry index
    pub fn delay_fn<F>(self, f: F) -> Self
    where
        F: Fn(usize) -> Duration + Send + Sync + 'static,
    {
        self.delay(Delay::from_fn(f))
    }

    /// Gate consulted after each failure that still has budget
    pub fn continue_if<F>(mut self, f: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.config.continue_if = Some(ContinuationPredicate::new(f));
        self
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn record_metrics(mut self, record: bool) -> Self {
        self.config.record_metrics = record;
        self
    }

    /// Builds the session without running it
    pub fn session(self) -> RetrySession<O> {
        RetrySession::new(self.operation, self.config)
    }

    /// Runs the session to completion
    pub async fn run<T, E>(self) -> Result<T, RetryError<E>>
    where
        O: Operation<T, E>,
        E: fmt::Debug,
    {
        let mut session = self.session();
        session.run().await
    }
}

/// Retries `operation` under `config`.
///
/// Resolves with the first successful value. Otherwise rejects with the last
/// attempt's error, or with a failure count when `config.continue_if` is set.
pub async fn retry<T, E, O>(operation: O, config: RetryConfig) -> Result<T, RetryError<E>>
where
    O: Operation<T, E>,
    E: fmt::Debug,
{
    let mut session = RetrySession::new(Some(operation), config);
    session.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::operation::{returning, ReturningFn};

    type Never = ReturningFn<fn() -> Result<u32, String>>;

    #[tokio::test]
    async fn test_retry_success_first_attempt() {
        let result = retry(returning(|| Ok::<_, String>(42)), RetryConfig::default()).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_session_starts_idle() {
        let session = Retry::new(returning(|| Ok::<_, String>(1))).name("state").session();

        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.attempts(), 0);
        assert_eq!(session.config().name, "state");
        assert!(!session.state().is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_state_after_success() {
        let mut calls = 0;
        let mut session = Retry::new(returning(move || {
            calls += 1;
            if calls < 3 {
                Err(format!("count {}", calls))
            } else {
                Ok(calls)
            }
        }))
        .max_attempts(5)
        .delay(Duration::from_millis(1))
        .session();

        assert_eq!(session.run().await, Ok(3));
        assert_eq!(session.state(), SessionState::Succeeded);
        assert!(session.state().is_terminal());
        assert_eq!(session.attempts(), 3);
        assert_eq!(session.failures(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_state_after_exhaustion_and_rerun() {
        let mut session = Retry::new(returning(|| Err::<u32, _>("fail")))
            .max_attempts(3)
            .delay(Duration::from_millis(1))
            .session();

        assert_eq!(session.run().await, Err(RetryError::Operation("fail")));
        assert_eq!(session.state(), SessionState::Exhausted);
        assert_eq!(session.attempts(), 3);
        assert_eq!(session.failures(), 3);

        // A second run starts from zero rather than continuing the count.
        assert_eq!(session.run().await, Err(RetryError::Operation("fail")));
        assert_eq!(session.attempts(), 3);
        assert_eq!(session.failures(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_operation_consumes_budget() {
        let delays = Arc::new(AtomicUsize::new(0));
        let recorded = Arc::clone(&delays);
        let start = tokio::time::Instant::now();

        let mut session = Retry::<Never>::from_option(None)
            .max_attempts(3)
            .delay_fn(move |_| {
                recorded.fetch_add(1, Ordering::SeqCst);
                Duration::from_millis(10)
            })
            .session();

        let result: Result<u32, RetryError<String>> = session.run().await;

        let err = result.unwrap_err();
        assert_eq!(err, RetryError::FunctionRequired);
        assert_eq!(err.to_string().trim(), "Function required");
        assert_eq!(session.attempts(), 3);
        assert_eq!(session.failures(), 3);
        assert_eq!(delays.load(Ordering::SeqCst), 2);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_operation_with_predicate_reports_count() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<u32, RetryError<String>> = Retry::<Never>::from_option(None)
            .max_attempts(3)
            .delay(Duration::from_millis(2))
            .continue_if(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            })
            .run()
            .await;

        assert_eq!(result, Err(RetryError::Exhausted { failures: 3 }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_budget_still_attempts_once() {
        let mut calls = 0;
        let result = Retry::new(returning(|| {
            calls += 1;
            Err::<u32, _>("fail")
        }))
        .max_attempts(0)
        .run()
        .await;

        assert_eq!(result, Err(RetryError::Operation("fail")));
        assert_eq!(calls, 1);
    }
}
