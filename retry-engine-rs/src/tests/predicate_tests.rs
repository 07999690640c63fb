//! Tests for continuation predicate sessions and their failure counts

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio_test::assert_err;

    use crate::operation::returning;
    use crate::{retry, Retry, RetryConfig, RetryError};

    fn counting_predicate(
        answer: bool,
    ) -> (Arc<AtomicUsize>, impl Fn() -> bool + Send + Sync + 'static) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        (calls, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            answer
        })
    }

    fn always_throwing() -> (Arc<AtomicUsize>, impl FnMut() -> Result<u32, usize>) {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        (attempts, move || Err(counter.fetch_add(1, Ordering::SeqCst)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_does_not_retry_if_the_condition_fails() {
        let (predicate_calls, predicate) = counting_predicate(false);
        let (attempts, op) = always_throwing();

        let result = retry(
            returning(op),
            RetryConfig::new(5, Duration::from_millis(2)).with_predicate(predicate),
        )
        .await;

        let err = assert_err!(result);
        assert_eq!(err, RetryError::Declined { failures: 0 });
        assert_eq!(err.failure_count(), Some(0));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(predicate_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_if_the_condition_passes_until_max_attempts() {
        let (predicate_calls, predicate) = counting_predicate(true);
        let (attempts, op) = always_throwing();

        let result = Retry::new(returning(op))
            .max_attempts(5)
            .delay_fn(|_| Duration::from_millis(2))
            .continue_if(predicate)
            .run()
            .await;

        assert_eq!(result, Err(RetryError::Exhausted { failures: 5 }));
        assert_eq!(attempts.load(Ordering::SeqCst), 5);
        // Not consulted once the budget is spent.
        assert_eq!(predicate_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_if_the_condition_passes_until_no_failure() {
        let (predicate_calls, predicate) = counting_predicate(true);
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);

        let result = Retry::new(returning(move || {
            let count = counter.load(Ordering::SeqCst);
            if count == 3 {
                return Ok(count);
            }
            Err(counter.fetch_add(1, Ordering::SeqCst))
        }))
        .max_attempts(5)
        .delay_fn(|_| Duration::from_millis(2))
        .continue_if(predicate)
        .run()
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(predicate_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_condition_fails_after_some_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let (attempts, op) = always_throwing();

        let result = Retry::new(returning(op))
            .max_attempts(10)
            .delay(Duration::from_millis(1))
            .continue_if(move || counter.fetch_add(1, Ordering::SeqCst) < 2)
            .run()
            .await;

        // Two retries were allowed, the third failure was refused.
        assert_eq!(result, Err(RetryError::Declined { failures: 2 }));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_predicate_last_error_is_reported() {
        let (attempts, op) = always_throwing();

        let result = retry(returning(op), RetryConfig::new(5, Duration::from_millis(2))).await;

        assert_eq!(result, Err(RetryError::Operation(4)));
        assert_eq!(attempts.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_predicate_with_single_attempt_is_never_consulted() {
        let (predicate_calls, predicate) = counting_predicate(true);
        let (_, op) = always_throwing();

        let result = retry(
            returning(op),
            RetryConfig::new(1, Duration::from_millis(2)).with_predicate(predicate),
        )
        .await;

        assert_eq!(result, Err(RetryError::Exhausted { failures: 1 }));
        assert_eq!(predicate_calls.load(Ordering::SeqCst), 0);
    }
}
