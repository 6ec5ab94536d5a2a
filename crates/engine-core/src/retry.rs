use futures::future::BoxFuture;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Indicates whether an error should be retried or treated as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retry,
    Stop,
}

/// Result of running an operation under the retry policy.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The error was considered fatal and should bubble up immediately.
    Fatal(E),
    /// The error was retryable, but the configured attempts were exhausted.
    AttemptsExceeded(E),
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal(e) | RetryError::AttemptsExceeded(e) => e,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::for_database()
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: if max_delay.is_zero() {
                base_delay
            } else {
                max_delay
            },
        }
    }

    /// Preset for SQL Server calls: one attempt plus three retries at
    /// 2, 4 and 8 seconds.
    pub fn for_database() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(8),
        }
    }

    /// Executes the operation against `ctx`, retrying errors the
    /// classifier marks as transient until the attempt budget runs
    /// out. The operation borrows `ctx` afresh on every attempt, which
    /// lets callers hold their database connections in it.
    pub async fn run<Ctx, F, T, E, Classifier>(
        &self,
        ctx: &mut Ctx,
        mut op: F,
        classify: Classifier,
    ) -> Result<T, RetryError<E>>
    where
        F: for<'a> FnMut(&'a mut Ctx) -> BoxFuture<'a, Result<T, E>>,
        E: std::fmt::Display,
        Classifier: Fn(&E) -> RetryDisposition,
    {
        let mut attempt = 0;

        loop {
            match op(ctx).await {
                Ok(result) => return Ok(result),
                Err(err) => match classify(&err) {
                    RetryDisposition::Stop => return Err(RetryError::Fatal(err)),
                    RetryDisposition::Retry => {
                        if attempt + 1 >= self.max_attempts {
                            return Err(RetryError::AttemptsExceeded(err));
                        }

                        let delay = self.backoff_delay(attempt);
                        warn!(
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            "transient database error, retrying: {err}"
                        );
                        sleep(delay).await;
                        attempt += 1;
                    }
                },
            }
        }
    }

    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::from_millis(0);
        }

        let factor = 1u128 << attempt.min(6);
        let base_ms = self.base_delay.as_millis();
        let delay_ms = base_ms.saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis());
        Duration::from_millis(capped as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct TestError(&'static str);

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    fn classify(err: &TestError) -> RetryDisposition {
        match err.0 {
            "transient" => RetryDisposition::Retry,
            _ => RetryDisposition::Stop,
        }
    }

    #[tokio::test]
    async fn retries_transient_failure_and_succeeds() {
        let policy = RetryPolicy::new(4, Duration::from_millis(0), Duration::from_millis(0));
        let mut attempts = 0usize;

        let result = policy
            .run(
                &mut attempts,
                |count| {
                    Box::pin(async move {
                        *count += 1;
                        if *count < 3 {
                            Err(TestError("transient"))
                        } else {
                            Ok::<&'static str, TestError>("done")
                        }
                    })
                },
                classify,
            )
            .await;

        assert!(result.is_ok());
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn transient_errors_surface_after_four_attempts() {
        let policy = RetryPolicy::new(4, Duration::from_millis(0), Duration::from_millis(0));
        let mut attempts = 0usize;

        let result = policy
            .run(
                &mut attempts,
                |count| {
                    Box::pin(async move {
                        *count += 1;
                        Err::<(), TestError>(TestError("transient"))
                    })
                },
                classify,
            )
            .await;

        match result {
            Err(RetryError::AttemptsExceeded(TestError(msg))) => assert_eq!(msg, "transient"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(attempts, 4);
    }

    #[tokio::test]
    async fn fatal_errors_are_seen_exactly_once() {
        let policy = RetryPolicy::for_database();
        let mut attempts = 0usize;

        let result = policy
            .run(
                &mut attempts,
                |count| {
                    Box::pin(async move {
                        *count += 1;
                        Err::<(), TestError>(TestError("schema"))
                    })
                },
                classify,
            )
            .await;

        assert!(matches!(result, Err(RetryError::Fatal(_))));
        assert_eq!(attempts, 1);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::for_database();
        assert_eq!(policy.backoff_delay(0), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(8));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(8));
    }
}
