use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures_util::future::BoxFuture;
use rand::Rng;
use serde_json::Value;
use tracing::debug;

use crate::operation::{CryptoService, Direction, ExclusionOptions, OperationError};

const BACKOFF_STEP_MS: u64 = 1_000;
const BACKOFF_JITTER_MS: u64 = 500;

/// Something that can suspend the current task for a while.
///
/// The scheduler and the retry loop only ever wait through this seam.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Bounded retry with linear backoff plus jitter.
///
/// The wait after failed attempt `n` (1-based) is `step * n + random[0, jitter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    step: Duration,
    jitter: Duration,
}

impl RetryPolicy {
    /// A request of zero or fewer attempts still makes one call.
    pub fn new(max_retries: i64) -> Self {
        let max_attempts = max_retries.clamp(1, i64::from(u32::MAX)) as u32;
        Self {
            max_attempts,
            step: Duration::from_millis(BACKOFF_STEP_MS),
            jitter: Duration::from_millis(BACKOFF_JITTER_MS),
        }
    }

    pub fn with_backoff(mut self, step: Duration, jitter: Duration) -> Self {
        self.step = step;
        self.jitter = jitter;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..jitter_ms)
        };
        self.step.saturating_mul(attempt) + Duration::from_millis(jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(i64::from(crate::DEFAULT_MAX_RETRIES))
    }
}

/// Runs `operation` until it succeeds or the policy's attempts are used up,
/// returning the last error in the latter case.
///
/// `operation` receives the 1-based attempt number.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut attempt = 1u32;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if attempt < policy.max_attempts => {
                let delay = policy.backoff_delay(attempt);
                debug!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    backoff_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after failed attempt"
                );
                sleeper.sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                debug!(attempts = attempt, error = %err, "retries exhausted");
                return Err(err);
            }
        }
    }
}

/// Item processor: one remote call per attempt, in the given direction.
pub async fn process_with_retry(
    service: &dyn CryptoService,
    direction: Direction,
    item: &Value,
    policy: &RetryPolicy,
    exclusions: Option<&ExclusionOptions>,
    sleeper: &dyn Sleeper,
) -> Result<Value, OperationError> {
    retry_with_backoff(policy, sleeper, |_| {
        service.call(direction, item, exclusions)
    })
    .await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingSleeper {
        waits: Mutex<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
            self.waits.lock().unwrap().push(duration);
            Box::pin(async {})
        }
    }

    #[test]
    fn test_non_positive_retries_mean_one_attempt() {
        assert_eq!(RetryPolicy::new(0).max_attempts(), 1);
        assert_eq!(RetryPolicy::new(-4).max_attempts(), 1);
        assert_eq!(RetryPolicy::new(3).max_attempts(), 3);
    }

    #[test]
    fn test_backoff_is_linear_with_bounded_jitter() {
        let policy = RetryPolicy::new(5);
        for attempt in 1..=4u32 {
            let delay = policy.backoff_delay(attempt).as_millis() as u64;
            let floor = 1_000 * u64::from(attempt);
            assert!(delay >= floor, "attempt {attempt}: {delay}ms below {floor}ms");
            assert!(delay < floor + 500, "attempt {attempt}: {delay}ms jitter too large");
        }
    }

    #[test]
    fn test_zero_jitter_is_exact() {
        let policy = RetryPolicy::new(2).with_backoff(Duration::from_millis(10), Duration::ZERO);
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_retry_stops_on_first_success() {
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);

        let result: Result<u32, String> =
            retry_with_backoff(&RetryPolicy::new(3), &sleeper, |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err("flaky".to_string())
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(sleeper.waits.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_returns_last_error() {
        let sleeper = RecordingSleeper::default();

        let result: Result<(), String> =
            retry_with_backoff(&RetryPolicy::new(3), &sleeper, |attempt| async move {
                Err(format!("failure {attempt}"))
            })
            .await;

        assert_eq!(result, Err("failure 3".to_string()));
        let waits = sleeper.waits.lock().unwrap();
        assert_eq!(waits.len(), 2);
        assert!(waits[0] >= Duration::from_millis(1_000) && waits[0] < Duration::from_millis(1_500));
        assert!(waits[1] >= Duration::from_millis(2_000) && waits[1] < Duration::from_millis(2_500));
    }
}
