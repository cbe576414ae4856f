//! Retry strategies for upstream requests.

use std::future::Future;
use std::time::Duration;

use dashboard_core::error::{DashboardError, DashboardResult};
use rand::Rng;
use tracing::{debug, warn};

/// Trait for retry strategies.
pub trait RetryStrategy: Send + Sync {
    /// Returns the delay before retrying after the `attempt`-th failure
    /// (0-based), or None once every attempt has been used.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Returns the maximum number of attempts, the first one included.
    fn max_attempts(&self) -> u32;

    /// Checks if another attempt may follow the `attempt`-th failure.
    fn should_retry(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts()
    }
}

/// Exponential backoff retry strategy.
///
/// Delay increases exponentially: base * 2^attempt, capped at `max_delay`,
/// plus up to `jitter * delay` of random slack.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Base delay.
    pub base: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
    /// Maximum number of attempts.
    pub max_attempts: u32,
    /// Jitter factor (0.0 to 1.0).
    pub jitter: f64,
}

impl ExponentialBackoff {
    /// Creates a new exponential backoff strategy.
    pub fn new() -> Self {
        Self {
            base: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            max_attempts: 3,
            jitter: 0.1,
        }
    }

    /// Sets the base delay.
    pub fn base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    /// Sets the maximum delay.
    pub fn max_delay(mut self, max: Duration) -> Self {
        self.max_delay = max;
        self
    }

    /// Sets the maximum attempts.
    pub fn max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max.max(1);
        self
    }

    /// Sets the jitter factor.
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_retry(attempt) {
            return None;
        }

        let delay = self.base.saturating_mul(2_u32.saturating_pow(attempt));
        let delay = delay.min(self.max_delay);

        if self.jitter > 0.0 {
            let jitter_range = delay.as_millis() as f64 * self.jitter;
            let offset = rand::thread_rng().gen_range(0.0..=jitter_range);
            Some(delay + Duration::from_millis(offset as u64))
        } else {
            Some(delay)
        }
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Fixed delay retry strategy.
///
/// Always uses the same delay between attempts.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    /// Fixed delay between attempts.
    pub delay: Duration,
    /// Maximum number of attempts.
    pub max_attempts: u32,
}

impl FixedDelay {
    /// Creates a new fixed delay strategy.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: 3,
        }
    }

    /// Sets the maximum attempts.
    pub fn max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max.max(1);
        self
    }
}

impl RetryStrategy for FixedDelay {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        self.should_retry(attempt).then_some(self.delay)
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// No retry strategy - fails after the first attempt.
#[derive(Debug, Clone, Default)]
pub struct NoRetry;

impl RetryStrategy for NoRetry {
    fn next_delay(&self, _attempt: u32) -> Option<Duration> {
        None
    }

    fn max_attempts(&self) -> u32 {
        1
    }
}

/// Runs an upstream operation under a hard per-attempt timeout, retrying
/// retryable failures according to `strategy`.
///
/// Non-retryable errors (a 404, a schema-level failure) are returned at once.
pub async fn with_retry<T, F, Fut>(
    strategy: &dyn RetryStrategy,
    timeout: Duration,
    origin: &str,
    mut operation: F,
) -> DashboardResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DashboardResult<T>>,
{
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout(timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(DashboardError::timeout(origin, timeout.as_millis() as u64)),
        };

        let err = match result {
            Ok(value) => {
                if attempt > 0 {
                    debug!(origin, attempt = attempt + 1, "upstream request recovered");
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() => err,
            Err(err) => return Err(err),
        };

        match strategy.next_delay(attempt) {
            Some(delay) => {
                warn!(
                    origin,
                    attempt = attempt + 1,
                    max_attempts = strategy.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "upstream request failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            None => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_exponential_backoff() {
        let strategy = ExponentialBackoff::new()
            .base(Duration::from_millis(100))
            .max_delay(Duration::from_millis(1000))
            .max_attempts(6)
            .jitter(0.0);

        assert_eq!(strategy.next_delay(0), Some(Duration::from_millis(100)));
        assert_eq!(strategy.next_delay(1), Some(Duration::from_millis(200)));
        assert_eq!(strategy.next_delay(2), Some(Duration::from_millis(400)));
        assert_eq!(strategy.next_delay(3), Some(Duration::from_millis(800)));
        assert_eq!(strategy.next_delay(4), Some(Duration::from_millis(1000)));
        assert_eq!(strategy.next_delay(5), None);
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let strategy = ExponentialBackoff::new()
            .base(Duration::from_millis(100))
            .jitter(0.5);

        for _ in 0..20 {
            let delay = strategy.next_delay(0).unwrap();
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_fixed_delay() {
        let strategy = FixedDelay::new(Duration::from_secs(10)).max_attempts(3);

        assert_eq!(strategy.next_delay(0), Some(Duration::from_secs(10)));
        assert_eq!(strategy.next_delay(1), Some(Duration::from_secs(10)));
        assert_eq!(strategy.next_delay(2), None);
    }

    #[test]
    fn test_no_retry() {
        let strategy = NoRetry;
        assert_eq!(strategy.next_delay(0), None);
        assert_eq!(strategy.max_attempts(), 1);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let strategy = FixedDelay::new(Duration::from_millis(1)).max_attempts(3);

        let counter = calls.clone();
        let result = with_retry(&strategy, Duration::from_secs(1), "meetings", || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(DashboardError::http_status("meetings", 503, ""))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let strategy = FixedDelay::new(Duration::from_millis(1)).max_attempts(2);

        let counter = calls.clone();
        let result: DashboardResult<()> =
            with_retry(&strategy, Duration::from_secs(1), "users", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(DashboardError::transport("users", "connection refused"))
                }
            })
            .await;

        assert!(result.unwrap_err().is_transport());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let calls = Arc::new(AtomicU32::new(0));
        let strategy = FixedDelay::new(Duration::from_millis(1)).max_attempts(5);

        let counter = calls.clone();
        let result: DashboardResult<()> =
            with_retry(&strategy, Duration::from_secs(1), "users", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(DashboardError::http_status("users", 404, ""))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hard_timeout() {
        let result: DashboardResult<()> =
            with_retry(&NoRetry, Duration::from_millis(10), "meetings", || {
                std::future::pending::<DashboardResult<()>>()
            })
            .await;

        assert_eq!(result, Err(DashboardError::timeout("meetings", 10)));
    }
}
