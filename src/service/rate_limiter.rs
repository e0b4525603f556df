//! Minimum spacing between outbound requests to the source.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Enforces `min_interval` between consecutive `wait()` returns.
///
/// One instance is shared by every scraper of a run; callers are serial, the
/// mutex only guards the timestamp.
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Suspend until `min_interval` has passed since the previous call returned.
    /// The first call never waits.
    pub async fn wait(&self) {
        let mut last = self.last_call.lock().await;

        if let Some(prev) = *last {
            let ready_at = prev + self.min_interval;
            if ready_at > Instant::now() {
                tracing::trace!(
                    delay_ms = (ready_at - Instant::now()).as_millis() as u64,
                    "[RATE] Waiting before next request"
                );
                sleep_until(ready_at).await;
            }
        }

        *last = Some(Instant::now());
    }

    /// Forget the previous call; the next `wait()` returns immediately.
    pub async fn reset(&self) {
        *self.last_call.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_never_waits() {
        let limiter = RateLimiter::from_millis(1000);
        let start = Instant::now();
        limiter.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enforces_min_interval() {
        let limiter = RateLimiter::from_millis(1000);
        let start = Instant::now();

        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;

        assert!(start.elapsed() >= Duration::from_millis(2000));
        assert!(start.elapsed() < Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_when_interval_already_elapsed() {
        let limiter = RateLimiter::from_millis(500);
        limiter.wait().await;
        tokio::time::sleep(Duration::from_millis(800)).await;

        let before = Instant::now();
        limiter.wait().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_last_call() {
        let limiter = RateLimiter::from_millis(1000);
        limiter.wait().await;
        limiter.reset().await;

        let before = Instant::now();
        limiter.wait().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }
}
