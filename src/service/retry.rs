//! Bounded retry with backoff for calls against the source.
//!
//! Only errors classified transient by [`crate::error::ImportError::is_transient`] are
//! retried. Everything else (parse and validation failures, 404s, fatal
//! session loss) is returned on the first attempt.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Backoff {
    Fixed(Duration),
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Randomise each delay within [50%, 100%] of its nominal value.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Exponential {
                initial: Duration::from_secs(1),
                max: Duration::from_secs(30),
                multiplier: 2.0,
            },
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::Fixed(Duration::ZERO),
            jitter: false,
        }
    }

    /// Nominal delay after failed attempt number `attempt` (1-based), before jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(d) => d,
            Backoff::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let exp = attempt.saturating_sub(1) as i32;
                let secs = initial.as_secs_f64() * multiplier.powi(exp);
                if !secs.is_finite() || secs >= max.as_secs_f64() {
                    max
                } else {
                    Duration::from_secs_f64(secs)
                }
            }
        }
    }

    fn jittered(&self, nominal: Duration) -> Duration {
        if !self.jitter || nominal.is_zero() {
            return nominal;
        }
        let factor = rand::thread_rng().gen_range(0.5..=1.0);
        nominal.mul_f64(factor)
    }
}

/// Runs operations under a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryManager {
    policy: RetryPolicy,
}

impl RetryManager {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds, fails non-transiently, or the
    /// attempt budget is spent. The last error is returned unchanged.
    pub async fn with_retry<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(
                            operation = operation_name,
                            attempt,
                            "[RETRY] Succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.policy.jittered(self.policy.delay_for(attempt));
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "[RETRY] Transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if err.is_transient() {
                        tracing::error!(
                            operation = operation_name,
                            attempt,
                            error = %err,
                            "[RETRY] Giving up after exhausting attempts"
                        );
                    }
                    return Err(err);
                }
            }
        }
    }
}

impl Default for RetryManager {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

/// Convenience for one-off calls.
pub async fn with_retry<F, Fut, T>(policy: RetryPolicy, operation_name: &str, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    RetryManager::new(policy).with_retry(operation_name, operation).await
}
