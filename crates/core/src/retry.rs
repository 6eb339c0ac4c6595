use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Bounded exponential backoff: attempt `n` (0-based) waits
/// `base_delay_ms * 2^n`, capped at `max_delay_ms`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay_ms: 1_000, max_delay_ms: 8_000 }
    }
}

impl BackoffPolicy {
    pub fn no_delay(max_attempts: u32) -> Self {
        Self { max_attempts, base_delay_ms: 0, max_delay_ms: 0 }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Runs `operation` until it succeeds or `policy.max_attempts` is reached,
/// sleeping between attempts. The last error is returned on exhaustion.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &BackoffPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                attempt += 1;
                warn!(
                    event_name = "system.retry.attempt_failed",
                    operation = label,
                    attempt,
                    max_attempts,
                    error = %error,
                    "operation attempt failed"
                );
                if attempt >= max_attempts {
                    return Err(error);
                }

                let delay = policy.backoff(attempt - 1);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
