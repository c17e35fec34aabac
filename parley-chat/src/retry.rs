use std::future::Future;
use std::time::Duration;

use parley_common::ParleyError;
use tokio::time::Instant;

/// Exponential backoff for transient service failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

/// Why [`RetryPolicy::run_until`] gave up; both carry the last error seen.
#[derive(Debug)]
pub enum RetryError {
    /// Permanent failure, or every attempt was used.
    Failed(ParleyError),
    /// The next attempt could not start before the deadline.
    Deadline(ParleyError),
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): base, 2x base, 4x base...
    pub fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << shift)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    /// No retry starts unless its backoff ends before `deadline`.
    pub async fn run_until<T, F, Fut>(
        &self,
        what: &str,
        deadline: Instant,
        mut op: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = parley_common::Result<T>>,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !err.is_transient() || attempt >= max {
                return Err(RetryError::Failed(err));
            }
            let wait = self.delay(attempt);
            if Instant::now() + wait >= deadline {
                return Err(RetryError::Deadline(err));
            }
            tracing::warn!(
                op = what,
                attempt,
                max_attempts = max,
                delay_ms = wait.as_millis() as u64,
                error = %err,
                "transient failure, retrying"
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }
}
