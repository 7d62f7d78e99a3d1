//! Retry policy for per-target sends
//!
//! Attempts for one target are strictly sequential. After failed attempt `n`
//! the policy waits [`RetryPolicy::delay_after`]`(n)` before trying again;
//! there is no wait after the final attempt.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use contracts::CoordinatorConfig;

/// How the wait grows between attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// `base * n` after failed attempt `n`
    Linear,
    /// `base` every time
    Constant,
    /// `base * factor^(n - 1)`
    Exponential { factor: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first (values below 1 count as 1)
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
    /// Upper bound for any single wait (None = unbounded)
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(3, Duration::from_millis(1000))
    }
}

/// Result of a retried operation
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    /// Attempts actually made
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff: Backoff::Linear,
            max_delay: None,
        }
    }

    /// A single attempt, no waiting
    pub fn none() -> Self {
        Self::linear(1, Duration::ZERO)
    }

    pub fn from_config(config: &CoordinatorConfig) -> Self {
        Self::linear(config.retry_attempts, config.retry_delay())
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Wait after failed attempt `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let delay = match self.backoff {
            Backoff::Linear => self.base_delay.saturating_mul(attempt),
            Backoff::Constant => self.base_delay,
            Backoff::Exponential { factor } => {
                let exp = (attempt - 1).min(i32::MAX as u32) as i32;
                let secs = self.base_delay.as_secs_f64() * factor.powi(exp);
                Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
            }
        };
        match self.max_delay {
            Some(max_delay) => delay.min(max_delay),
            None => delay,
        }
    }

    /// Total time spent waiting when every attempt fails
    pub fn total_backoff(&self) -> Duration {
        (1..self.attempts())
            .map(|n| self.delay_after(n))
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    /// Run `op` until it succeeds or attempts are exhausted
    ///
    /// `op` receives the 1-based attempt number. The last error is returned
    /// on exhaustion.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> RetryOutcome<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.attempts();
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                    };
                }
                Err(e) if attempt >= max_attempts => {
                    return RetryOutcome {
                        result: Err(e),
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    debug!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
