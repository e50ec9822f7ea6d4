use std::{fmt::Display, thread::sleep, time::Duration};

use rand::random;

use crate::config::RetryConfig;

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// How often and how patiently a provider call is repeated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first call included
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }
}

impl RetryPolicy {
    /// A policy that calls once and never sleeps.
    #[cfg(test)]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` >= 1 is the
    /// attempt that just failed. Exponential, capped, plus jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let base = self
            .initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff);

        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return base;
        }

        base + Duration::from_millis(random::<u64>() % (jitter_ms + 1))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. The last error is returned as-is.
    pub fn run<T, E, F>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        E: Retryable + Display,
        F: FnMut() -> Result<T, E>,
    {
        let mut attempt = 1u32;

        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts && err.is_retryable() => {
                    let delay = self.backoff(attempt);
                    log::info!(
                        "{what}: retrying (attempt {}/{}) after error: {err}, backoff {}ms",
                        attempt + 1,
                        self.max_attempts,
                        delay.as_millis()
                    );
                    if !delay.is_zero() {
                        sleep(delay);
                    }
                    attempt += 1;
                }
                Err(err) => {
                    if attempt > 1 {
                        log::warn!("{what}: giving up after {attempt} attempts: {err}");
                    }
                    return Err(err);
                }
            }
        }
    }
}
