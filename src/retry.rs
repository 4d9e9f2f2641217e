//! Bounded exponential backoff around a single tagging call.
//!
//! A call is attempted up to `max_attempts` times. Only failures classified
//! as transient ([`TagError::is_transient`]) are retried; before retry `n`
//! (counted from 0) the policy sleeps `unit × base^n`. With the defaults
//! (3 attempts, base 2, 1 s) a call that keeps failing sleeps 1 s, then 2 s,
//! then gives up with [`TagError::RetriesExhausted`].
//!
//! Sleeping goes through the [`Sleeper`] trait so tests can observe delays
//! without waiting for them.

use crate::config::RetryConfig;
use crate::tagging::TagError;
use std::time::Duration;
use tracing::debug;

/// Blocks the current thread for a backoff delay.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Production sleeper: `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 act as 1.
    pub max_attempts: u32,
    pub base: u32,
    /// Duration of one backoff "time unit".
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: 2,
            unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base: config.backoff_base,
            unit: Duration::from_millis(config.backoff_unit_ms),
        }
    }

    /// Delay before the retry that follows failed attempt `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.unit.saturating_mul(self.base.saturating_pow(attempt))
    }

    /// Run `operation` with retries, sleeping on the current thread.
    pub fn call<T>(&self, operation: impl FnMut() -> Result<T, TagError>) -> Result<T, TagError> {
        self.call_with(&ThreadSleeper, operation)
    }

    /// Run `operation` with retries, sleeping through `sleeper`.
    pub fn call_with<T>(
        &self,
        sleeper: &impl Sleeper,
        mut operation: impl FnMut() -> Result<T, TagError>,
    ) -> Result<T, TagError> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) if attempt + 1 >= attempts => {
                    return Err(TagError::RetriesExhausted {
                        attempts,
                        source: Box::new(err),
                    });
                }
                Err(err) => {
                    let delay = self.delay(attempt);
                    debug!(attempt = attempt + 1, ?delay, error = %err, "transient failure, backing off");
                    sleeper.sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}
