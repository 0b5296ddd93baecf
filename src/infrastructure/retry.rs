//! Exponential backoff with jitter
//!
//! The caller is suspended between attempts; attempts of one logical call
//! never overlap.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::RngCore;
use rand::rngs::OsRng;
use tracing::{debug, warn};

use crate::config::RetrySettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of invocations, including the first one.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub multiplier: u32,
    /// Jitter is drawn uniformly from `[0, jitter_bound)`.
    pub jitter_bound: Duration,
    /// Used instead of random bytes when the OS entropy source is unavailable.
    pub jitter_fallback: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, multiplier: u32, jitter_bound: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            multiplier,
            jitter_bound,
            jitter_fallback: Duration::ZERO,
        }
    }

    /// Backoff before jitter for the given zero-based attempt.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(self.multiplier.saturating_pow(attempt))
    }

    /// Full sleep before the attempt after `attempt`, jitter included.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay(attempt)
            .saturating_add(jitter(self.jitter_bound, self.jitter_fallback))
    }
}

impl From<RetrySettings> for RetryPolicy {
    fn from(settings: RetrySettings) -> Self {
        Self::new(
            settings.max_attempts,
            settings.initial_delay,
            settings.multiplier,
            settings.jitter_bound,
        )
    }
}

/// Calls `callback` until it succeeds or `max_retries` invocations have
/// failed, returning the last error in that case.
pub async fn exponential_backoff<T, E, F, Fut>(policy: &RetryPolicy, mut callback: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;

    loop {
        let err = match callback().await {
            Ok(result) => return Ok(result),
            Err(err) => err,
        };

        if attempt + 1 >= policy.max_retries {
            warn!(attempts = attempt + 1, error = %err, "giving up after retries");
            return Err(err);
        }

        let delay = policy.delay(attempt);
        debug!(attempt = attempt + 1, ?delay, error = %err, "retrying after backoff");
        tokio::time::sleep(delay).await;

        attempt += 1;
    }
}

fn jitter(bound: Duration, fallback: Duration) -> Duration {
    let bound_nanos = bound.as_nanos() as u64;
    if bound_nanos == 0 {
        return Duration::ZERO;
    }

    let mut bytes = [0u8; 8];
    let seed = match OsRng.try_fill_bytes(&mut bytes) {
        Ok(()) => u64::from_le_bytes(bytes),
        Err(err) => {
            debug!(error = %err, "entropy unavailable, using fallback jitter");
            fallback.as_nanos() as u64
        }
    };

    Duration::from_nanos(seed % bound_nanos)
}
