//! Runtime configuration
//!
//! Everything is read from the environment (optionally seeded from a `.env`
//! file) once at startup and then handed to the components that need it.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub server_addr: String,
    /// `None` keeps payments in process memory.
    pub redis_url: Option<String>,
    pub default_processor_url: String,
    pub fallback_processor_url: String,
    pub processor_admin_token: Option<String>,
    pub max_workers: usize,
    pub timeouts: ProcessorTimeouts,
    pub health_interval: Duration,
    pub breaker_failure_threshold: u32,
    pub breaker_recovery_timeout: Duration,
    pub retry: RetrySettings,
    /// Status a processor answers with when it already accepted the correlation id.
    pub conflict_status: u16,
    pub record_ttl: Duration,
}

/// Per-call deadlines, shortest for payments and longest for health polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorTimeouts {
    pub payment: Duration,
    pub summary: Duration,
    pub health: Duration,
}

impl Default for ProcessorTimeouts {
    fn default() -> Self {
        Self {
            payment: Duration::from_secs(10),
            summary: Duration::from_secs(15),
            health: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: u32,
    pub jitter_bound: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            multiplier: 2,
            jitter_bound: Duration::from_millis(10),
        }
    }
}

impl Config {
    /// Loads `.env` when present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = RetrySettings::default();
        let timeouts = ProcessorTimeouts {
            payment: millis(&lookup, "PAYMENT_TIMEOUT_MS", 10_000)?,
            summary: millis(&lookup, "SUMMARY_TIMEOUT_MS", 15_000)?,
            health: millis(&lookup, "HEALTH_TIMEOUT_MS", 30_000)?,
        };
        if !(timeouts.payment < timeouts.summary && timeouts.summary < timeouts.health) {
            return Err(ConfigError::TimeoutOrdering);
        }

        Ok(Self {
            server_addr: lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            redis_url: lookup("REDIS_URL").filter(|url| !url.is_empty()),
            default_processor_url: lookup("PAYMENT_PROCESSOR_DEFAULT")
                .unwrap_or_else(|| "http://payment-processor-default:8080".to_string()),
            fallback_processor_url: lookup("PAYMENT_PROCESSOR_FALLBACK")
                .unwrap_or_else(|| "http://payment-processor-fallback:8080".to_string()),
            processor_admin_token: lookup("PROCESSOR_ADMIN_TOKEN").filter(|t| !t.is_empty()),
            max_workers: parsed(&lookup, "MAX_WORKERS", 1024)?,
            timeouts,
            health_interval: millis(&lookup, "HEALTH_INTERVAL_MS", 5_100)?,
            breaker_failure_threshold: parsed(&lookup, "BREAKER_FAILURE_THRESHOLD", 3)?,
            breaker_recovery_timeout: millis(&lookup, "BREAKER_RECOVERY_TIMEOUT_MS", 10_000)?,
            retry: RetrySettings {
                max_attempts: parsed(&lookup, "RETRY_MAX_ATTEMPTS", defaults.max_attempts)?,
                initial_delay: millis(&lookup, "RETRY_INITIAL_DELAY_MS", 1)?,
                multiplier: parsed(&lookup, "RETRY_MULTIPLIER", defaults.multiplier)?,
                jitter_bound: millis(&lookup, "RETRY_JITTER_MS", 10)?,
            },
            conflict_status: parsed(&lookup, "PROCESSOR_CONFLICT_STATUS", 422)?,
            record_ttl: Duration::from_secs(parsed(&lookup, "RECORD_TTL_SECS", 1_200)?),
        })
    }
}

fn parsed<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn millis<F>(lookup: &F, key: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    parsed(lookup, key, default).map(Duration::from_millis)
}
