//! Circuit breaker that fails over to an alternate operation
//!
//! Closed: the primary operation runs. Open: the primary is skipped and the
//! fallback runs straight away. HalfOpen: after the recovery timeout a single
//! caller gets to try the primary again; success closes the breaker, failure
//! reopens it regardless of the threshold.
//!
//! The fallback is a real second backend, not a canned response, so callers
//! only ever see the fallback's outcome once the primary has failed.

use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

pub struct CircuitBreaker<T> {
    label: String,
    state: AtomicU8,
    failure_count: AtomicU32,
    /// Nanoseconds after `epoch` at which the breaker last opened.
    last_failure: AtomicU64,
    epoch: Instant,
    failure_threshold: u32,
    recovery_timeout: Duration,
    _result: PhantomData<fn() -> T>,
}

impl<T> CircuitBreaker<T> {
    pub fn new(label: impl Into<String>, failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            label: label.into(),
            state: AtomicU8::new(CircuitState::Closed as u8),
            failure_count: AtomicU32::new(0),
            last_failure: AtomicU64::new(0),
            epoch: Instant::now(),
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            _result: PhantomData,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::Acquire)
    }

    /// Runs `operation`, or `fallback` when the breaker is open or the
    /// operation fails.
    pub async fn execute<E, Op, OpFut, Fb, FbFut>(&self, operation: Op, fallback: Fb) -> Result<T, E>
    where
        E: Display,
        Op: FnOnce() -> OpFut,
        OpFut: Future<Output = Result<T, E>>,
        Fb: FnOnce() -> FbFut,
        FbFut: Future<Output = Result<T, E>>,
    {
        let trial = match self.state() {
            CircuitState::Closed => false,
            CircuitState::Open => {
                if !self.recovery_elapsed() || !self.try_half_open() {
                    return fallback().await;
                }
                true
            }
            // someone else holds the single trial
            CircuitState::HalfOpen => return fallback().await,
        };

        let mut guard = TrialGuard {
            breaker: self,
            armed: trial,
        };
        let outcome = operation().await;
        guard.armed = false;

        match outcome {
            Ok(result) => {
                self.reset();
                Ok(result)
            }
            Err(err) => {
                debug!(breaker = %self.label, error = %err, "primary operation failed");
                self.record_failure(trial);
                fallback().await
            }
        }
    }

    fn recovery_elapsed(&self) -> bool {
        let opened_at = Duration::from_nanos(self.last_failure.load(Ordering::Acquire));
        self.epoch.elapsed().saturating_sub(opened_at) > self.recovery_timeout
    }

    fn try_half_open(&self) -> bool {
        self.state
            .compare_exchange(
                CircuitState::Open as u8,
                CircuitState::HalfOpen as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn record_failure(&self, trial: bool) {
        let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
        if failures >= self.failure_threshold || trial {
            let now = self.epoch.elapsed().as_nanos() as u64;
            self.last_failure.store(now, Ordering::Release);
            let previous = self.state.swap(CircuitState::Open as u8, Ordering::AcqRel);
            if previous != CircuitState::Open as u8 {
                warn!(
                    breaker = %self.label,
                    failures,
                    "circuit breaker failure count reached threshold, circuit is now open"
                );
            }
        }
    }

    /// The trial was dropped or unwound before it settled.
    fn abandon_trial(&self) {
        let now = self.epoch.elapsed().as_nanos() as u64;
        self.last_failure.store(now, Ordering::Release);
        let reopened = self
            .state
            .compare_exchange(
                CircuitState::HalfOpen as u8,
                CircuitState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if reopened {
            warn!(breaker = %self.label, "half-open trial abandoned, circuit is open again");
        }
    }

    fn reset(&self) {
        self.failure_count.store(0, Ordering::Release);
        let previous = self.state.swap(CircuitState::Closed as u8, Ordering::AcqRel);
        if previous != CircuitState::Closed as u8 {
            debug!(breaker = %self.label, "circuit breaker closed");
        }
    }
}

/// Reopens the breaker unless the HalfOpen trial runs to completion.
struct TrialGuard<'a, T> {
    breaker: &'a CircuitBreaker<T>,
    armed: bool,
}

impl<T> Drop for TrialGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.abandon_trial();
        }
    }
}
