//! Health monitoring of the default processor
//!
//! A single background loop polls the processor's health endpoint and keeps a
//! shared `failing` flag current. Payment attempts read the flag without
//! blocking and skip the default processor while it is set.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::models::HealthStatus;
use crate::ports::PaymentProcessor;

#[derive(Clone, Default)]
pub struct HealthMonitor {
    failing: Arc<AtomicBool>,
    min_response_time_ms: Arc<AtomicU64>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_failing(&self) -> bool {
        self.failing.load(Ordering::Acquire)
    }

    pub fn min_response_time(&self) -> Duration {
        Duration::from_millis(self.min_response_time_ms.load(Ordering::Acquire))
    }

    pub fn update(&self, status: HealthStatus) {
        self.min_response_time_ms
            .store(status.min_response_time, Ordering::Release);
        let was_failing = self.failing.swap(status.failing, Ordering::AcqRel);
        if was_failing != status.failing {
            info!(
                failing = status.failing,
                min_response_time = status.min_response_time,
                "default processor health changed"
            );
        }
    }

    /// Starts polling every `interval` until `cancel` fires.
    ///
    /// The first poll happens immediately. Deadlines for the health call
    /// itself belong to the processor client; cancellation also abandons a
    /// poll that is still waiting on it.
    pub fn spawn(
        &self,
        processor: Arc<dyn PaymentProcessor>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = monitor.poll_once(processor.as_ref()) => {}
                }
            }
            info!("health monitor stopped");
        })
    }

    pub async fn poll_once(&self, processor: &dyn PaymentProcessor) {
        match processor.health().await {
            Ok(status) => self.update(status),
            Err(err) => {
                warn!(
                    processor = %processor.provider(),
                    error = %err,
                    "error getting payments health, assuming healthy"
                );
                self.update(HealthStatus {
                    failing: false,
                    min_response_time: 0,
                });
            }
        }
    }
}
