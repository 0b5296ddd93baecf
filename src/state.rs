//! Application state management
//!
//! This module defines the application state that is shared across all
//! handlers. It is built once at startup from the configuration and the
//! concrete processor and storage adapters, then cloned into every request.

use std::sync::Arc;

use crate::config::Config;
use crate::infrastructure::circuit_breaker::CircuitBreaker;
use crate::infrastructure::retry::RetryPolicy;
use crate::infrastructure::worker_pool::WorkerPool;
use crate::models::PaymentResponse;
use crate::ports::{PaymentProcessor, PaymentStore};
use crate::services::health_service::HealthMonitor;
use crate::services::payment_service::PaymentService;
use crate::services::summary_service::SummaryService;

/// Shared application state
///
/// Cheap to clone: every field is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub payments: Arc<PaymentService>,
    pub summaries: Arc<SummaryService>,
    pub worker_pool: WorkerPool,
    /// Default processor health, kept current by the background monitor
    pub health: HealthMonitor,
    pub breaker: Arc<CircuitBreaker<PaymentResponse>>,
}

impl AppState {
    pub fn new(
        config: &Config,
        default_processor: Arc<dyn PaymentProcessor>,
        fallback_processor: Arc<dyn PaymentProcessor>,
        store: Arc<dyn PaymentStore>,
    ) -> Self {
        let health = HealthMonitor::new();
        let breaker = Arc::new(CircuitBreaker::new(
            "payment-processors",
            config.breaker_failure_threshold,
            config.breaker_recovery_timeout,
        ));

        let payments = Arc::new(PaymentService::new(
            Arc::clone(&default_processor),
            Arc::clone(&fallback_processor),
            Arc::clone(&breaker),
            health.clone(),
            Arc::clone(&store),
            RetryPolicy::from(config.retry),
            config.conflict_status,
        ));
        let summaries = Arc::new(SummaryService::new(
            store,
            default_processor,
            fallback_processor,
        ));

        Self {
            payments,
            summaries,
            worker_pool: WorkerPool::new(config.max_workers),
            health,
            breaker,
        }
    }
}
