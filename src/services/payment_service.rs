//! Payment orchestration
//!
//! One payment goes: build the downstream request, run the breaker-guarded
//! default/fallback call under the retry policy, then hand the accepted
//! payment to storage in the background.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::error::{ProcessorError, WorkerPoolError};
use crate::infrastructure::circuit_breaker::CircuitBreaker;
use crate::infrastructure::retry::{self, RetryPolicy};
use crate::infrastructure::worker_pool::WorkerPool;
use crate::models::{
    CreatePayment, PaymentRequest, PaymentResponse, ProcessorProvider, StoredPaymentRecord,
};
use crate::ports::{PaymentProcessor, PaymentStore};
use crate::services::health_service::HealthMonitor;

pub struct PaymentService {
    default_processor: Arc<dyn PaymentProcessor>,
    fallback_processor: Arc<dyn PaymentProcessor>,
    breaker: Arc<CircuitBreaker<PaymentResponse>>,
    health: HealthMonitor,
    store: Arc<dyn PaymentStore>,
    retry: RetryPolicy,
    conflict_status: u16,
    /// Background saves, outside the worker pool barrier.
    persistence: TaskTracker,
}

impl PaymentService {
    pub fn new(
        default_processor: Arc<dyn PaymentProcessor>,
        fallback_processor: Arc<dyn PaymentProcessor>,
        breaker: Arc<CircuitBreaker<PaymentResponse>>,
        health: HealthMonitor,
        store: Arc<dyn PaymentStore>,
        retry: RetryPolicy,
        conflict_status: u16,
    ) -> Self {
        Self {
            default_processor,
            fallback_processor,
            breaker,
            health,
            store,
            retry,
            conflict_status,
            persistence: TaskTracker::new(),
        }
    }

    /// Admits the payment into the worker pool and returns once it is
    /// accepted; processing continues in the background.
    pub async fn submit(
        self: &Arc<Self>,
        pool: &WorkerPool,
        payment: CreatePayment,
    ) -> Result<(), WorkerPoolError> {
        let service = Arc::clone(self);
        pool.submit(async move {
            let correlation_id = payment.correlation_id;
            if let Err(err) = service.execute(payment).await {
                error!(
                    correlation_id = %correlation_id,
                    error = %err,
                    "error processing payment"
                );
            }
        })
        .await
    }

    /// Processes one payment to completion or retry exhaustion.
    pub async fn execute(&self, payment: CreatePayment) -> Result<PaymentResponse, ProcessorError> {
        let request = PaymentRequest::new(
            payment.correlation_id.to_string(),
            payment.amount,
            Utc::now(),
        );

        let this = self;
        let payload = &request;
        let response =
            retry::exponential_backoff(&self.retry, move || this.attempt(payload)).await?;

        self.persist(&request, &response);
        Ok(response)
    }

    async fn attempt(&self, request: &PaymentRequest) -> Result<PaymentResponse, ProcessorError> {
        let outcome = self
            .breaker
            .execute(
                || self.call_default(request),
                || self.fallback_processor.process_payment(request),
            )
            .await;

        match outcome {
            Err(err) if err.status() == Some(self.conflict_status) => {
                let provider = err.provider().other();
                info!(
                    correlation_id = %request.correlation_id,
                    processor = %provider,
                    "payment already processed, reconciling"
                );
                Ok(PaymentResponse {
                    message: "already processed".to_string(),
                    processor_provider: provider,
                })
            }
            other => other,
        }
    }

    async fn call_default(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentResponse, ProcessorError> {
        if self.health.is_failing() {
            return Err(ProcessorError::Unavailable {
                provider: ProcessorProvider::Default,
            });
        }
        self.default_processor.process_payment(request).await
    }

    /// Fire-and-forget: a storage failure never undoes an accepted payment.
    fn persist(&self, request: &PaymentRequest, response: &PaymentResponse) {
        let store = Arc::clone(&self.store);
        let record = StoredPaymentRecord::from_request(request, response.processor_provider);

        self.persistence.spawn(async move {
            debug!(
                correlation_id = %record.id,
                amount = %record.amount,
                requested_at = %record.requested_at,
                processor = %record.processor_provider,
                "saving"
            );
            if let Err(err) = store.save(&record).await {
                warn!(
                    correlation_id = %record.id,
                    amount = %record.amount,
                    requested_at = %record.requested_at,
                    processor = %record.processor_provider,
                    error = %err,
                    "error saving"
                );
            }
        });
    }

    /// Waits for every background save started so far.
    pub async fn flush(&self) {
        self.persistence.close();
        self.persistence.wait().await;
        self.persistence.reopen();
    }
}
