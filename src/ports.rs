//! Seams to the outside world
//!
//! The services only ever talk to processors and storage through these
//! traits, so tests can swap in scripted doubles.

use async_trait::async_trait;

use crate::error::{ProcessorError, StorageError};
use crate::models::{
    HealthStatus, PaymentRequest, PaymentResponse, PaymentSummaryFilters, ProcessorProvider,
    StoredPaymentRecord, Summary,
};

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    fn provider(&self) -> ProcessorProvider;

    async fn process_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentResponse, ProcessorError>;

    /// The processor's own view of what it has accepted.
    async fn payments_summary(
        &self,
        filters: &PaymentSummaryFilters,
    ) -> Result<Summary, ProcessorError>;

    async fn health(&self) -> Result<HealthStatus, ProcessorError>;
}

/// Key-value storage partitioned by processor.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Writes the record under its key, replacing any previous one.
    async fn save(&self, record: &StoredPaymentRecord) -> Result<(), StorageError>;

    /// Every record currently stored under `<provider>:*`.
    async fn scan(
        &self,
        provider: ProcessorProvider,
    ) -> Result<Vec<StoredPaymentRecord>, StorageError>;
}
