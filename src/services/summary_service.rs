//! Payment summaries
//!
//! Totals are rebuilt from storage on every query: one scan per processor
//! partition, run in parallel and joined before the response is assembled.
//! Each scan reports through its own join handle.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::{ProcessorError, StorageError};
use crate::models::{
    PaymentSummaryFilters, PaymentSummaryResponse, ProcessorProvider, Summary, parse_timestamp,
};
use crate::ports::{PaymentProcessor, PaymentStore};

pub struct SummaryService {
    store: Arc<dyn PaymentStore>,
    default_processor: Arc<dyn PaymentProcessor>,
    fallback_processor: Arc<dyn PaymentProcessor>,
}

impl SummaryService {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        default_processor: Arc<dyn PaymentProcessor>,
        fallback_processor: Arc<dyn PaymentProcessor>,
    ) -> Self {
        Self {
            store,
            default_processor,
            fallback_processor,
        }
    }

    /// Totals per processor for payments requested inside the filter window.
    pub async fn retrieve(
        &self,
        filters: PaymentSummaryFilters,
    ) -> Result<PaymentSummaryResponse, StorageError> {
        let default_scan = tokio::spawn(summarize(
            Arc::clone(&self.store),
            ProcessorProvider::Default,
            filters,
        ));
        let fallback_scan = tokio::spawn(summarize(
            Arc::clone(&self.store),
            ProcessorProvider::Fallback,
            filters,
        ));

        let (default, fallback) = tokio::join!(default_scan, fallback_scan);

        Ok(PaymentSummaryResponse {
            default: default??,
            fallback: fallback??,
        })
    }

    /// What the processors themselves report for the same window, for
    /// reconciliation against `retrieve`.
    pub async fn processor_totals(
        &self,
        filters: PaymentSummaryFilters,
    ) -> Result<PaymentSummaryResponse, ProcessorError> {
        let (default, fallback) = tokio::try_join!(
            self.default_processor.payments_summary(&filters),
            self.fallback_processor.payments_summary(&filters),
        )?;
        Ok(PaymentSummaryResponse { default, fallback })
    }
}

async fn summarize(
    store: Arc<dyn PaymentStore>,
    provider: ProcessorProvider,
    filters: PaymentSummaryFilters,
) -> Result<Summary, StorageError> {
    let records = store.scan(provider).await?;

    let mut total_requests: u64 = 0;
    let mut total_amount = Decimal::ZERO;
    for record in &records {
        let Some(requested_at) = parse_timestamp(&record.requested_at) else {
            warn!(
                correlation_id = %record.id,
                requested_at = %record.requested_at,
                "skipping record with unparseable timestamp"
            );
            continue;
        };
        if !filters.includes(requested_at) {
            continue;
        }
        total_requests += 1;
        total_amount += record.amount;
    }

    debug!(
        processor = %provider,
        scanned = records.len(),
        total_requests,
        "partition summarized"
    );
    Ok(Summary::rounded(total_requests, total_amount))
}
