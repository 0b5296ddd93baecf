//! Domain models and data structures
//!
//! This module contains all the core data types used throughout the application.
//! These are "pure" data structures without business logic.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Payment creation request from clients
#[derive(Deserialize, Debug, Clone)]
pub struct CreatePayment {
    #[serde(rename = "correlationId")]
    pub correlation_id: Uuid,
    pub amount: Decimal,
}

impl CreatePayment {
    /// Anything that is not a UUID never gets this far; serde rejects it.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.correlation_id.is_nil() {
            return Err(ValidationError::MissingCorrelationId);
        }
        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount);
        }
        Ok(())
    }
}

/// Which downstream processor handled a payment
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorProvider {
    Default,
    Fallback,
}

impl ProcessorProvider {
    pub const ALL: [ProcessorProvider; 2] = [ProcessorProvider::Default, ProcessorProvider::Fallback];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessorProvider::Default => "default",
            ProcessorProvider::Fallback => "fallback",
        }
    }

    pub fn other(&self) -> ProcessorProvider {
        match self {
            ProcessorProvider::Default => ProcessorProvider::Fallback,
            ProcessorProvider::Fallback => ProcessorProvider::Default,
        }
    }
}

impl fmt::Display for ProcessorProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment data sent to downstream processors
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    pub amount: Decimal,
    #[serde(rename = "requestedAt")]
    pub requested_at: String,
}

impl PaymentRequest {
    pub fn new(correlation_id: String, amount: Decimal, requested_at: DateTime<Utc>) -> Self {
        Self {
            correlation_id,
            amount,
            requested_at: format_timestamp(requested_at),
        }
    }
}

/// Outcome of one orchestration attempt
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PaymentResponse {
    pub message: String,
    #[serde(rename = "processorProvider")]
    pub processor_provider: ProcessorProvider,
}

/// Record persisted under `<provider>:<id>` for every accepted payment
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StoredPaymentRecord {
    pub id: String,
    #[serde(rename = "processorProvider")]
    pub processor_provider: ProcessorProvider,
    pub amount: Decimal,
    #[serde(rename = "requestedAt")]
    pub requested_at: String,
}

impl StoredPaymentRecord {
    pub fn from_request(request: &PaymentRequest, processor_provider: ProcessorProvider) -> Self {
        Self {
            id: request.correlation_id.clone(),
            processor_provider,
            amount: request.amount,
            requested_at: request.requested_at.clone(),
        }
    }

    pub fn key(&self) -> String {
        record_key(self.processor_provider, &self.id)
    }
}

pub fn record_key(provider: ProcessorProvider, id: &str) -> String {
    format!("{}:{}", provider, id)
}

/// Time window for summary queries
///
/// Filtering only applies when both ends are present.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaymentSummaryFilters {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl PaymentSummaryFilters {
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Inclusive window, or `None` when the query is unfiltered.
    pub fn window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.from, self.to) {
            (Some(from), Some(to)) => Some((from, to)),
            _ => None,
        }
    }

    pub fn includes(&self, requested_at: DateTime<Utc>) -> bool {
        match self.window() {
            Some((from, to)) => from <= requested_at && requested_at <= to,
            None => true,
        }
    }
}

/// Health status from downstream services
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthStatus {
    pub failing: bool,
    #[serde(rename = "minResponseTime")]
    pub min_response_time: u64,
}

/// Totals for one processor
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    #[serde(rename = "totalRequests")]
    pub total_requests: u64,
    #[serde(rename = "totalAmount")]
    pub total_amount: Decimal,
}

impl Summary {
    /// Rounds the amount to cents, half away from zero.
    pub fn rounded(total_requests: u64, total_amount: Decimal) -> Self {
        Self {
            total_requests,
            total_amount: total_amount
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        }
    }
}

/// Summary of all payment processors
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaymentSummaryResponse {
    pub default: Summary,
    pub fallback: Summary,
}

impl PaymentSummaryResponse {
    pub fn get(&self, provider: ProcessorProvider) -> &Summary {
        match provider {
            ProcessorProvider::Default => &self.default,
            ProcessorProvider::Fallback => &self.fallback,
        }
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}
