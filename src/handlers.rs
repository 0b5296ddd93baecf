//! HTTP request handlers
//!
//! This module contains all the HTTP endpoint handlers. Each handler is responsible
//! for extracting data from HTTP requests, calling the appropriate services, and
//! returning HTTP responses.

use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::WorkerPoolError;
use crate::infrastructure::circuit_breaker::CircuitState;
use crate::models::*;
use crate::state::AppState;

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/payments", post(create_payment))
        .route("/payments-summary", get(payments_summary))
        .route("/admin/processors-summary", get(processors_summary))
        .with_state(app_state)
}

/// Error body returned for every rejected request
#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub description: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
    description: String,
}

impl ApiError {
    fn new(status: StatusCode, message: &'static str, description: impl ToString) -> Self {
        Self {
            status,
            message,
            description: description.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message.to_string(),
            description: self.description,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Root endpoint - simple liveness check
pub async fn root() -> &'static str {
    "ok"
}

#[derive(Serialize)]
pub struct HealthReport {
    pub sync: DateTime<Utc>,
    pub breaker: CircuitState,
    #[serde(rename = "breakerFailures")]
    pub breaker_failures: u32,
    #[serde(rename = "defaultProcessorFailing")]
    pub default_processor_failing: bool,
    #[serde(rename = "minResponseTime")]
    pub min_response_time: u64,
    #[serde(rename = "inFlight")]
    pub in_flight: usize,
    #[serde(rename = "availableWorkers")]
    pub available_workers: usize,
}

/// Point-in-time view of the resilience machinery
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        sync: Utc::now(),
        breaker: state.breaker.state(),
        breaker_failures: state.breaker.failure_count(),
        default_processor_failing: state.health.is_failing(),
        min_response_time: state.health.min_response_time().as_millis() as u64,
        in_flight: state.worker_pool.in_flight(),
        available_workers: state.worker_pool.available(),
    })
}

/// Create a new payment
///
/// Validates the payload, waits for a worker slot and answers 204 as soon as
/// the payment is admitted. Processing and persistence happen afterwards.
pub async fn create_payment(
    State(state): State<AppState>,
    payload: Result<Json<CreatePayment>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(payment) = payload.map_err(|rejection| {
        ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "error parsing body",
            rejection.body_text(),
        )
    })?;

    payment
        .validate()
        .map_err(|err| ApiError::new(StatusCode::BAD_REQUEST, "error validating payload", err))?;

    state
        .payments
        .submit(&state.worker_pool, payment)
        .await
        .map_err(|err: WorkerPoolError| {
            ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "error processing payment", err)
        })?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize, Default)]
pub struct SummaryQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl SummaryQuery {
    fn into_filters(self) -> Result<PaymentSummaryFilters, ApiError> {
        Ok(PaymentSummaryFilters {
            from: parse_bound("from", self.from)?,
            to: parse_bound("to", self.to)?,
        })
    }
}

fn parse_bound(name: &str, raw: Option<String>) -> Result<Option<DateTime<Utc>>, ApiError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_timestamp(value).map(Some).ok_or_else(|| {
            ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "error parsing query params",
                format!("{name} is not an RFC 3339 timestamp: {value}"),
            )
        }),
    }
}

fn parse_query(
    query: Result<Query<SummaryQuery>, QueryRejection>,
) -> Result<PaymentSummaryFilters, ApiError> {
    let Query(query) = query.map_err(|rejection| {
        ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "error parsing query params",
            rejection.body_text(),
        )
    })?;
    query.into_filters()
}

/// Get payment summary with optional time filtering
///
/// Query parameters:
/// - `from`: Start time in RFC3339 format (optional)
/// - `to`: End time in RFC3339 format (optional)
///
/// The window only applies when both are given; otherwise every stored
/// payment is counted.
pub async fn payments_summary(
    State(state): State<AppState>,
    query: Result<Query<SummaryQuery>, QueryRejection>,
) -> Result<Json<PaymentSummaryResponse>, ApiError> {
    let filters = parse_query(query)?;

    let summary = state.summaries.retrieve(filters).await.map_err(|err| {
        error!(error = %err, "error retrieving payment summary");
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "error retrieving payment summary",
            err,
        )
    })?;
    Ok(Json(summary))
}

/// The processors' own totals for the same window
pub async fn processors_summary(
    State(state): State<AppState>,
    query: Result<Query<SummaryQuery>, QueryRejection>,
) -> Result<Json<PaymentSummaryResponse>, ApiError> {
    let filters = parse_query(query)?;

    let totals = state.summaries.processor_totals(filters).await.map_err(|err| {
        warn!(error = %err, "error retrieving processor summaries");
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "error retrieving processor summaries",
            err,
        )
    })?;
    Ok(Json(totals))
}
