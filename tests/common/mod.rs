#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tower::ServiceExt;
use uuid::Uuid;

use paygate::error::ProcessorError;
use paygate::handlers::router;
use paygate::infrastructure::memory_store::InMemoryPaymentStore;
use paygate::ports::PaymentProcessor;
use paygate::{
    AppState, Config, HealthStatus, PaymentRequest, PaymentResponse, PaymentSummaryFilters,
    ProcessorProvider, Summary, parse_timestamp,
};

/// In-process stand-in for a payment processor.
///
/// Accepts every payment until `set_down(true)`, after which it answers 500.
pub struct FakeProcessor {
    provider: ProcessorProvider,
    down: AtomicBool,
    reports_failing: AtomicBool,
    calls: AtomicUsize,
    accepted: Mutex<Vec<PaymentRequest>>,
}

impl FakeProcessor {
    pub fn new(provider: ProcessorProvider) -> Arc<Self> {
        Arc::new(Self {
            provider,
            down: AtomicBool::new(false),
            reports_failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            accepted: Mutex::new(Vec::new()),
        })
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn set_reports_failing(&self, failing: bool) {
        self.reports_failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn accepted(&self) -> usize {
        self.accepted.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentProcessor for FakeProcessor {
    fn provider(&self) -> ProcessorProvider {
        self.provider
    }

    async fn process_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentResponse, ProcessorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(ProcessorError::InvalidStatusCode {
                provider: self.provider,
                status: 500,
            });
        }
        self.accepted.lock().unwrap().push(request.clone());
        Ok(PaymentResponse {
            message: "payment processed successfully".to_string(),
            processor_provider: self.provider,
        })
    }

    async fn payments_summary(
        &self,
        filters: &PaymentSummaryFilters,
    ) -> Result<Summary, ProcessorError> {
        let accepted = self.accepted.lock().unwrap();
        let mut total_requests = 0;
        let mut total_amount = Decimal::ZERO;
        for request in accepted.iter() {
            let Some(at) = parse_timestamp(&request.requested_at) else {
                continue;
            };
            if filters.includes(at) {
                total_requests += 1;
                total_amount += request.amount;
            }
        }
        Ok(Summary::rounded(total_requests, total_amount))
    }

    async fn health(&self) -> Result<HealthStatus, ProcessorError> {
        Ok(HealthStatus {
            failing: self.reports_failing.load(Ordering::SeqCst),
            min_response_time: 5,
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryPaymentStore>,
    pub default: Arc<FakeProcessor>,
    pub fallback: Arc<FakeProcessor>,
}

pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let mut env: HashMap<String, String> = [
        ("MAX_WORKERS", "16"),
        ("RETRY_INITIAL_DELAY_MS", "1"),
        ("RETRY_JITTER_MS", "2"),
        ("BREAKER_RECOVERY_TIMEOUT_MS", "60000"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (key, value) in overrides {
        env.insert(key.to_string(), value.to_string());
    }
    Config::from_lookup(|key| env.get(key).cloned()).unwrap()
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(test_config(&[]))
}

pub fn spawn_app_with(config: Config) -> TestApp {
    let store = Arc::new(InMemoryPaymentStore::new());
    let default = FakeProcessor::new(ProcessorProvider::Default);
    let fallback = FakeProcessor::new(ProcessorProvider::Fallback);

    let state = AppState::new(&config, default.clone(), fallback.clone(), store.clone());

    TestApp {
        router: router(state.clone()),
        state,
        store,
        default,
        fallback,
    }
}

impl TestApp {
    pub async fn post_json(&self, uri: &str, body: &str) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn pay(&self, correlation_id: &str, amount: &str) -> StatusCode {
        let body = format!(r#"{{"correlationId":"{correlation_id}","amount":{amount}}}"#);
        self.post_json("/payments", &body).await.status()
    }

    /// Waits for admitted payments to finish and for their records to land.
    pub async fn settle(&self, expected_records: usize) {
        self.state.worker_pool.wait().await;
        self.state.payments.flush().await;
        assert_eq!(self.store.len().await, expected_records);
    }
}

/// A deterministic, non-nil correlation id.
pub fn correlation_id(n: u128) -> String {
    Uuid::from_u128(n).to_string()
}

pub async fn json_body<T: DeserializeOwned>(response: Response<Body>) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
