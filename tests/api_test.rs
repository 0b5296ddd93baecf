mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use serde_json::Value;

use common::{correlation_id, json_body, spawn_app, spawn_app_with, test_config};
use paygate::PaymentSummaryResponse;
use paygate::handlers::ErrorResponse;

#[tokio::test]
async fn accepted_payments_show_up_in_summary() {
    let app = spawn_app();

    for n in 1..=3 {
        assert_eq!(app.pay(&correlation_id(n), "19.90").await, StatusCode::NO_CONTENT);
    }
    app.settle(3).await;

    let response = app.get("/payments-summary").await;
    assert_eq!(response.status(), StatusCode::OK);
    let summary: PaymentSummaryResponse = json_body(response).await;
    assert_eq!(summary.default.total_requests, 3);
    assert_eq!(summary.default.total_amount.round_dp(2), dec!(59.70));
    assert_eq!(summary.fallback.total_requests, 0);
    assert_eq!(app.default.accepted(), 3);
}

#[tokio::test]
async fn invalid_payloads_are_rejected() {
    let app = spawn_app();

    assert_eq!(app.pay(&correlation_id(1), "0").await, StatusCode::BAD_REQUEST);
    assert_eq!(app.pay(&correlation_id(2), "-5.00").await, StatusCode::BAD_REQUEST);
    assert_eq!(
        app.pay("00000000-0000-0000-0000-000000000000", "10.00").await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(app.pay("not-a-uuid", "1.00").await, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.pay("  ", "10.00").await, StatusCode::UNPROCESSABLE_ENTITY);

    let response = app.post_json("/payments", "{not json").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: ErrorResponse = json_body(response).await;
    assert_eq!(body.error, "error parsing body");

    let response = app.post_json("/payments", r#"{"amount":10}"#).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    app.state.worker_pool.wait().await;
    assert_eq!(app.default.calls(), 0);
    assert_eq!(app.fallback.calls(), 0);
}

#[tokio::test]
async fn default_outage_fails_over_to_fallback() {
    let app = spawn_app();
    app.default.set_down(true);

    assert_eq!(app.pay(&correlation_id(11), "10.00").await, StatusCode::NO_CONTENT);
    app.settle(1).await;

    let summary: PaymentSummaryResponse = json_body(app.get("/payments-summary").await).await;
    assert_eq!(summary.default.total_requests, 0);
    assert_eq!(summary.fallback.total_requests, 1);
    assert_eq!(summary.fallback.total_amount, dec!(10));
    assert!(app.default.calls() >= 1);
}

#[tokio::test]
async fn failing_health_report_routes_to_fallback() {
    let app = spawn_app();
    app.default.set_reports_failing(true);
    app.state.health.poll_once(app.default.as_ref()).await;

    assert_eq!(app.pay(&correlation_id(21), "5.00").await, StatusCode::NO_CONTENT);
    app.settle(1).await;

    assert_eq!(app.default.calls(), 0);
    assert_eq!(app.fallback.accepted(), 1);

    let health: Value = json_body(app.get("/health").await).await;
    assert_eq!(health["defaultProcessorFailing"], true);
}

#[tokio::test]
async fn summary_window_filters_by_requested_at() {
    let app = spawn_app();
    assert_eq!(app.pay(&correlation_id(31), "1.00").await, StatusCode::NO_CONTENT);
    app.settle(1).await;

    let from = (Utc::now() - Duration::minutes(5)).format("%Y-%m-%dT%H:%M:%S%.3fZ");
    let to = (Utc::now() + Duration::minutes(5)).format("%Y-%m-%dT%H:%M:%S%.3fZ");
    let inside: PaymentSummaryResponse =
        json_body(app.get(&format!("/payments-summary?from={from}&to={to}")).await).await;
    assert_eq!(inside.default.total_requests, 1);

    let later = (Utc::now() + Duration::hours(1)).format("%Y-%m-%dT%H:%M:%S%.3fZ");
    let much_later = (Utc::now() + Duration::hours(2)).format("%Y-%m-%dT%H:%M:%S%.3fZ");
    let outside: PaymentSummaryResponse = json_body(
        app.get(&format!("/payments-summary?from={later}&to={much_later}"))
            .await,
    )
    .await;
    assert_eq!(outside.default.total_requests, 0);
    assert_eq!(outside.default.total_amount, dec!(0));
}

#[tokio::test]
async fn unparseable_summary_bounds_are_rejected() {
    let app = spawn_app();
    let response = app.get("/payments-summary?from=yesterday").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn processors_summary_reports_processor_side_totals() {
    let app = spawn_app();
    assert_eq!(app.pay(&correlation_id(41), "2.50").await, StatusCode::NO_CONTENT);
    assert_eq!(app.pay(&correlation_id(42), "2.50").await, StatusCode::NO_CONTENT);
    app.settle(2).await;

    let response = app.get("/admin/processors-summary").await;
    assert_eq!(response.status(), StatusCode::OK);
    let totals: PaymentSummaryResponse = json_body(response).await;
    assert_eq!(totals.default.total_requests, 2);
    assert_eq!(totals.default.total_amount, dec!(5.00));
    assert_eq!(totals.fallback.total_requests, 0);
}

#[tokio::test]
async fn health_reports_breaker_and_pool() {
    let app = spawn_app_with(test_config(&[("MAX_WORKERS", "8")]));

    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let health: Value = json_body(response).await;
    assert_eq!(health["breaker"], "closed");
    assert_eq!(health["breakerFailures"], 0);
    assert_eq!(health["defaultProcessorFailing"], false);
    assert_eq!(health["availableWorkers"], 8);
    assert_eq!(health["inFlight"], 0);
    assert!(health["sync"].is_string());
}

#[tokio::test]
async fn closed_pool_turns_payments_away() {
    let app = spawn_app();
    app.state.worker_pool.close();

    let response = app
        .post_json("/payments", r#"{"correlationId":"9b2f6c1e-3a0d-4e57-8c61-2f4b8d7e1a90","amount":1.00}"#)
        .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(app.default.calls(), 0);
}
