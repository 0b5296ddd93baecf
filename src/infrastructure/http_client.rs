//! HTTP client for the downstream payment processors

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;

use crate::config::ProcessorTimeouts;
use crate::error::ProcessorError;
use crate::models::{
    HealthStatus, PaymentRequest, PaymentResponse, PaymentSummaryFilters, ProcessorProvider,
    Summary, format_timestamp,
};
use crate::ports::PaymentProcessor;

const ADMIN_TOKEN_HEADER: &str = "X-Rinha-Token";

/// Shared connection pool for every processor client.
pub fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(50)
        .connect_timeout(Duration::from_secs(5))
        .build()
}

#[derive(Deserialize)]
struct ProcessorMessage {
    message: String,
}

pub struct ProcessorClient {
    client: reqwest::Client,
    base_url: String,
    provider: ProcessorProvider,
    timeouts: ProcessorTimeouts,
    admin_token: Option<String>,
}

impl ProcessorClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        provider: ProcessorProvider,
        timeouts: ProcessorTimeouts,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            provider,
            timeouts,
            admin_token: None,
        }
    }

    pub fn with_admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token;
        self
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ProcessorError> {
        let response = request
            .send()
            .await
            .map_err(|err| ProcessorError::from_reqwest(self.provider, err))?;

        if !response.status().is_success() {
            return Err(ProcessorError::InvalidStatusCode {
                provider: self.provider,
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl PaymentProcessor for ProcessorClient {
    fn provider(&self) -> ProcessorProvider {
        self.provider
    }

    async fn process_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentResponse, ProcessorError> {
        let url = format!("{}/payments", self.base_url);
        let response = self
            .send(
                self.client
                    .post(url)
                    .json(request)
                    .timeout(self.timeouts.payment),
            )
            .await?;

        // the body is informational only
        let message = response
            .json::<ProcessorMessage>()
            .await
            .map(|body| body.message)
            .unwrap_or_else(|_| "success".to_string());

        Ok(PaymentResponse {
            message,
            processor_provider: self.provider,
        })
    }

    async fn payments_summary(
        &self,
        filters: &PaymentSummaryFilters,
    ) -> Result<Summary, ProcessorError> {
        let url = format!("{}/admin/payments-summary", self.base_url);
        let mut query: Vec<(&str, String)> = Vec::with_capacity(2);
        if let Some(from) = filters.from {
            query.push(("from", format_timestamp(from)));
        }
        if let Some(to) = filters.to {
            query.push(("to", format_timestamp(to)));
        }

        let mut request = self
            .client
            .get(url)
            .query(&query)
            .timeout(self.timeouts.summary);
        if let Some(token) = &self.admin_token {
            request = request.header(ADMIN_TOKEN_HEADER, token);
        }

        let response = self.send(request).await?;
        let summary = response
            .json::<Summary>()
            .await
            .map_err(|err| ProcessorError::from_reqwest(self.provider, err))?;
        Ok(Summary::rounded(summary.total_requests, summary.total_amount))
    }

    async fn health(&self) -> Result<HealthStatus, ProcessorError> {
        let url = format!("{}/payments/service-health", self.base_url);
        let response = self
            .send(self.client.get(url).timeout(self.timeouts.health))
            .await?;
        response
            .json::<HealthStatus>()
            .await
            .map_err(|err| ProcessorError::from_reqwest(self.provider, err))
    }
}
