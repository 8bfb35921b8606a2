//! reqwest-backed transport
//!
//! Posts query bodies to a Druid broker with a request timeout and retries
//! connection failures and rate limiting with quadratic backoff.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use super::{join_url, Transport, TransportResult};
use crate::config::DruidConfig;

/// Base delay between retries; attempt `n` waits `n² × base`
const RETRY_BASE_MS: u64 = 250;

/// Fallback wait when a 429 carries no usable `Retry-After`
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// HTTP transport for a Druid broker
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    max_retries: u32,
}

impl HttpTransport {
    /// Create a transport for `endpoint`
    pub fn new(
        endpoint: impl Into<String>,
        request_timeout_ms: u64,
        max_retries: u32,
    ) -> TransportResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            max_retries: max_retries.max(1),
        })
    }

    pub fn from_config(config: &DruidConfig) -> TransportResult<Self> {
        Self::new(&config.url, config.request_timeout_ms, config.max_retries)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Send a request with retry logic, returning the first successful response
    async fn send_with_retry<F>(&self, build: F) -> TransportResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_error = TransportError::Unavailable;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(RETRY_BASE_MS * (attempt as u64).pow(2));
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying request");
                tokio::time::sleep(delay).await;
            }

            match build().send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if response.status().as_u16() == 429 => {
                    let wait = response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                    tracing::warn!(wait_secs = wait, "rate limited by broker");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                    last_error = TransportError::RateLimited;
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    return Err(TransportError::ApiError {
                        status: status.as_u16(),
                        message: text,
                    });
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "request failed");
                    last_error = classify(e);
                }
            }
        }

        Err(last_error)
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Unavailable
    } else {
        TransportError::Request(e)
    }
}

async fn decode(response: Response) -> TransportResult<Value> {
    response
        .json::<Value>()
        .await
        .map_err(|e| TransportError::Decode(e.to_string()))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, body: &Value) -> TransportResult<Value> {
        let payload = serde_json::to_vec(body).map_err(|e| TransportError::Decode(e.to_string()))?;
        tracing::debug!(endpoint = %self.endpoint, body = %body, "POST query");

        let response = self
            .send_with_retry(|| {
                self.client
                    .post(&self.endpoint)
                    .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                    .body(payload.clone())
            })
            .await?;
        decode(response).await
    }

    async fn get_json(&self, path: &str) -> TransportResult<Value> {
        let url = join_url(&self.endpoint, path);
        tracing::debug!(url = %url, "GET");
        let response = self.send_with_retry(|| self.client.get(&url)).await?;
        decode(response).await
    }

    async fn delete(&self, path: &str) -> TransportResult<()> {
        let url = join_url(&self.endpoint, path);
        tracing::debug!(url = %url, "DELETE");
        self.send_with_retry(|| self.client.delete(&url)).await?;
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Errors that can occur when talking to the broker
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Druid broker unavailable")]
    Unavailable,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Request timeout")]
    Timeout,

    #[error("Rate limited")]
    RateLimited,

    #[error("Invalid JSON response: {0}")]
    Decode(String),
}
