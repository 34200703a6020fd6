//! HTTP transport for an Ollama-compatible `/api/generate` endpoint.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

use crate::error::ConfigError;
use crate::inference::{AttemptError, Transport};
use crate::models::{GenerateRequest, InferenceCallParams, InferenceResponse};

pub struct OllamaTransport {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaTransport {
    pub fn new(base_url: String, connect_timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

// Status codes worth retrying: throttling and upstream hiccups.
fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::REQUEST_TIMEOUT
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

#[async_trait]
impl Transport for OllamaTransport {
    async fn send(&self, params: &InferenceCallParams) -> Result<InferenceResponse, AttemptError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest::from(params);

        let res = self
            .client
            .post(&url)
            .timeout(params.timeout())
            .json(&body)
            .send()
            .await
            .map_err(|e| AttemptError::Transient(format!("Request failed: {}", e)))?;

        let status = res.status();
        if !status.is_success() {
            let detail = res.text().await.unwrap_or_default();
            let message = format!("HTTP {}: {}", status, detail.trim());
            debug!(%status, "Backend returned error status");
            return Err(if is_transient(status) {
                AttemptError::Transient(message)
            } else {
                AttemptError::Permanent(message)
            });
        }

        // Read the body first so a dropped connection stays transient and
        // only a bad payload counts as malformed.
        let bytes = res
            .bytes()
            .await
            .map_err(|e| AttemptError::Transient(format!("Reading body failed: {}", e)))?;

        serde_json::from_slice::<InferenceResponse>(&bytes)
            .map_err(|e| AttemptError::Malformed(format!("Parse Error: {}", e)))
    }
}
