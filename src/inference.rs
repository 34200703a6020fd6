//! Inference client: one logical call to the model backend.
//!
//! A `Transport` makes a single HTTP attempt. `InferenceClient` wraps it with
//! the overall timeout, bounded retry of transient failures, and text
//! extraction from the reply.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, instrument, warn};

use crate::error::InferenceError;
use crate::metrics::{BACKEND_ATTEMPTS, BACKEND_RETRIES};
use crate::models::{InferenceCallParams, InferenceResponse};

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Outcome of a failed single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// Throttling, 5xx, connect or read failure. Worth another try.
    Transient(String),
    /// The backend refused the call for good (bad model, bad request).
    Permanent(String),
    /// The backend answered but the body could not be decoded.
    Malformed(String),
}

/// One request/response exchange with the inference backend.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, params: &InferenceCallParams) -> Result<InferenceResponse, AttemptError>;
}

#[derive(Clone)]
pub struct InferenceClient {
    transport: Arc<dyn Transport>,
    initial_backoff: Duration,
}

impl InferenceClient {
    pub fn new(transport: Arc<dyn Transport>, initial_backoff: Duration) -> Self {
        Self {
            transport,
            initial_backoff,
        }
    }

    /// Run one inference call and return the non-empty reply text.
    ///
    /// At most `max_retries + 1` attempts are made, all within
    /// `timeout_seconds`. Only transient failures are retried.
    #[instrument(skip_all, fields(model = %params.model_id, max_tokens = params.max_tokens))]
    pub async fn complete(&self, params: &InferenceCallParams) -> Result<String, InferenceError> {
        let mut attempts = 0u32;
        let outcome = timeout(params.timeout(), self.attempt_until_done(params, &mut attempts)).await;

        match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(attempts, timeout_secs = params.timeout_seconds, "Inference call timed out");
                Err(InferenceError::Backend {
                    attempts,
                    message: format!("timed out after {}s", params.timeout_seconds),
                })
            }
        }
    }

    async fn attempt_until_done(
        &self,
        params: &InferenceCallParams,
        attempts: &mut u32,
    ) -> Result<String, InferenceError> {
        let max_attempts = params.max_retries.saturating_add(1);
        let mut backoff = self.initial_backoff;

        loop {
            *attempts += 1;
            BACKEND_ATTEMPTS.inc();
            debug!(attempt = *attempts, max_attempts, "Calling backend");

            match self.transport.send(params).await {
                Ok(response) => {
                    debug!(
                        model = response.model.as_deref().unwrap_or("unknown"),
                        done_reason = response.done_reason.as_deref().unwrap_or("unknown"),
                        eval_count = response.eval_count.unwrap_or(0),
                        "Backend replied"
                    );
                    if *attempts > 1 {
                        debug!(attempt = *attempts, "Backend succeeded after retry");
                    }
                    return response.text().map(|text| text.to_string());
                }
                Err(AttemptError::Malformed(detail)) => {
                    warn!(%detail, "Backend reply could not be decoded");
                    return Err(InferenceError::Extraction(detail));
                }
                Err(AttemptError::Permanent(detail)) => {
                    warn!(%detail, "Backend rejected the call, not retrying");
                    return Err(InferenceError::Backend {
                        attempts: *attempts,
                        message: detail,
                    });
                }
                Err(AttemptError::Transient(detail)) => {
                    if *attempts >= max_attempts {
                        warn!(attempts = *attempts, %detail, "All retry attempts exhausted");
                        return Err(InferenceError::Backend {
                            attempts: *attempts,
                            message: detail,
                        });
                    }

                    BACKEND_RETRIES.inc();
                    debug!(backoff_ms = backoff.as_millis() as u64, %detail, "Retrying after transient failure");
                    sleep(backoff).await;
                    backoff = std::cmp::min(backoff.saturating_mul(2), MAX_BACKOFF);
                }
            }
        }
    }
}
