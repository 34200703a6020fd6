//! Error types for each layer: inference call, pipeline, HTTP boundary.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

/// Failures from a single inference call, retries included.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// Endpoint unreachable, permanently rejected the call, timed out, or
    /// kept failing transiently until the retry budget ran out.
    #[error("backend error after {attempts} attempt(s): {message}")]
    Backend { attempts: u32, message: String },

    /// The backend answered but the reply carried no usable text.
    #[error("could not extract text from backend response: {0}")]
    Extraction(String),
}

/// Which half of the pipeline produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decomposition,
    Generation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Decomposition => "decomposition",
            Stage::Generation => "generation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A required request field is missing or blank. Raised before any
    /// network call.
    #[error("Missing required parameter: {field}")]
    InvalidInput { field: &'static str },

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: InferenceError,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            PipelineError::InvalidInput { .. } => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// What the HTTP caller sees.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// The body was not a JSON object of the expected shape.
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("{0}")]
    GenerationFailure(String),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidInput { field } => ApiError::MissingParameter(field),
            other => ApiError::GenerationFailure(other.to_string()),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingParameter(_) | ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::GenerationFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}
