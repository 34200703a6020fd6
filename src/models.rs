use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{InferenceError, PipelineError};

/// Incoming code request. Fields are optional so a missing one is reported
/// by name instead of failing JSON decoding.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct GenerationRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code_language: Option<String>,
}

impl GenerationRequest {
    pub fn new(message: impl Into<String>, code_language: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            code_language: Some(code_language.into()),
        }
    }

    /// Returns `(message, code_language)` once both are present and non-blank.
    pub fn validate(&self) -> Result<(&str, &str), PipelineError> {
        let message = required(&self.message, "message")?;
        let code_language = required(&self.code_language, "code_language")?;
        Ok((message, code_language))
    }
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, PipelineError> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(PipelineError::InvalidInput { field }),
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct GenerationResult {
    pub code: String,
}

/// Everything one backend call needs. Built fresh for every call.
#[derive(Debug, Clone)]
pub struct InferenceCallParams {
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system_prompt: String,
    pub user_prompt: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl InferenceCallParams {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

// Ollama API request format
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default)]
    pub stream: bool,
    pub options: GenerateOptions,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct GenerateOptions {
    pub temperature: f32,
    // Ollama's name for the output token cap
    pub num_predict: u32,
}

impl From<&InferenceCallParams> for GenerateRequest {
    fn from(params: &InferenceCallParams) -> Self {
        Self {
            model: params.model_id.clone(),
            prompt: params.user_prompt.clone(),
            system: Some(params.system_prompt.clone()).filter(|s| !s.is_empty()),
            stream: false,
            options: GenerateOptions {
                temperature: params.temperature,
                num_predict: params.max_tokens,
            },
        }
    }
}

/// Ollama API response format. Only `response` is returned to callers; the
/// other fields are logged.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct InferenceResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub eval_count: Option<u32>,
}

impl InferenceResponse {
    /// The generated text, or `Extraction` if the reply has none.
    pub fn text(&self) -> Result<&str, InferenceError> {
        match self.response.as_deref() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            Some(_) => Err(InferenceError::Extraction("response text is blank".into())),
            None => Err(InferenceError::Extraction("response field is missing".into())),
        }
    }
}
