//! First stage: turn a request into a numbered implementation plan.

use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Stage};
use crate::inference::InferenceClient;
use crate::models::InferenceCallParams;

pub(crate) const SECTION_DELIMITER: &str = "\n###\n";

/// The plan produced by the first stage, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decomposition {
    text: String,
}

impl Decomposition {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Step descriptions from lines like `1. do x` or `2) do y`, in order.
    /// Lines that are not numbered are ignored.
    pub fn steps(&self) -> Vec<&str> {
        self.text.lines().filter_map(numbered_step).collect()
    }
}

fn numbered_step(line: &str) -> Option<&str> {
    let line = line.trim_start();
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    let rest = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'))?;
    let step = rest.trim();
    (!step.is_empty()).then_some(step)
}

pub fn decomposition_prompt(message: &str, code_language: &str) -> String {
    format!(
        "Analyze the following request and determine the necessary steps to accomplish it in {code_language}:\
         {SECTION_DELIMITER}{message}{SECTION_DELIMITER}\
         Respond only with a numbered list of steps, nothing else."
    )
}

pub async fn decompose(
    client: &InferenceClient,
    config: &PipelineConfig,
    message: &str,
    code_language: &str,
) -> Result<Decomposition, PipelineError> {
    if message.trim().is_empty() {
        return Err(PipelineError::InvalidInput { field: "message" });
    }
    if code_language.trim().is_empty() {
        return Err(PipelineError::InvalidInput {
            field: "code_language",
        });
    }

    let params = InferenceCallParams {
        model_id: config.model_id.clone(),
        max_tokens: config.decompose_max_tokens,
        temperature: config.temperature,
        system_prompt: config.system_prompt.clone(),
        user_prompt: decomposition_prompt(message, code_language),
        timeout_seconds: config.timeout.as_secs(),
        max_retries: config.max_retries,
    };

    let text = client
        .complete(&params)
        .await
        .map_err(|source| PipelineError::Stage {
            stage: Stage::Decomposition,
            source,
        })?;

    let decomposition = Decomposition::new(text);
    let steps = decomposition.steps().len();
    if steps == 0 {
        warn!("Decomposition has no numbered steps, passing it through as-is");
    } else {
        info!(steps, "Decomposition ready");
    }
    Ok(decomposition)
}
