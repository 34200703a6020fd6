//! Second stage: write the code that implements the plan.

use tracing::info;

use super::decompose::{Decomposition, SECTION_DELIMITER};
use crate::config::PipelineConfig;
use crate::error::{InferenceError, PipelineError, Stage};
use crate::inference::InferenceClient;
use crate::models::{GenerationResult, InferenceCallParams};

pub fn generation_prompt(message: &str, code_language: &str, decomposition: &Decomposition) -> String {
    format!(
        "Generate the {code_language} code for the following request:\
         {SECTION_DELIMITER}{message}{SECTION_DELIMITER}\
         Implement it according to these steps:\
         {SECTION_DELIMITER}{steps}{SECTION_DELIMITER}\
         Take your time to ensure accuracy and completeness. \
         Respond only with the generated {code_language} code, nothing else: \
         no explanations and no markdown code fences.",
        steps = decomposition.text(),
    )
}

/// Trim the reply and drop an enclosing ``` fence, with or without a
/// language tag.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut code = raw.trim();

    if let Some(rest) = code.strip_prefix("```") {
        // A language tag only exists when a newline follows it.
        code = match rest.split_once('\n') {
            Some((_tag, body)) => body,
            None => rest,
        };
        code = code.trim_end();
        if let Some(body) = code.strip_suffix("```") {
            code = body;
        }
    }

    code.trim()
}

pub async fn generate(
    client: &InferenceClient,
    config: &PipelineConfig,
    message: &str,
    code_language: &str,
    decomposition: &Decomposition,
) -> Result<GenerationResult, PipelineError> {
    let tag = |source: InferenceError| PipelineError::Stage {
        stage: Stage::Generation,
        source,
    };

    let params = InferenceCallParams {
        model_id: config.model_id.clone(),
        max_tokens: config.generate_max_tokens,
        temperature: config.temperature,
        system_prompt: config.system_prompt.clone(),
        user_prompt: generation_prompt(message, code_language, decomposition),
        timeout_seconds: config.timeout.as_secs(),
        max_retries: config.max_retries,
    };

    let raw = client.complete(&params).await.map_err(tag)?;

    let code = strip_code_fences(&raw);
    if code.is_empty() {
        return Err(tag(InferenceError::Extraction(
            "response contained only code fence markup".into(),
        )));
    }

    info!(bytes = code.len(), "Code generated");
    Ok(GenerationResult {
        code: code.to_string(),
    })
}
