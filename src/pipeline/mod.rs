//! Two-stage code generation: decompose the request into steps, then
//! generate code from those steps.
//!
//! A run moves `Decomposing -> Generating -> Done`. Any failure ends the run
//! with a stage-tagged error and no partial output.

pub mod decompose;
pub mod generate;

use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::inference::{InferenceClient, Transport};
use crate::metrics::{STAGE_FAILURES, STAGE_LATENCY};
use crate::models::{GenerationRequest, GenerationResult};

pub use decompose::Decomposition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Decomposing,
    Generating,
    Done,
}

pub struct Pipeline {
    client: InferenceClient,
    config: PipelineConfig,
}

impl Pipeline {
    /// The client's retry backoff comes from `config.retry_backoff`.
    pub fn new(transport: Arc<dyn Transport>, config: PipelineConfig) -> Self {
        let client = InferenceClient::new(transport, config.retry_backoff);
        Self { client, config }
    }

    /// Validate the request, then run both stages in order.
    pub async fn run(&self, request: &GenerationRequest) -> Result<GenerationResult, PipelineError> {
        let (message, code_language) = request.validate()?;

        let span = info_span!("pipeline", language = %code_language);
        let result = self.run_stages(message, code_language).instrument(span).await;

        if let Err(err) = &result {
            if let Some(stage) = err.stage() {
                STAGE_FAILURES.with_label_values(&[stage.as_str()]).inc();
                warn!(%stage, error = %err, "Pipeline failed");
            }
        }
        result
    }

    async fn run_stages(
        &self,
        message: &str,
        code_language: &str,
    ) -> Result<GenerationResult, PipelineError> {
        let mut state = PipelineState::Decomposing;
        debug!(?state, "Pipeline started");

        let started = Instant::now();
        let plan = decompose::decompose(&self.client, &self.config, message, code_language).await?;
        STAGE_LATENCY
            .with_label_values(&["decomposition"])
            .observe(started.elapsed().as_secs_f64());

        state = PipelineState::Generating;
        debug!(?state, "Decomposition complete");

        let started = Instant::now();
        let result =
            generate::generate(&self.client, &self.config, message, code_language, &plan).await?;
        STAGE_LATENCY
            .with_label_values(&["generation"])
            .observe(started.elapsed().as_secs_f64());

        state = PipelineState::Done;
        info!(?state, "Pipeline finished");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InferenceError, Stage};
    use crate::inference::AttemptError;
    use crate::inference::testing::{ScriptedTransport, text, throttled};
    use crate::models::InferenceResponse;
    use std::time::Duration;

    const PLAN: &str = "1. Define a function add(a, b)\n2. Return a + b";
    const FUNCTION: &str = "def add(a, b):\n    return a + b";

    fn pipeline(transport: Arc<ScriptedTransport>, max_retries: u32) -> Pipeline {
        let config = PipelineConfig {
            max_retries,
            retry_backoff: Duration::ZERO,
            ..PipelineConfig::default()
        };
        Pipeline::new(transport, config)
    }

    #[tokio::test]
    async fn sum_two_numbers_end_to_end() {
        let transport = Arc::new(ScriptedTransport::new(vec![text(PLAN), text(FUNCTION)]));
        let result = pipeline(transport.clone(), 2)
            .run(&GenerationRequest::new("sum two numbers", "python"))
            .await
            .unwrap();

        assert_eq!(result, GenerationResult { code: FUNCTION.into() });
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn missing_message_makes_no_backend_calls() {
        let transport = Arc::new(ScriptedTransport::new(vec![text(PLAN), text(FUNCTION)]));
        let request: GenerationRequest =
            serde_json::from_str(r#"{"code_language": "python"}"#).unwrap();

        let err = pipeline(transport.clone(), 2).run(&request).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput { field: "message" }));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn blank_fields_make_no_backend_calls() {
        let transport = Arc::new(ScriptedTransport::new(vec![text(PLAN), text(FUNCTION)]));
        let p = pipeline(transport.clone(), 2);

        for request in [
            GenerationRequest::new("", "python"),
            GenerationRequest::new("sum", "\t"),
            GenerationRequest::default(),
        ] {
            assert!(matches!(
                p.run(&request).await,
                Err(PipelineError::InvalidInput { .. })
            ));
        }
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn generation_prompt_carries_this_runs_plan() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            text("1. first plan"),
            text("code one"),
            text("1. second plan"),
            text("code two"),
        ]));
        let p = pipeline(transport.clone(), 0);

        p.run(&GenerationRequest::new("one", "go")).await.unwrap();
        p.run(&GenerationRequest::new("two", "go")).await.unwrap();

        let prompts = transport.prompts();
        assert!(prompts[1].contains("1. first plan"));
        assert!(!prompts[1].contains("second plan"));
        assert!(prompts[3].contains("1. second plan"));
        assert!(!prompts[3].contains("first plan"));
    }

    #[tokio::test]
    async fn backend_errors_are_tagged_by_stage() {
        let decomposition_fails = Arc::new(ScriptedTransport::new(vec![throttled()]));
        let err = pipeline(decomposition_fails, 0)
            .run(&GenerationRequest::new("sum", "python"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Stage { stage: Stage::Decomposition, source: InferenceError::Backend { .. } }
        ));

        let generation_fails = Arc::new(ScriptedTransport::new(vec![text(PLAN), throttled()]));
        let err = pipeline(generation_fails, 0)
            .run(&GenerationRequest::new("sum", "python"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Stage { stage: Stage::Generation, source: InferenceError::Backend { .. } }
        ));
    }

    #[tokio::test]
    async fn retries_within_budget_still_succeed() {
        let max_retries = 3;
        let mut script = vec![text(PLAN)];
        script.extend((0..max_retries - 1).map(|_| throttled()));
        script.push(text(FUNCTION));
        let transport = Arc::new(ScriptedTransport::new(script));

        let result = pipeline(transport.clone(), max_retries)
            .run(&GenerationRequest::new("sum two numbers", "python"))
            .await
            .unwrap();
        assert_eq!(result.code, FUNCTION);
    }

    #[tokio::test]
    async fn too_many_failures_surface_backend_error() {
        let max_retries = 2;
        let script: Vec<_> = (0..max_retries + 1).map(|_| throttled()).collect();
        let transport = Arc::new(ScriptedTransport::new(script));

        let err = pipeline(transport.clone(), max_retries)
            .run(&GenerationRequest::new("sum two numbers", "python"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Stage { source: InferenceError::Backend { attempts: 3, .. }, .. }
        ));
        assert_eq!(transport.calls(), (max_retries + 1) as usize);
    }

    #[tokio::test]
    async fn missing_text_in_generation_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            text(PLAN),
            Ok(InferenceResponse {
                model: Some("test-model".into()),
                done_reason: Some("stop".into()),
                ..InferenceResponse::default()
            }),
            text(FUNCTION),
        ]));

        let err = pipeline(transport.clone(), 3)
            .run(&GenerationRequest::new("sum two numbers", "python"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Stage { stage: Stage::Generation, source: InferenceError::Extraction(_) }
        ));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn fenced_code_is_returned_bare() {
        let fenced = format!("```python\n{FUNCTION}\n```");
        let transport = Arc::new(ScriptedTransport::new(vec![text(PLAN), text(&fenced)]));

        let result = pipeline(transport, 0)
            .run(&GenerationRequest::new("sum two numbers", "python"))
            .await
            .unwrap();
        assert_eq!(result.code, FUNCTION);
    }

    #[tokio::test]
    async fn permanent_decomposition_failure_skips_generation() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(AttemptError::Permanent("HTTP 404 Not Found: model not found".into())),
            text(FUNCTION),
        ]));

        let err = pipeline(transport.clone(), 3)
            .run(&GenerationRequest::new("sum", "python"))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Decomposition));
        assert_eq!(transport.calls(), 1);
    }
}
