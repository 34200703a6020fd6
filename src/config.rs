use clap::Parser;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a lead software engineer. Be clear and concise.";

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "codegen-gateway")]
#[command(about = "Two-stage code generation gateway: plan the steps, then write the code")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "CODEGEN_PORT", default_value_t = 8080)]
    pub port: u16,

    // Inference endpoint, e.g. "localhost:11434" or "http://gpu-box:11434"
    #[arg(short, long, env = "CODEGEN_BACKEND", default_value = "localhost:11434")]
    pub backend: String,

    // Model used for both stages
    #[arg(short, long, env = "CODEGEN_MODEL", default_value = "qwen3-coder:30b")]
    pub model: String,

    // Token budget for the step list
    #[arg(long, env = "CODEGEN_DECOMPOSE_MAX_TOKENS", default_value_t = 1024)]
    pub decompose_max_tokens: u32,

    // Token budget for the code itself
    #[arg(long, env = "CODEGEN_GENERATE_MAX_TOKENS", default_value_t = 2048)]
    pub generate_max_tokens: u32,

    #[arg(long, env = "CODEGEN_TEMPERATURE", default_value_t = 0.2)]
    pub temperature: f32,

    // Ceiling for one inference call, retries included
    #[arg(long, env = "CODEGEN_TIMEOUT_SECS", default_value_t = 300)]
    pub timeout_secs: u64,

    // Retries after the first attempt on transient failures
    #[arg(long, env = "CODEGEN_MAX_RETRIES", default_value_t = 2)]
    pub max_retries: u32,

    // First retry delay in milliseconds, doubled on each retry
    #[arg(long, env = "CODEGEN_RETRY_BACKOFF_MS", default_value_t = 200)]
    pub retry_backoff_ms: u64,

    #[arg(long, env = "CODEGEN_SYSTEM_PROMPT", default_value = DEFAULT_SYSTEM_PROMPT)]
    pub system_prompt: String,
}

/// Static settings shared by every pipeline run.
///
/// Built once at startup and never mutated; each inference call derives its
/// own `InferenceCallParams` from it.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub model_id: String,
    pub decompose_max_tokens: u32,
    pub generate_max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub system_prompt: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_id: "qwen3-coder:30b".to_string(),
            decompose_max_tokens: 1024,
            generate_max_tokens: 2048,
            temperature: 0.2,
            timeout: Duration::from_secs(300),
            max_retries: 2,
            retry_backoff: Duration::from_millis(200),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Reject settings that would make every request fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model_id.trim().is_empty() {
            return Err(ConfigError::Invalid("model id must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be within 0.0..=1.0, got {}",
                self.temperature
            )));
        }
        if self.decompose_max_tokens == 0 || self.generate_max_tokens == 0 {
            return Err(ConfigError::Invalid("token budgets must be positive".into()));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid("timeout must be positive".into()));
        }
        Ok(())
    }
}

impl TryFrom<&Args> for PipelineConfig {
    type Error = ConfigError;

    fn try_from(args: &Args) -> Result<Self, Self::Error> {
        let config = Self {
            model_id: args.model.trim().to_string(),
            decompose_max_tokens: args.decompose_max_tokens,
            generate_max_tokens: args.generate_max_tokens,
            temperature: args.temperature,
            timeout: Duration::from_secs(args.timeout_secs),
            max_retries: args.max_retries,
            retry_backoff: Duration::from_millis(args.retry_backoff_ms),
            system_prompt: args.system_prompt.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}

// add http:// if not present
pub fn normalize_backend_url(raw: &str) -> Result<String, ConfigError> {
    let url = raw.trim().trim_end_matches('/');
    if url.is_empty() {
        return Err(ConfigError::Invalid("backend url must not be empty".into()));
    }
    if url.starts_with("http") {
        Ok(url.to_string())
    } else {
        Ok(format!("http://{}", url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_into_valid_config() {
        let args = Args::parse_from(["codegen-gateway"]);
        let config = PipelineConfig::try_from(&args).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "codegen-gateway",
            "--model",
            "llama3",
            "--max-retries",
            "5",
            "--timeout-secs",
            "10",
            "--temperature",
            "0.0",
        ]);
        let config = PipelineConfig::try_from(&args).unwrap();
        assert_eq!(config.model_id, "llama3");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.temperature, 0.0);
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let config = PipelineConfig {
            temperature: 1.5,
            ..PipelineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn blank_model_and_zero_timeout_are_rejected() {
        let blank = PipelineConfig {
            model_id: "  ".into(),
            ..PipelineConfig::default()
        };
        assert!(blank.validate().is_err());

        let no_timeout = PipelineConfig {
            timeout: Duration::ZERO,
            ..PipelineConfig::default()
        };
        assert!(no_timeout.validate().is_err());
    }

    #[test]
    fn backend_url_gets_scheme() {
        assert_eq!(
            normalize_backend_url("localhost:11434").unwrap(),
            "http://localhost:11434"
        );
        assert_eq!(
            normalize_backend_url(" https://gpu-box:11434/ ").unwrap(),
            "https://gpu-box:11434"
        );
        assert!(normalize_backend_url("   ").is_err());
    }
}
