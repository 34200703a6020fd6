use clap::Parser; // for cli
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use codegen_gateway::backend::OllamaTransport;
use codegen_gateway::config::{Args, PipelineConfig, normalize_backend_url};
use codegen_gateway::pipeline::Pipeline;
use codegen_gateway::router;
use codegen_gateway::state::AppState;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // parse cli arguments
    let args = Args::parse();
    let config = PipelineConfig::try_from(&args)?;
    let backend_url = normalize_backend_url(&args.backend)?;

    let transport = OllamaTransport::new(backend_url, CONNECT_TIMEOUT)?;
    info!(backend = transport.base_url(), "Forwarding inference calls");
    info!(
        model = %config.model_id,
        temperature = config.temperature,
        timeout_secs = config.timeout.as_secs(),
        max_retries = config.max_retries,
        "Pipeline configured"
    );

    let state = Arc::new(AppState {
        pipeline: Pipeline::new(Arc::new(transport), config),
    });

    let app = router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Gateway running on http://localhost:{}", args.port);

    axum::serve(listener, app).await?;
    Ok(())
}
