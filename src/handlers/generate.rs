use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::{GenerationRequest, GenerationResult};
use crate::state::AppState;

pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Json<GenerationResult>, ApiError> {
    REQUEST_TOTAL.inc();
    let Json(payload) = payload.map_err(|rejection| {
        warn!(status = %rejection.status(), "Rejected request body");
        ApiError::InvalidBody(rejection.body_text())
    })?;
    let start_time = Instant::now();

    let result = state.pipeline.run(&payload).await;

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    match result {
        Ok(generated) => {
            info!(elapsed_ms = start_time.elapsed().as_millis() as u64, "Request served");
            Ok(Json(generated))
        }
        Err(e) => {
            let api_error = ApiError::from(e);
            if let ApiError::GenerationFailure(detail) = &api_error {
                error!(%detail, "Error in generate handler");
            }
            Err(api_error)
        }
    }
}
