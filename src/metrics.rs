use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Histogram, HistogramVec, register_counter, register_counter_vec,
    register_histogram, register_histogram_vec,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("codegen_requests_total", "Total number of generate requests").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "codegen_request_latency_seconds",
        "End-to-end request latency in seconds"
    )
    .unwrap();
    pub static ref STAGE_LATENCY: HistogramVec = register_histogram_vec!(
        "codegen_stage_latency_seconds",
        "Latency of each pipeline stage in seconds",
        &["stage"]
    )
    .unwrap();
    pub static ref STAGE_FAILURES: CounterVec = register_counter_vec!(
        "codegen_stage_failures_total",
        "Pipeline failures by stage",
        &["stage"]
    )
    .unwrap();
    pub static ref BACKEND_ATTEMPTS: Counter =
        register_counter!("codegen_backend_attempts_total", "Inference backend attempts").unwrap();
    pub static ref BACKEND_RETRIES: Counter =
        register_counter!("codegen_backend_retries_total", "Inference retries after transient failures").unwrap();
}
