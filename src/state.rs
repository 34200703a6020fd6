use crate::pipeline::Pipeline;

// app's shared state
pub struct AppState {
    pub pipeline: Pipeline,
}
