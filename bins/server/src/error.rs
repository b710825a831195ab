#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("store: {0}")]
    Store(#[from] summary_api::StoreError),

    #[error("[{}] {}", .0.stage(), .0)]
    Pipeline(#[from] pipeline::PipelineError),
}
