use summary_api::{EntityId, ErrorKind, StoreError, SummaryKey};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("change log is empty, no resume point")]
    NoResumePoint,

    #[error("change log unavailable: {0}")]
    SourceUnavailable(StoreError),

    #[error("stream broken: {0}")]
    StreamBroken(StoreError),

    #[error("entity {0} not found")]
    NotFound(EntityId),

    #[error("load {id}: {source}")]
    LoadFailed { id: EntityId, source: StoreError },

    #[error("persist {key}: {source}")]
    PersistFailed { key: SummaryKey, source: StoreError },

    #[error("{stage} stage failed: {detail}")]
    StageFailed { stage: &'static str, detail: String },
}

impl PipelineError {
    /// Имя стадии, на которой произошла ошибка.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::NoResumePoint | PipelineError::SourceUnavailable(_) => "resume",
            PipelineError::StreamBroken(_) => "subscribe",
            PipelineError::NotFound(_)
            | PipelineError::LoadFailed { .. }
            | PipelineError::PersistFailed { .. } => "recompute",
            PipelineError::StageFailed { stage, .. } => stage,
        }
    }

    /// Kind ошибки backend'а, если остановка пришла из него.
    pub fn store_kind(&self) -> Option<ErrorKind> {
        match self {
            PipelineError::SourceUnavailable(e)
            | PipelineError::StreamBroken(e)
            | PipelineError::LoadFailed { source: e, .. }
            | PipelineError::PersistFailed { source: e, .. } => Some(e.kind()),
            PipelineError::NoResumePoint | PipelineError::NotFound(_) | PipelineError::StageFailed { .. } => None,
        }
    }
}
