pub mod config;
pub mod error;
mod extract;
mod pipeline;
mod recompute;
mod resume;
mod source;
mod stats;
mod tail;

pub use config::{MissingEntityPolicy, PipelineConfig};
pub use error::PipelineError;
pub use extract::{DropReason, entity_id_from_json, extract_entity_id};
pub use pipeline::Pipeline;
pub use recompute::{RecomputeOutcome, Recomputer};
pub use resume::resolve_resume_position;
pub use source::{TRACKED_OPS, change_filter, subscribe};
pub use stats::{PipelineStats, StatsSnapshot};
pub use tail::tail_log;
