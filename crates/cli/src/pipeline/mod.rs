//! Pipeline orchestration module.

mod orchestrator;
mod stats;
mod tap;

pub use orchestrator::{Pipeline, PipelineConfig};
pub use stats::PipelineStats;
pub use tap::StatsTap;
