// Extract -> transform -> load, in-process or through handoff files

pub mod handoff;
pub mod orchestrator;
pub mod processing;

pub use orchestrator::{Pipeline, PipelineResult};
