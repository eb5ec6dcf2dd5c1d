// src/pipeline/mod.rs
pub mod orchestrator;
pub mod state;

pub use orchestrator::{CampaignOrchestrator, CommandOutcome, PipelineServices};
pub use state::{PipelineSnapshot, Stage};
