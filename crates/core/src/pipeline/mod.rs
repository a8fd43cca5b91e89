//! # Pipeline
//!
//! Run-level driver and its data model. [`orchestrator::Orchestrator`] is
//! the crate's main entry point.

pub mod budget;
pub mod orchestrator;
pub mod types;

pub use budget::{Budget, PipelineError, DEFAULT_BUDGET_SECS};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use types::{AppFile, PipelineInput, PipelineOutput, RepoContext, StepTiming, UploadedFile};
