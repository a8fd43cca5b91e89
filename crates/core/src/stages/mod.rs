//! # Pipeline Stages
//!
//! Pure stage contracts: each stage takes typed inputs plus the model
//! adapter and returns a typed output. Stages never talk to each other
//! directly - the orchestrator owns all sequencing.
//!
//! **Generator stages** (Router, Surveyor, Physicist, Photographer,
//! Architect, Builder, Live Editor) tolerate malformed model output by
//! degrading to a typed default. The **Critic** is the exception: a score
//! the healing loop cannot parse is an error.

pub mod architect;
pub mod builder;
pub mod critic;
pub mod editor;
pub mod photographer;
pub mod physicist;
pub mod router;
pub mod surveyor;

pub use architect::ArchitectStage;
pub use builder::{BuildRequest, BuilderStage};
pub use critic::CriticStage;
pub use editor::LiveEditorStage;
pub use photographer::{AssetExtractorStage, PhotographerStage};
pub use physicist::PhysicistStage;
pub use router::RouterStage;
pub use surveyor::SurveyorStage;
