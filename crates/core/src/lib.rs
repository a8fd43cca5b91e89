//! # PixelForge Core
//!
//! Orchestration core that turns visual references (screenshots, video)
//! plus free-text instructions into generated application code.
//!
//! ## Architecture
//!
//! - `stages/` - Pure pipeline stages (Router, Surveyor, Physicist,
//!   Photographer, Architect, Builder, Live Editor, Critic)
//! - `pipeline/` - The orchestrator that sequences stages, its data model,
//!   and the wall-clock budget
//! - `healing` - Iterative render/critique/patch loop closing the gap to
//!   the reference image
//! - `swarm/` - Agent-swarm executor for autonomous runs, with
//!   suspend/resume around remote command execution
//! - `client` - Retrying multimodal model adapter
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pixelforge_core::pipeline::{Orchestrator, PipelineInput, UploadedFile};
//!
//! let orchestrator = Orchestrator::new(invoker, renderer);
//! let input = PipelineInput::new(vec![UploadedFile::new(png_bytes, "image/png")], "clone this");
//! let output = orchestrator.run(&input).await?;
//! ```

pub mod autonomy;
pub mod client;
pub mod decode;
pub mod healing;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod stages;
pub mod swarm;

#[cfg(test)]
pub(crate) mod testutil;

pub use client::{HttpModelClient, InvokeOptions, ModelInvoker, PromptPart};
pub use pipeline::{Orchestrator, PipelineInput, PipelineOutput};
