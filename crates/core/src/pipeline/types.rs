//! # Pipeline Types
//!
//! Input/output contract of one pipeline run. The output shape here is the
//! complete, stable surface other layers (UI, persistence) may depend on.

use crate::healing::HealingResult;
use crate::stages::photographer::AssetMap;
use crate::stages::physicist::MotionSpec;
use crate::stages::router::ExecutionStrategy;
use crate::stages::surveyor::VisualManifest;
use crate::swarm::types::{Command, SuspendedState};
use serde::{Deserialize, Serialize};

/// One uploaded reference file (screenshot, video, design export).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Raw bytes
    #[serde(with = "serde_bytes_b64")]
    pub data: Vec<u8>,
    /// MIME type, e.g. "image/png" or "video/mp4"
    pub mime: String,
}

impl UploadedFile {
    pub fn new(data: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            data,
            mime: mime.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    pub fn is_video(&self) -> bool {
        self.mime.starts_with("video/")
    }
}

/// Base64 (de)serialization for binary payloads so inputs survive JSON
/// transport between layers.
mod serde_bytes_b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

/// Read-only repository context influencing builder prompts and TDD gating.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoContext {
    #[serde(default)]
    pub style_guide: String,
    #[serde(default)]
    pub pattern_library: String,
    #[serde(default)]
    pub critical_files: Vec<String>,
    #[serde(default)]
    pub tech_stack: String,
    #[serde(default)]
    pub critical_files_require_tests: bool,
}

/// Everything one pipeline run starts from. Immutable for the duration of
/// the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineInput {
    /// Ordered uploads; stage plans reference these by index
    pub files: Vec<UploadedFile>,
    /// Free-text instructions from the user
    pub instructions: String,
    /// Snapshot of existing generated code, when editing
    #[serde(default)]
    pub current_code: Option<String>,
    /// Repository style/context
    #[serde(default)]
    pub repo_context: Option<RepoContext>,
    /// Skip the vision healing loop even when a reference image exists
    #[serde(default)]
    pub skip_healing: bool,
}

impl PipelineInput {
    pub fn new(files: Vec<UploadedFile>, instructions: impl Into<String>) -> Self {
        Self {
            files,
            instructions: instructions.into(),
            current_code: None,
            repo_context: None,
            skip_healing: false,
        }
    }

    /// First image upload, the healing loop's fidelity reference
    pub fn first_image(&self) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.is_image())
    }
}

/// The unit of generated output. A run's file list is the full replacement
/// code tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppFile {
    pub path: String,
    pub content: String,
}

impl AppFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Elapsed wall-clock time of one named orchestrator step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTiming {
    pub step: String,
    pub ms: u64,
}

/// Complete result of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub files: Vec<AppFile>,
    pub strategy: ExecutionStrategy,
    pub manifests: Vec<VisualManifest>,
    pub physics: Vec<MotionSpec>,
    /// Non-fatal degradations, one entry per failed optional stage
    pub warnings: Vec<String>,
    pub step_timings: Vec<StepTiming>,
    #[serde(default)]
    pub healing_result: Option<HealingResult>,
    /// Present when an autonomous run suspended awaiting remote execution
    #[serde(default)]
    pub command: Option<Command>,
    #[serde(default)]
    pub suspended_state: Option<SuspendedState>,
    /// Final asset map (extracted entries override generated ones)
    #[serde(default)]
    pub assets: AssetMap,
}
