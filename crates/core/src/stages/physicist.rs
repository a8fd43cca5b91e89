//! # Physicist Stage
//!
//! Motion extraction: turns a reference video into per-component motion
//! descriptors (spring/gravity/timing). Empty when no video input exists or
//! the model output is unparseable.

use crate::client::{InvokeOptions, ModelInvoker, PromptPart};
use crate::decode::{decode_json, Decoded};
use crate::pipeline::types::UploadedFile;
use crate::prompts;
use serde::{Deserialize, Serialize};

/// Motion parameters for one animated component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionSpec {
    pub component: String,
    #[serde(default)]
    pub spring_stiffness: Option<f32>,
    #[serde(default)]
    pub spring_damping: Option<f32>,
    #[serde(default)]
    pub gravity: Option<f32>,
    #[serde(default)]
    pub duration_ms: Option<u32>,
    #[serde(default)]
    pub easing: Option<String>,
}

pub struct PhysicistStage;

impl PhysicistStage {
    pub async fn run(
        invoker: &dyn ModelInvoker,
        file: &UploadedFile,
        index: usize,
    ) -> anyhow::Result<Vec<MotionSpec>> {
        let parts = vec![
            PromptPart::text("Extract motion physics from this reference video."),
            PromptPart::inline(file.mime.clone(), &file.data),
        ];
        let opts = InvokeOptions::with_system(prompts::PHYSICIST_SYSTEM);
        let response = invoker.invoke(&parts, "", &opts).await?;

        match decode_json::<Vec<MotionSpec>>(&response) {
            Decoded::Parsed(specs) => Ok(specs),
            Decoded::Malformed(_) => {
                tracing::warn!(index, "physicist output unparseable, returning no motion");
                Ok(Vec::new())
            }
        }
    }
}
