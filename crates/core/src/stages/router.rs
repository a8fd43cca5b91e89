//! # Router Stage
//!
//! First stage of every run: classifies the user's intent and produces the
//! execution plan the rest of the pipeline fans out from. Malformed model
//! output degrades to a deterministic fallback strategy, never an error.

use crate::client::{InvokeOptions, ModelInvoker, PromptPart};
use crate::decode::{decode_json, Decoded};
use crate::pipeline::types::PipelineInput;
use crate::prompts;
use serde::{Deserialize, Serialize};

/// How the run should be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Build a fresh app from the references
    Create,
    /// Merge new references into existing code
    Merge,
    /// Targeted change to existing code
    Edit,
    /// Unknown/complex request, delegate to the agent swarm
    ResearchAndBuild,
}

/// One asset the plan wants generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub vibe: String,
}

impl AssetRequest {
    /// Environment maps are not supported by the image generator and get
    /// skipped with a warning.
    pub fn is_environment_map(&self) -> bool {
        let tag = format!("{} {}", self.name, self.vibe).to_lowercase();
        tag.contains("environment_map") || tag.contains("environment map") || tag.contains("envmap")
    }
}

/// Which inputs need which treatment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Input indices that need pixel measurement (Surveyor)
    #[serde(default)]
    pub measure_pixels: Vec<usize>,
    /// Input indices that need motion extraction (Physicist)
    #[serde(default)]
    pub extract_physics: Vec<usize>,
    /// Whether 3D builder guidance applies
    #[serde(default)]
    pub enable_3d: bool,
    /// Assets to synthesize (Photographer)
    #[serde(default)]
    pub asset_requests: Vec<AssetRequest>,
}

/// Router output: produced once per run, read-only afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStrategy {
    pub mode: GenerationMode,
    #[serde(default)]
    pub plan: ExecutionPlan,
}

/// 3D-intent keyword match on free-text instructions.
pub fn mentions_3d(text: &str) -> bool {
    regex::Regex::new(r"(?i)\b(3d|three\.?js|webgl|orbit\s*controls?)\b")
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

pub struct RouterStage;

impl RouterStage {
    /// Classify intent. Falls back to [`Self::fallback_strategy`] whenever
    /// the model call fails or its output is unparseable.
    pub async fn run(invoker: &dyn ModelInvoker, input: &PipelineInput) -> ExecutionStrategy {
        let mut parts = vec![PromptPart::text(format!(
            "Instructions: {}\nUploads: {}\nExisting code: {}",
            input.instructions,
            input
                .files
                .iter()
                .enumerate()
                .map(|(i, f)| format!("[{i}] {}", f.mime))
                .collect::<Vec<_>>()
                .join(", "),
            if input.current_code.is_some() {
                "present"
            } else {
                "none"
            }
        ))];
        if let Some(image) = input.first_image() {
            parts.push(PromptPart::inline(image.mime.clone(), &image.data));
        }

        let opts = InvokeOptions::with_system(prompts::ROUTER_SYSTEM);
        let response = match invoker.invoke(&parts, "", &opts).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "router call failed, using fallback strategy");
                return Self::fallback_strategy(input);
            }
        };

        match decode_json::<ExecutionStrategy>(&response) {
            Decoded::Parsed(strategy) => strategy,
            Decoded::Malformed(_) => {
                tracing::warn!("router output unparseable, using fallback strategy");
                Self::fallback_strategy(input)
            }
        }
    }

    /// Deterministic strategy when the model gives us nothing usable:
    /// edit iff existing code is present, measure every image, extract
    /// physics from every video, no asset synthesis.
    pub fn fallback_strategy(input: &PipelineInput) -> ExecutionStrategy {
        let mode = if input.current_code.is_some() {
            GenerationMode::Edit
        } else {
            GenerationMode::Create
        };
        let measure_pixels = input
            .files
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_image())
            .map(|(i, _)| i)
            .collect();
        let extract_physics = input
            .files
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_video())
            .map(|(i, _)| i)
            .collect();
        ExecutionStrategy {
            mode,
            plan: ExecutionPlan {
                measure_pixels,
                extract_physics,
                enable_3d: mentions_3d(&input.instructions),
                asset_requests: Vec::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::UploadedFile;

    fn input_with(files: Vec<UploadedFile>, code: Option<&str>) -> PipelineInput {
        let mut input = PipelineInput::new(files, "make the hero blue");
        input.current_code = code.map(str::to_string);
        input
    }

    #[test]
    fn test_fallback_create_without_code() {
        let input = input_with(vec![UploadedFile::new(vec![1], "image/png")], None);
        let strategy = RouterStage::fallback_strategy(&input);
        assert_eq!(strategy.mode, GenerationMode::Create);
        assert_eq!(strategy.plan.measure_pixels, vec![0]);
    }

    #[test]
    fn test_fallback_edit_with_code() {
        let input = input_with(vec![], Some("<App/>"));
        let strategy = RouterStage::fallback_strategy(&input);
        assert_eq!(strategy.mode, GenerationMode::Edit);
    }

    #[test]
    fn test_fallback_splits_images_and_videos() {
        let input = input_with(
            vec![
                UploadedFile::new(vec![1], "image/png"),
                UploadedFile::new(vec![2], "video/mp4"),
                UploadedFile::new(vec![3], "image/jpeg"),
            ],
            None,
        );
        let strategy = RouterStage::fallback_strategy(&input);
        assert_eq!(strategy.plan.measure_pixels, vec![0, 2]);
        assert_eq!(strategy.plan.extract_physics, vec![1]);
    }

    #[test]
    fn test_3d_keyword_matching() {
        assert!(mentions_3d("spin a 3D cube"));
        assert!(mentions_3d("use three.js please"));
        assert!(mentions_3d("a WebGL scene"));
        assert!(!mentions_3d("a flat dashboard"));
    }

    #[test]
    fn test_environment_map_detection() {
        let req = AssetRequest {
            name: "studio_envmap".into(),
            description: String::new(),
            vibe: String::new(),
        };
        assert!(req.is_environment_map());
        let req = AssetRequest {
            name: "hero-logo".into(),
            description: "brand mark".into(),
            vibe: "playful".into(),
        };
        assert!(!req.is_environment_map());
    }
}
