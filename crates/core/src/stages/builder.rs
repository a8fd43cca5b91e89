//! # Builder Stage
//!
//! Generates the replacement code tree. Steered by the Architect's
//! structure when one exists, otherwise by the raw manifests. The response
//! is parsed as a JSON file array first, then by `// FILE:` markers, and as
//! a last resort becomes a single default entry file - a builder response
//! is never "unparseable".

use crate::autonomy::{split_marked_files, DEFAULT_ENTRY_PATH};
use crate::client::{InvokeOptions, ModelInvoker, PromptPart};
use crate::decode::{decode_json, extract_code, Decoded};
use crate::pipeline::types::{AppFile, RepoContext};
use crate::prompts;
use crate::stages::architect::ComponentStructure;
use crate::stages::photographer::AssetMap;
use crate::stages::physicist::MotionSpec;
use crate::stages::router::ExecutionStrategy;
use crate::stages::surveyor::VisualManifest;

/// Everything the Builder needs for one generation pass.
pub struct BuildRequest<'a> {
    pub structure: &'a ComponentStructure,
    pub manifests: &'a [VisualManifest],
    pub physics: &'a [MotionSpec],
    pub strategy: &'a ExecutionStrategy,
    pub current_code: Option<&'a str>,
    pub instructions: &'a str,
    pub assets: &'a AssetMap,
    pub repo_context: Option<&'a RepoContext>,
    /// Include the 3D guidance block (strategy flag or keyword match)
    pub use_3d_guidance: bool,
}

pub struct BuilderStage;

impl BuilderStage {
    pub async fn run(
        invoker: &dyn ModelInvoker,
        request: &BuildRequest<'_>,
    ) -> anyhow::Result<Vec<AppFile>> {
        let mut prompt = String::new();
        if request.structure.is_empty() {
            let manifests =
                serde_json::to_string(request.manifests).unwrap_or_else(|_| "[]".to_string());
            prompt.push_str(&format!("Visual manifests:\n{manifests}\n"));
        } else {
            let structure =
                serde_json::to_string(request.structure).unwrap_or_else(|_| "{}".to_string());
            prompt.push_str(&format!("Component structure:\n{structure}\n"));
        }
        if !request.physics.is_empty() {
            let physics =
                serde_json::to_string(request.physics).unwrap_or_else(|_| "[]".to_string());
            prompt.push_str(&format!("Motion physics:\n{physics}\n"));
        }
        if !request.assets.is_empty() {
            prompt.push_str("Assets (use these URLs verbatim):\n");
            for (name, entry) in request.assets {
                prompt.push_str(&format!("- {}: {}\n", name, entry.url));
            }
        }
        if let Some(code) = request.current_code {
            prompt.push_str(&format!("Existing code:\n{code}\n"));
        }
        if let Some(ctx) = request.repo_context {
            if !ctx.style_guide.is_empty() {
                prompt.push_str(&format!("Style guide:\n{}\n", ctx.style_guide));
            }
            if !ctx.tech_stack.is_empty() {
                prompt.push_str(&format!("Tech stack: {}\n", ctx.tech_stack));
            }
        }
        prompt.push_str(&format!(
            "Mode: {:?}\nInstructions: {}\n",
            request.strategy.mode, request.instructions
        ));

        let mut system = prompts::BUILDER_SYSTEM.to_string();
        if request.use_3d_guidance {
            system.push_str("\n\n");
            system.push_str(prompts::BUILDER_3D_GUIDANCE);
        }

        let opts = InvokeOptions::with_system(system);
        let response = invoker.invoke(&[PromptPart::text(prompt)], "", &opts).await?;
        Ok(Self::parse_files(&response))
    }

    /// Parse a builder (or live-editor) response into files.
    pub fn parse_files(response: &str) -> Vec<AppFile> {
        if let Decoded::Parsed(files) = decode_json::<Vec<AppFile>>(response) {
            if !files.is_empty() {
                return files;
            }
        }
        let code = extract_code(response);
        if code.contains("// FILE:") {
            return split_marked_files(&code);
        }
        vec![AppFile::new(DEFAULT_ENTRY_PATH, code)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_file_array() {
        let response = r#"[{"path": "src/App.tsx", "content": "<App/>"}]"#;
        let files = BuilderStage::parse_files(response);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "src/App.tsx");
    }

    #[test]
    fn test_parse_marked_files() {
        let response = "```tsx\n// FILE: src/App.tsx\nconst a = 1;\n// FILE: src/Hero.tsx\nconst b = 2;\n```";
        let files = BuilderStage::parse_files(response);
        assert_eq!(files.len(), 2);
        assert_eq!(files[1].path, "src/Hero.tsx");
        assert_eq!(files[1].content, "const b = 2;");
    }

    #[test]
    fn test_parse_bare_code_defaults_entry_file() {
        let files = BuilderStage::parse_files("export default function App() {}");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, DEFAULT_ENTRY_PATH);
        assert!(!files[0].content.is_empty());
    }
}
