//! # Live Editor Stage
//!
//! Edit-mode fast path: applies a targeted instruction to the existing file
//! set without re-running the full generation pipeline.

use crate::client::{InvokeOptions, ModelInvoker, PromptPart};
use crate::pipeline::types::AppFile;
use crate::prompts;
use crate::stages::builder::BuilderStage;

pub struct LiveEditorStage;

impl LiveEditorStage {
    /// Apply `instruction` to `files`. Returns the changed files merged
    /// over the originals by path.
    pub async fn run(
        invoker: &dyn ModelInvoker,
        files: &[AppFile],
        instruction: &str,
    ) -> anyhow::Result<Vec<AppFile>> {
        let mut prompt = String::from("Current files:\n");
        for file in files {
            prompt.push_str(&format!("// FILE: {}\n{}\n\n", file.path, file.content));
        }
        prompt.push_str(&format!("Instruction: {instruction}\n"));

        let opts = InvokeOptions::with_system(prompts::LIVE_EDITOR_SYSTEM);
        let response = invoker.invoke(&[PromptPart::text(prompt)], "", &opts).await?;
        let changed = BuilderStage::parse_files(&response);

        let mut merged = files.to_vec();
        for change in changed {
            match merged.iter_mut().find(|f| f.path == change.path) {
                Some(existing) => existing.content = change.content,
                None => merged.push(change),
            }
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InvokeOptions;
    use anyhow::Result;
    use async_trait::async_trait;

    struct FixedInvoker(String);

    #[async_trait]
    impl crate::client::ModelInvoker for FixedInvoker {
        async fn invoke(
            &self,
            _parts: &[PromptPart],
            _model: &str,
            _opts: &InvokeOptions,
        ) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_edit_merges_changed_files_by_path() {
        let invoker =
            FixedInvoker(r#"[{"path": "src/App.tsx", "content": "blue hero"}]"#.to_string());
        let files = vec![
            AppFile::new("src/App.tsx", "red hero"),
            AppFile::new("src/Nav.tsx", "nav"),
        ];
        let merged = LiveEditorStage::run(&invoker, &files, "make the hero blue")
            .await
            .unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].content, "blue hero");
        assert_eq!(merged[1].content, "nav");
    }
}
