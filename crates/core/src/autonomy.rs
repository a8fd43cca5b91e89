//! # Autonomy Entry Point
//!
//! When the Router classifies a request as RESEARCH_AND_BUILD the standard
//! pipeline is skipped and a default agent swarm takes over. The swarm's
//! single text output is reshaped into the pipeline's file list via
//! explicit `// FILE:` path markers.

use crate::pipeline::types::{AppFile, PipelineInput};
use crate::swarm::types::{AgentRole, AgentSwarm, AgentTaskResult, FabricatedAgent};
use crate::swarm::SwarmExecutor;

/// Where unmarked autonomous output lands.
pub const DEFAULT_ENTRY_PATH: &str = "src/App.tsx";

/// Filename of the default entry file.
pub const DEFAULT_ENTRY_FILE: &str = "App.tsx";

/// Split autonomous output on `// FILE: <path>` markers.
///
/// Zero markers means the whole text is one file at the default entry
/// path. Content between markers is trimmed.
pub fn split_marked_files(text: &str) -> Vec<AppFile> {
    let Ok(re) = regex::Regex::new(r"(?m)^[ \t]*//[ \t]*FILE:[ \t]*(\S+)[ \t]*$") else {
        return vec![AppFile::new(DEFAULT_ENTRY_PATH, text.trim())];
    };

    let markers: Vec<(usize, usize, String)> = re
        .captures_iter(text)
        .filter_map(|cap| {
            let whole = cap.get(0)?;
            Some((whole.start(), whole.end(), cap[1].to_string()))
        })
        .collect();

    if markers.is_empty() {
        return vec![AppFile::new(DEFAULT_ENTRY_PATH, text.trim())];
    }

    let mut files = Vec::with_capacity(markers.len());
    for (i, (_, end, path)) in markers.iter().enumerate() {
        let content_end = markers
            .get(i + 1)
            .map(|(next_start, _, _)| *next_start)
            .unwrap_or(text.len());
        let content = text[*end..content_end].trim();
        files.push(AppFile::new(path.clone(), content));
    }
    files
}

/// The default swarm fabricated for autonomous runs: research -> plan ->
/// test -> code -> verify.
pub fn default_swarm() -> AgentSwarm {
    AgentSwarm {
        id: "autonomy".to_string(),
        agents: vec![
            FabricatedAgent::new(
                "scout",
                "scout",
                AgentRole::Researcher,
                "You research unfamiliar requirements and summarize what matters for implementation.",
            )
            .with_capability("web_search"),
            FabricatedAgent::new(
                "planner",
                "planner",
                AgentRole::Architect,
                "You turn requirements into a concrete component and file plan.",
            ),
            FabricatedAgent::new(
                "qa",
                "qa",
                AgentRole::QaEngineer,
                "You write tests for the planned behavior before any code exists.",
            ),
            FabricatedAgent::new(
                "coder",
                "coder",
                AgentRole::Coder,
                "You implement the plan as complete application code. Respond with code only, \
                using `// FILE: <path>` markers when producing multiple files.",
            ),
            FabricatedAgent::new(
                "reviewer",
                "reviewer",
                AgentRole::Reviewer,
                "You verify generated code and respond with a JSON verdict or a command request.",
            ),
        ],
    }
}

pub struct Autonomy;

impl Autonomy {
    /// Delegate an unknown/complex request to the swarm executor.
    pub async fn run(executor: &SwarmExecutor, input: &PipelineInput) -> AgentTaskResult {
        let swarm = default_swarm();
        tracing::info!(swarm_id = %swarm.id, "delegating to autonomous swarm");
        executor
            .run_swarm(&swarm, &input.instructions, input.repo_context.as_ref())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_markers_split_into_two_files() {
        let text = "// FILE: src/App.tsx\nconst a = 1;\n\n// FILE: src/Hero.tsx\nconst b = 2;\n";
        let files = split_marked_files(text);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "src/App.tsx");
        assert_eq!(files[0].content, "const a = 1;");
        assert_eq!(files[1].path, "src/Hero.tsx");
        assert_eq!(files[1].content, "const b = 2;");
    }

    #[test]
    fn test_zero_markers_yield_default_entry_file() {
        let files = split_marked_files("  const a = 1;\n");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, DEFAULT_ENTRY_PATH);
        assert_eq!(files[0].content, "const a = 1;");
    }

    #[test]
    fn test_marker_requires_line_start() {
        let text = "const url = \"x // FILE: nope\";";
        let files = split_marked_files(text);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, DEFAULT_ENTRY_PATH);
    }

    #[test]
    fn test_default_swarm_covers_all_phases() {
        let swarm = default_swarm();
        assert!(swarm.agents.iter().any(|a| a.role == AgentRole::Researcher));
        assert!(swarm.agents.iter().any(|a| a.role == AgentRole::Architect));
        assert!(swarm.agents.iter().any(|a| a.role == AgentRole::QaEngineer));
        assert!(swarm.agents.iter().any(|a| a.role == AgentRole::Coder));
        assert_eq!(swarm.testers().len(), 1);
    }
}
