//! # Workflow Context
//!
//! Swarm-run-scoped shared memory. Exclusively owned by one
//! `run_swarm`/`resume_swarm` invocation and reset at the start of every
//! top-level run; never shared across runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key under which the accumulated coder output lives.
pub const GENERATED_CODE_KEY: &str = "generated_code";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowContext {
    /// agent name -> latest textual output
    pub memory: BTreeMap<String, String>,
    /// Accumulating run log
    pub log: Vec<String>,
    /// Output file map (path -> content)
    pub files: BTreeMap<String, String>,
}

impl WorkflowContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a context from a suspension snapshot's memory.
    pub fn from_memory(memory: BTreeMap<String, String>) -> Self {
        Self {
            memory,
            log: Vec::new(),
            files: BTreeMap::new(),
        }
    }

    pub fn remember(&mut self, agent: &str, output: impl Into<String>) {
        self.memory.insert(agent.to_string(), output.into());
    }

    pub fn log(&mut self, line: impl Into<String>) {
        let line = line.into();
        tracing::debug!(target: "swarm", "{line}");
        self.log.push(line);
    }

    pub fn generated_code(&self) -> &str {
        self.memory
            .get(GENERATED_CODE_KEY)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Append a coder's output to the accumulated code.
    pub fn append_code(&mut self, code: &str) {
        let entry = self
            .memory
            .entry(GENERATED_CODE_KEY.to_string())
            .or_default();
        if !entry.is_empty() {
            entry.push_str("\n\n");
        }
        entry.push_str(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_code_accumulates() {
        let mut ctx = WorkflowContext::new();
        assert_eq!(ctx.generated_code(), "");
        ctx.append_code("const a = 1;");
        ctx.append_code("const b = 2;");
        assert_eq!(ctx.generated_code(), "const a = 1;\n\nconst b = 2;");
    }

    #[test]
    fn test_from_memory_restores_code() {
        let mut memory = BTreeMap::new();
        memory.insert(GENERATED_CODE_KEY.to_string(), "code".to_string());
        let ctx = WorkflowContext::from_memory(memory);
        assert_eq!(ctx.generated_code(), "code");
        assert!(ctx.log.is_empty());
    }
}
