//! # Swarm Types
//!
//! Declarative swarm definitions, the suspend/resume snapshot, and the
//! executor's result contract.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Role tag deciding which phase an agent runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentRole {
    Researcher,
    Architect,
    QaEngineer,
    Coder,
    Debugger,
    Reviewer,
}

impl AgentRole {
    /// Debuggers and reviewers both act as testers in the execution phase
    pub fn is_tester(&self) -> bool {
        matches!(self, AgentRole::Debugger | AgentRole::Reviewer)
    }
}

/// One declarative sub-agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FabricatedAgent {
    pub id: String,
    pub name: String,
    pub role: AgentRole,
    /// System directive sent with every task
    pub directive: String,
    /// Capability set, e.g. "web_search"
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl FabricatedAgent {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        role: AgentRole,
        directive: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            directive: directive.into(),
            capabilities: Vec::new(),
        }
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    pub fn can_search(&self) -> bool {
        self.capabilities.iter().any(|c| c == "web_search")
    }
}

/// An ordered set of role-tagged agents executed through fixed phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSwarm {
    pub id: String,
    pub agents: Vec<FabricatedAgent>,
}

impl AgentSwarm {
    pub fn agents_with_role(&self, role: AgentRole) -> impl Iterator<Item = &FabricatedAgent> {
        self.agents.iter().filter(move |a| a.role == role)
    }

    pub fn testers(&self) -> Vec<&FabricatedAgent> {
        self.agents.iter().filter(|a| a.role.is_tester()).collect()
    }
}

/// Kind of remote command an agent may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Shell,
    Screenshot,
    BrowserLog,
}

impl CommandKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "shell" => Some(CommandKind::Shell),
            "screenshot" => Some(CommandKind::Screenshot),
            "browser_log" | "browserlog" => Some(CommandKind::BrowserLog),
            _ => None,
        }
    }
}

/// A command emitted over the channel to the remote executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: CommandKind,
    pub command: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    120
}

/// Feedback returned after out-of-band execution of a command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentFeedback {
    pub exit_code: i32,
    #[serde(default)]
    pub output: String,
    /// Base64 screenshot, for screenshot-type commands
    #[serde(default)]
    pub screenshot: Option<String>,
}

/// Minimum snapshot needed to resume a suspended run, possibly in another
/// process. Everything here round-trips through JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspendedState {
    pub swarm_id: String,
    /// Agent id that is waiting for command feedback
    pub waiting_agent: String,
    pub command: Command,
    /// Shared memory at suspension time
    pub memory: BTreeMap<String, String>,
    /// Generated code, preserved byte-for-byte across suspension
    pub generated_code: String,
    /// Testers that already passed, in original order
    #[serde(default)]
    pub completed_testers: Vec<String>,
}

/// Result of one `run_swarm`/`resume_swarm` invocation.
///
/// Exactly one of these shapes holds: success with output, failure with
/// error, or suspension (success=false with command + suspended state).
/// Use [`SwarmOutcome`] to construct - it cannot express an invalid mix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTaskResult {
    pub success: bool,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub retry_suggestion: Option<String>,
    #[serde(default)]
    pub command: Option<Command>,
    #[serde(default)]
    pub suspended_state: Option<SuspendedState>,
    #[serde(default)]
    pub artifacts: BTreeMap<String, String>,
    #[serde(default)]
    pub reasoning_summary: Option<String>,
}

impl AgentTaskResult {
    /// A suspension is `success=false` with a command attached; callers
    /// must check this before treating the result as a failure.
    pub fn is_suspension(&self) -> bool {
        !self.success && self.command.is_some()
    }
}

/// Tagged state machine for the executor. Resumption is
/// `(Suspended, feedback) -> next state`.
#[derive(Debug, Clone)]
pub enum SwarmOutcome {
    Suspended(Command, SuspendedState),
    Succeeded {
        output: String,
        reasoning_summary: Option<String>,
        artifacts: BTreeMap<String, String>,
    },
    Failed {
        error: String,
        retry_suggestion: Option<String>,
    },
}

impl SwarmOutcome {
    pub fn failed(error: impl Into<String>, retry: impl Into<String>) -> Self {
        SwarmOutcome::Failed {
            error: error.into(),
            retry_suggestion: Some(retry.into()),
        }
    }

    /// Lossless conversion that upholds the tri-state invariant on
    /// [`AgentTaskResult`].
    pub fn into_task_result(self) -> AgentTaskResult {
        match self {
            SwarmOutcome::Succeeded {
                output,
                reasoning_summary,
                artifacts,
            } => AgentTaskResult {
                success: true,
                output: Some(output),
                error: None,
                retry_suggestion: None,
                command: None,
                suspended_state: None,
                artifacts,
                reasoning_summary,
            },
            SwarmOutcome::Failed {
                error,
                retry_suggestion,
            } => AgentTaskResult {
                success: false,
                output: None,
                error: Some(error),
                retry_suggestion,
                command: None,
                suspended_state: None,
                artifacts: BTreeMap::new(),
                reasoning_summary: None,
            },
            SwarmOutcome::Suspended(command, state) => AgentTaskResult {
                success: false,
                output: None,
                error: None,
                retry_suggestion: None,
                command: Some(command),
                suspended_state: Some(state),
                artifacts: BTreeMap::new(),
                reasoning_summary: None,
            },
        }
    }
}
