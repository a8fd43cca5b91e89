//! # Agent Swarm
//!
//! Declarative swarms of role-tagged sub-agents executed through fixed
//! phases, with a suspend/resume protocol for out-of-process command
//! execution.

pub mod context;
pub mod events;
pub mod executor;
pub mod search;
pub mod types;

pub use context::WorkflowContext;
pub use events::{SwarmEvent, SwarmEventKind};
pub use executor::{SwarmConfig, SwarmExecutor, ZERO_BUG_MARKER};
pub use search::{SearxSearch, WebSearch};
pub use types::{
    AgentFeedback, AgentRole, AgentSwarm, AgentTaskResult, Command, CommandKind, FabricatedAgent,
    SuspendedState, SwarmOutcome,
};
