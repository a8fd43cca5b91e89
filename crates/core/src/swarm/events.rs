//! # Swarm Events
//!
//! Progress events emitted while a swarm runs, for any UI or log sink that
//! wants to observe phase transitions and suspensions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of swarm event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SwarmEventKind {
    /// A phase (research, planning, qa, coding, execution) started
    PhaseStarted,
    /// Agent started working
    AgentStarted,
    /// Agent completed successfully
    AgentCompleted,
    /// Agent failed
    AgentFailed,
    /// Run paused awaiting remote command execution
    Suspended,
    /// Run resumed with command feedback
    Resumed,
    /// Swarm run completed
    SwarmCompleted,
    /// Swarm run failed
    SwarmFailed,
}

/// An event in the swarm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmEvent {
    /// Unique event ID
    pub id: String,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Kind of event
    pub kind: SwarmEventKind,
    /// Agent (or phase) that produced this event
    pub agent: String,
    /// Associated data (JSON)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl SwarmEvent {
    /// Create a new event
    pub fn new(kind: SwarmEventKind, agent: &str) -> Self {
        Self {
            id: event_id(),
            timestamp: Utc::now(),
            kind,
            agent: agent.to_string(),
            data: None,
        }
    }

    /// Add data to the event
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Generate a simple unique event id
fn event_id() -> String {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos();
    format!("{:x}-{:x}", nanos, rand_u32())
}

/// Simple random number (not cryptographic)
fn rand_u32() -> u32 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    RandomState::new().build_hasher().finish() as u32
}
