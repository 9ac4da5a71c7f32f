//! Domain types for stack rollout watching.
//!
//! `ServiceDescriptor` is captured once at inventory time. `UpdateStatus`
//! is replaced wholesale on every poll. `TrackedService` pairs the two and
//! is the unit the convergence monitor owns.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full-length service identifier as listed by the orchestrator.
pub type ServiceId = String;

/// Truncated identifier used to key status lookups.
pub type ShortId = String;

/// Number of identifier characters the orchestrator echoes back in status records.
pub const SHORT_ID_LEN: usize = 12;

/// Truncate an identifier to its first [`SHORT_ID_LEN`] characters.
///
/// Two distinct services sharing a prefix would collide here. The
/// orchestrator's identifiers make that unlikely and it is not detected.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

// ── Service ────────────────────────────────────────────────────────

/// How the orchestrator schedules a service's tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMode {
    /// A fixed number of replicas.
    Replicated,
    /// One task per eligible node.
    Global,
}

impl fmt::Display for SchedulingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replicated => f.write_str("replicated"),
            Self::Global => f.write_str("global"),
        }
    }
}

/// Identity snapshot of one service at inventory time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub id: ServiceId,
    pub name: String,
    pub image: String,
    pub mode: SchedulingMode,
    /// Declared replica count (for global services, the node count at listing time).
    pub replicas: u32,
    pub ports: Vec<String>,
}

impl ServiceDescriptor {
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

// ── Update status ──────────────────────────────────────────────────

/// Rollout phase reported by the orchestrator for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateState {
    #[default]
    #[serde(alias = "")]
    NotStarted,
    Updating,
    Paused,
    Completed,
    RollbackStarted,
    RollbackPaused,
    RollbackCompleted,
}

impl UpdateState {
    /// Whether the monitor may stop watching a service in this state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Paused | Self::Completed | Self::RollbackPaused | Self::RollbackCompleted
        )
    }

    /// States whose status message may name the task that caused them.
    pub fn reports_task_failure(self) -> bool {
        matches!(
            self,
            Self::Paused | Self::RollbackPaused | Self::RollbackStarted
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Updating => "updating",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::RollbackStarted => "rollback_started",
            Self::RollbackPaused => "rollback_paused",
            Self::RollbackCompleted => "rollback_completed",
        }
    }
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rollout status record for one service, as reported on a single poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStatus {
    /// Omitted by the engine while the state is unknown.
    #[serde(rename = "State", default)]
    pub state: UpdateState,
    #[serde(rename = "StartedAt", default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "CompletedAt", default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(rename = "Message", default)]
    pub message: String,
}

// ── Tracked service ────────────────────────────────────────────────

/// A service under watch: its descriptor plus the last status observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedService {
    pub descriptor: ServiceDescriptor,
    pub status: Option<UpdateStatus>,
}

impl TrackedService {
    pub fn new(descriptor: ServiceDescriptor) -> Self {
        Self {
            descriptor,
            status: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn state(&self) -> Option<UpdateState> {
        self.status.as_ref().map(|s| s.state)
    }

    /// A service without any status has nothing to watch and counts as terminal.
    pub fn is_terminal(&self) -> bool {
        self.state().is_none_or(UpdateState::is_terminal)
    }
}
