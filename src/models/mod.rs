//! Data models for rigview entities.
//!
//! This module defines the core data structures delivered by the server:
//! - `Issue` - Work items with a hierarchical dot-segmented ID
//! - `Agent` - Worker processes attached to a rig
//! - `MailMessage` - Messages exchanged between agents
//! - `ActivityEvent` - Entries in the activity feed
//! - `Rig` - A monitored project/workspace
//! - `RigProgress` - Aggregate issue counts for a rig

pub mod hierarchy;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shared, immutable list of shared items.
///
/// Lists are replaced wholesale on change; individual `Arc`s survive a
/// replacement when their item did not change.
pub type ItemList<T> = Arc<Vec<Arc<T>>>;

/// Issue status in the workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    #[default]
    Open,
    #[serde(alias = "in-progress")]
    InProgress,
    Blocked,
    Deferred,
    Closed,
    /// Deleted on the server but still referenced by history
    Tombstone,
}

impl IssueStatus {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Open => "open",
            IssueStatus::InProgress => "in_progress",
            IssueStatus::Blocked => "blocked",
            IssueStatus::Deferred => "deferred",
            IssueStatus::Closed => "closed",
            IssueStatus::Tombstone => "tombstone",
        }
    }

    /// Whether the issue no longer needs work.
    pub fn is_terminal(&self) -> bool {
        matches!(self, IssueStatus::Closed | IssueStatus::Tombstone)
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn default_issue_type() -> String {
    "task".to_string()
}

fn default_priority() -> u8 {
    2
}

/// A unit of work tracked in a rig.
///
/// The `id` encodes parentage: `root`, `root.1` and `root.1.2` form a chain.
/// There is no separate parent pointer; see [`hierarchy::parent_id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Unique identifier (e.g., "gt-4f2.1")
    pub id: String,

    /// Issue title
    pub title: String,

    /// Current status
    #[serde(default)]
    pub status: IssueStatus,

    /// Issue kind (task, bug, epic, ...)
    #[serde(default = "default_issue_type")]
    pub issue_type: String,

    /// Priority level (0-4, lower is higher priority)
    #[serde(default = "default_priority")]
    pub priority: u8,

    /// Assigned agent path (e.g., "gastown/polecats/nux")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    /// Detailed description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Closure timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,

    /// Labels for categorization
    #[serde(default)]
    pub labels: BTreeSet<String>,
}

impl Issue {
    /// Create a new open issue with the given ID and title.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            status: IssueStatus::default(),
            issue_type: default_issue_type(),
            priority: default_priority(),
            assignee: None,
            description: None,
            created_at: now,
            updated_at: now,
            closed_at: None,
            labels: BTreeSet::new(),
        }
    }

    /// Builder-style status override.
    pub fn with_status(mut self, status: IssueStatus) -> Self {
        if status.is_terminal() && self.closed_at.is_none() {
            self.closed_at = Some(self.updated_at);
        }
        self.status = status;
        self
    }

    /// Parent ID derived from the dot-segment chain.
    pub fn parent_id(&self) -> Option<&str> {
        hierarchy::parent_id(&self.id)
    }

    /// Format assignee for display (last path segment).
    pub fn display_assignee(&self) -> String {
        match &self.assignee {
            Some(a) if !a.is_empty() => {
                format!("@{}", a.rsplit('/').next().unwrap_or(a))
            }
            _ => "(unassigned)".to_string(),
        }
    }
}

/// Agent lifecycle state as reported by the process supervisor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Idle,
    Working,
    Stuck,
    Stopped,
    #[default]
    #[serde(other)]
    Unknown,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Idle => "idle",
            AgentState::Working => "working",
            AgentState::Stuck => "stuck",
            AgentState::Stopped => "stopped",
            AgentState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A worker process attached to a rig.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Hierarchical agent path (e.g., "gastown/polecats/nux")
    pub address: String,

    /// Short display name
    pub name: String,

    /// Rig this agent works in
    pub rig: String,

    /// Role within the rig (witness, refinery, polecat, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default)]
    pub state: AgentState,

    /// Issue currently hooked to the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hooked_issue: Option<String>,

    pub updated_at: DateTime<Utc>,
}

/// A message exchanged between agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    pub id: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

/// An entry in the activity feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rig: Option<String>,
    pub kind: String,
    pub message: String,
}

/// A monitored project/workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub agent_count: usize,
}

/// Aggregate issue counts for a rig.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RigProgress {
    pub rig: String,
    pub total: usize,
    pub closed: usize,
    #[serde(default)]
    pub in_progress: usize,
    #[serde(default)]
    pub blocked: usize,
}

impl RigProgress {
    /// Percentage of issues closed, 0 when the rig has none.
    pub fn percent_complete(&self) -> u16 {
        if self.total == 0 {
            return 0;
        }
        ((self.closed.min(self.total) * 100) / self.total) as u16
    }
}
