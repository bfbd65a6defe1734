//! TUI Views module
//!
//! Contains different view implementations for the TUI.

mod agents;
mod issue_tree;

pub use agents::{AgentsView, RigAgents};
pub use issue_tree::IssueTreeView;
