//! Terminal User Interface module for rigview
//!
//! This module provides a keyboard-driven TUI for live rig monitoring.
//! It follows the server's WebSocket feed, falls back to polling the REST
//! API while the feed is down, and displays the issue hierarchy, completed
//! work and agent status.

mod app;
mod connection;
mod notifications;
mod views;

pub use app::{ActiveView, FetchResult, TuiApp, run_tui};
pub use connection::{
    ConnectionEvent, ConnectionState, MAX_BACKOFF_SECS, MAX_RECONNECT_ATTEMPTS, PushConnection,
    calculate_backoff, reconnect_delay,
};
pub use notifications::{NotificationLevel, NotificationManager, Toast};
pub use views::{AgentsView, IssueTreeView, RigAgents};
