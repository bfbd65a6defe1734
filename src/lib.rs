//! rigview - A live dashboard for issue hierarchies and agent status.
//!
//! This library provides the core functionality for the `rigview` terminal
//! dashboard: a push-fed reactive store with a cached pull fallback, tree
//! materialization from dot-segmented issue IDs, and a keyboard-driven,
//! virtualized tree view.

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod logging;
pub mod models;
pub mod source;
pub mod store;
pub mod tree;
pub mod tui;

/// Failure of a pull fetch, normalized to a single message.
///
/// Every variant renders as one human-readable string; callers that only
/// need to show the failure use `to_string()`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Connection refused, DNS failure, timeout
    #[error("Network error: {0}")]
    Transport(String),

    /// Non-2xx response
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Malformed payload
    #[error("Invalid response: {0}")]
    Decode(String),
}

/// Library-level error type for rigview operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for rigview operations.
pub type Result<T> = std::result::Result<T, Error>;
