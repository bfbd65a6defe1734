//! Configuration for rigview.
//!
//! ## config.kdl - Dashboard preferences
//!
//! Located at `~/.config/rigview/config.kdl` by default (override with
//! `--config` or `RIGVIEW_CONFIG`). A missing file is treated as empty.
//!
//! Contains:
//! - `server-host`, `server-port` - Dashboard server address
//! - `default-rig` - Rig selected at startup
//! - `fast-ttl-ms`, `default-ttl-ms`, `slow-ttl-ms` - Cache TTL per class
//! - `highlight-ms` - How long updated rows stay highlighted
//! - `overscan`, `full-render-limit` - Tree rendering tuning
//!
//! ## Precedence
//!
//! CLI flag > environment variable > config.kdl > defaults
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigOverrides, DEFAULT_HOST, DEFAULT_PORT, Resolved, ResolvedConfig, ValueSource,
    resolve_config,
};
pub use schema::{CONFIG_FILE_NAME, DashboardConfig, default_config_path};
