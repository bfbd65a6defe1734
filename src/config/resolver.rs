//! Precedence resolution for dashboard settings.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags
//! 2. Environment variables (`RIGVIEW_HOST`, `RIGVIEW_PORT`, read by clap)
//! 3. config.kdl
//! 4. Built-in defaults
//!
//! Only host, port and rig can come from the command line or environment;
//! every other setting is file-or-default.

use std::path::PathBuf;
use std::time::Duration;

use crate::api::CacheTtls;
use crate::config::DashboardConfig;
use crate::store::DEFAULT_HIGHLIGHT_WINDOW;
use crate::tree::virtual_list::{DEFAULT_FULL_RENDER_LIMIT, DEFAULT_OVERSCAN};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8080;

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from CLI flag
    CliFlag,
    /// Value from environment variable
    EnvVar(String),
    /// Value from config.kdl
    ConfigFile,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::ConfigFile => write!(f, "config"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    /// Create a new resolved value.
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Overrides taken from the command line or environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub host: Option<Resolved<String>>,
    pub port: Option<Resolved<u16>>,
    pub rig: Option<Resolved<String>>,
}

impl ConfigOverrides {
    /// Create empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>, source: ValueSource) -> Self {
        self.host = Some(Resolved::new(host.into(), source));
        self
    }

    pub fn with_port(mut self, port: u16, source: ValueSource) -> Self {
        self.port = Some(Resolved::new(port, source));
        self
    }

    pub fn with_rig(mut self, rig: impl Into<String>, source: ValueSource) -> Self {
        self.rig = Some(Resolved::new(rig.into(), source));
        self
    }
}

/// Fully resolved settings with source tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub host: Resolved<String>,
    pub port: Resolved<u16>,
    /// Rig selected at startup; `None` means the first rig in the catalog
    pub rig: Option<Resolved<String>>,
    pub fast_ttl: Resolved<Duration>,
    pub default_ttl: Resolved<Duration>,
    pub slow_ttl: Resolved<Duration>,
    pub highlight_window: Resolved<Duration>,
    pub overscan: Resolved<usize>,
    pub full_render_limit: Resolved<usize>,
    /// Config file that was read, if any
    pub config_path: Option<PathBuf>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        let ttls = CacheTtls::default();
        Self {
            host: Resolved::new(DEFAULT_HOST.to_string(), ValueSource::Default),
            port: Resolved::new(DEFAULT_PORT, ValueSource::Default),
            rig: None,
            fast_ttl: Resolved::new(ttls.fast, ValueSource::Default),
            default_ttl: Resolved::new(ttls.default, ValueSource::Default),
            slow_ttl: Resolved::new(ttls.slow, ValueSource::Default),
            highlight_window: Resolved::new(DEFAULT_HIGHLIGHT_WINDOW, ValueSource::Default),
            overscan: Resolved::new(DEFAULT_OVERSCAN, ValueSource::Default),
            full_render_limit: Resolved::new(DEFAULT_FULL_RENDER_LIMIT, ValueSource::Default),
            config_path: None,
        }
    }
}

impl ResolvedConfig {
    /// Base URL for the pull API.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host.value, self.port.value)
    }

    /// URL of the push endpoint.
    pub fn ws_url(&self) -> String {
        format!("ws://{}:{}/ws", self.host.value, self.port.value)
    }

    pub fn rig(&self) -> Option<&str> {
        self.rig.as_ref().map(|r| r.value.as_str())
    }

    pub fn cache_ttls(&self) -> CacheTtls {
        CacheTtls {
            fast: self.fast_ttl.value,
            default: self.default_ttl.value,
            slow: self.slow_ttl.value,
        }
    }
}

fn pick<T>(
    cli: Option<&Resolved<T>>,
    file: Option<T>,
    fallback: Resolved<T>,
) -> Resolved<T>
where
    T: Clone,
{
    if let Some(resolved) = cli {
        resolved.clone()
    } else if let Some(value) = file {
        Resolved::new(value, ValueSource::ConfigFile)
    } else {
        fallback
    }
}

fn millis(value: Option<u64>) -> Option<Duration> {
    value.map(Duration::from_millis)
}

/// Resolve settings with full precedence chain.
///
/// `file` is the already loaded (and validated) config.kdl; `config_path` is
/// recorded for display only.
pub fn resolve_config(
    file: &DashboardConfig,
    overrides: &ConfigOverrides,
    config_path: Option<PathBuf>,
) -> ResolvedConfig {
    let defaults = ResolvedConfig::default();

    let rig = match (&overrides.rig, &file.default_rig) {
        (Some(resolved), _) => Some(resolved.clone()),
        (None, Some(rig)) => Some(Resolved::new(rig.clone(), ValueSource::ConfigFile)),
        (None, None) => None,
    };

    ResolvedConfig {
        host: pick(overrides.host.as_ref(), file.server_host.clone(), defaults.host),
        port: pick(overrides.port.as_ref(), file.server_port, defaults.port),
        rig,
        fast_ttl: pick(None, millis(file.fast_ttl_ms), defaults.fast_ttl),
        default_ttl: pick(None, millis(file.default_ttl_ms), defaults.default_ttl),
        slow_ttl: pick(None, millis(file.slow_ttl_ms), defaults.slow_ttl),
        highlight_window: pick(None, millis(file.highlight_ms), defaults.highlight_window),
        overscan: pick(None, file.overscan, defaults.overscan),
        full_render_limit: pick(None, file.full_render_limit, defaults.full_render_limit),
        config_path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_source_display() {
        assert_eq!(ValueSource::CliFlag.to_string(), "cli");
        assert_eq!(
            ValueSource::EnvVar("RIGVIEW_HOST".to_string()).to_string(),
            "env:RIGVIEW_HOST"
        );
        assert_eq!(ValueSource::ConfigFile.to_string(), "config");
        assert_eq!(ValueSource::Default.to_string(), "default");
    }

    #[test]
    fn test_resolve_defaults() {
        let resolved = resolve_config(&DashboardConfig::default(), &ConfigOverrides::new(), None);
        assert_eq!(resolved, ResolvedConfig::default());
        assert_eq!(resolved.base_url(), "http://localhost:8080");
        assert_eq!(resolved.ws_url(), "ws://localhost:8080/ws");
        assert_eq!(resolved.cache_ttls(), CacheTtls::default());
        assert_eq!(resolved.rig(), None);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = DashboardConfig {
            server_host: Some("dash.local".to_string()),
            fast_ttl_ms: Some(1000),
            default_rig: Some("gastown".to_string()),
            ..Default::default()
        };
        let resolved = resolve_config(&file, &ConfigOverrides::new(), None);
        assert_eq!(resolved.host.value, "dash.local");
        assert_eq!(resolved.host.source, ValueSource::ConfigFile);
        assert_eq!(resolved.port.source, ValueSource::Default);
        assert_eq!(resolved.fast_ttl.value, Duration::from_secs(1));
        assert_eq!(resolved.rig(), Some("gastown"));
    }

    #[test]
    fn test_overrides_beat_file() {
        let file = DashboardConfig {
            server_host: Some("dash.local".to_string()),
            server_port: Some(9000),
            default_rig: Some("gastown".to_string()),
            ..Default::default()
        };
        let overrides = ConfigOverrides::new()
            .with_host("cli.local", ValueSource::CliFlag)
            .with_port(7000, ValueSource::EnvVar("RIGVIEW_PORT".to_string()))
            .with_rig("beads", ValueSource::CliFlag);
        let resolved = resolve_config(&file, &overrides, None);

        assert_eq!(resolved.host.value, "cli.local");
        assert_eq!(resolved.host.source, ValueSource::CliFlag);
        assert_eq!(resolved.port.value, 7000);
        assert_eq!(
            resolved.port.source,
            ValueSource::EnvVar("RIGVIEW_PORT".to_string())
        );
        assert_eq!(resolved.rig(), Some("beads"));
        assert_eq!(resolved.base_url(), "http://cli.local:7000");
    }
}
