//! KDL schema for config.kdl.
//!
//! This module provides:
//! - The [`DashboardConfig`] struct representing the file
//! - Serialization/deserialization to/from KDL format
//! - Validation
//! - Loading from disk (a missing file is an empty config)

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};

use crate::{Error, Result};

/// Name of the config file inside the rigview config directory.
pub const CONFIG_FILE_NAME: &str = "config.kdl";

/// Dashboard preferences stored in config.kdl.
///
/// Every field is optional; unset fields fall through to built-in defaults
/// during resolution.
///
/// # KDL Schema
///
/// ```kdl
/// server-host "localhost"
/// server-port 8080
/// default-rig "gastown"
/// fast-ttl-ms 5000
/// default-ttl-ms 15000
/// slow-ttl-ms 60000
/// highlight-ms 3000
/// overscan 5
/// full-render-limit 50
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardConfig {
    /// Dashboard server host
    pub server_host: Option<String>,

    /// Dashboard server port
    pub server_port: Option<u16>,

    /// Rig selected at startup
    pub default_rig: Option<String>,

    /// Cache TTL for fast-moving data (agents, mail, activity)
    pub fast_ttl_ms: Option<u64>,

    /// Cache TTL for issue lists and progress
    pub default_ttl_ms: Option<u64>,

    /// Cache TTL for the rig catalog
    pub slow_ttl_ms: Option<u64>,

    /// How long an updated row stays highlighted
    pub highlight_ms: Option<u64>,

    /// Rows rendered beyond the viewport in virtualized trees
    pub overscan: Option<usize>,

    /// Largest tree rendered without virtualization
    pub full_render_limit: Option<usize>,
}

fn first_entry<'a>(doc: &'a KdlDocument, name: &str) -> Option<&'a KdlValue> {
    doc.get(name)
        .and_then(|node| node.entries().first())
        .map(|entry| entry.value())
}

fn string_value(doc: &KdlDocument, name: &str) -> Option<String> {
    first_entry(doc, name)
        .and_then(|value| value.as_string())
        .map(str::to_string)
}

fn integer_value<T: TryFrom<i128>>(doc: &KdlDocument, name: &str) -> Option<T> {
    first_entry(doc, name)
        .and_then(|value| value.as_integer())
        .and_then(|i| T::try_from(i).ok())
}

fn push_string(doc: &mut KdlDocument, name: &str, value: &Option<String>) {
    if let Some(value) = value {
        let mut node = KdlNode::new(name);
        node.push(KdlEntry::new(KdlValue::String(value.clone())));
        doc.nodes_mut().push(node);
    }
}

fn push_integer<T: Copy + Into<i128>>(doc: &mut KdlDocument, name: &str, value: Option<T>) {
    if let Some(value) = value {
        let mut node = KdlNode::new(name);
        node.push(KdlEntry::new(KdlValue::Integer(value.into())));
        doc.nodes_mut().push(node);
    }
}

impl DashboardConfig {
    /// Create an empty config with no values set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(host) = &self.server_host {
            if host.trim().is_empty() {
                return Err("server-host must not be empty".to_string());
            }
        }
        if self.server_port == Some(0) {
            return Err("server-port must be 1-65535, got 0".to_string());
        }
        for (name, ttl) in [
            ("fast-ttl-ms", self.fast_ttl_ms),
            ("default-ttl-ms", self.default_ttl_ms),
            ("slow-ttl-ms", self.slow_ttl_ms),
            ("highlight-ms", self.highlight_ms),
        ] {
            if ttl == Some(0) {
                return Err(format!("{} must be greater than 0", name));
            }
        }
        Ok(())
    }

    /// Parse config from a KDL document.
    ///
    /// Values of the wrong type or out of range are ignored.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        Self {
            server_host: string_value(doc, "server-host"),
            server_port: integer_value(doc, "server-port"),
            default_rig: string_value(doc, "default-rig"),
            fast_ttl_ms: integer_value(doc, "fast-ttl-ms"),
            default_ttl_ms: integer_value(doc, "default-ttl-ms"),
            slow_ttl_ms: integer_value(doc, "slow-ttl-ms"),
            highlight_ms: integer_value(doc, "highlight-ms"),
            overscan: integer_value(doc, "overscan"),
            full_render_limit: integer_value(doc, "full-render-limit"),
        }
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();
        push_string(&mut doc, "server-host", &self.server_host);
        push_integer(&mut doc, "server-port", self.server_port);
        push_string(&mut doc, "default-rig", &self.default_rig);
        push_integer(&mut doc, "fast-ttl-ms", self.fast_ttl_ms);
        push_integer(&mut doc, "default-ttl-ms", self.default_ttl_ms);
        push_integer(&mut doc, "slow-ttl-ms", self.slow_ttl_ms);
        push_integer(&mut doc, "highlight-ms", self.highlight_ms);
        push_integer(&mut doc, "overscan", self.overscan.map(|v| v as u64));
        push_integer(
            &mut doc,
            "full-render-limit",
            self.full_render_limit.map(|v| v as u64),
        );
        doc
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &DashboardConfig) {
        if other.server_host.is_some() {
            self.server_host = other.server_host.clone();
        }
        if other.server_port.is_some() {
            self.server_port = other.server_port;
        }
        if other.default_rig.is_some() {
            self.default_rig = other.default_rig.clone();
        }
        if other.fast_ttl_ms.is_some() {
            self.fast_ttl_ms = other.fast_ttl_ms;
        }
        if other.default_ttl_ms.is_some() {
            self.default_ttl_ms = other.default_ttl_ms;
        }
        if other.slow_ttl_ms.is_some() {
            self.slow_ttl_ms = other.slow_ttl_ms;
        }
        if other.highlight_ms.is_some() {
            self.highlight_ms = other.highlight_ms;
        }
        if other.overscan.is_some() {
            self.overscan = other.overscan;
        }
        if other.full_render_limit.is_some() {
            self.full_render_limit = other.full_render_limit;
        }
    }

    /// Parse config.kdl text.
    pub fn parse(text: &str) -> std::result::Result<Self, kdl::KdlError> {
        let doc: KdlDocument = text.parse()?;
        Ok(Self::from_kdl(&doc))
    }

    /// Load config from `path`. A missing file yields an empty config.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Default location of config.kdl (`~/.config/rigview/config.kdl` on Linux).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("rigview").join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = DashboardConfig::default();
        assert_eq!(config.server_host, None);
        assert_eq!(config.server_port, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_kdl_empty() {
        let doc = KdlDocument::new();
        assert_eq!(DashboardConfig::from_kdl(&doc), DashboardConfig::default());
    }

    #[test]
    fn test_config_from_kdl_full() {
        let kdl = r#"
            server-host "dash.local"
            server-port 9090
            default-rig "gastown"
            fast-ttl-ms 2000
            default-ttl-ms 10000
            slow-ttl-ms 120000
            highlight-ms 1500
            overscan 8
            full-render-limit 20
        "#;
        let doc: KdlDocument = kdl.parse().unwrap();
        let config = DashboardConfig::from_kdl(&doc);

        assert_eq!(config.server_host, Some("dash.local".to_string()));
        assert_eq!(config.server_port, Some(9090));
        assert_eq!(config.default_rig, Some("gastown".to_string()));
        assert_eq!(config.fast_ttl_ms, Some(2000));
        assert_eq!(config.default_ttl_ms, Some(10000));
        assert_eq!(config.slow_ttl_ms, Some(120000));
        assert_eq!(config.highlight_ms, Some(1500));
        assert_eq!(config.overscan, Some(8));
        assert_eq!(config.full_render_limit, Some(20));
    }

    #[test]
    fn test_config_from_kdl_ignores_bad_values() {
        let kdl = r#"
            server-port 70000
            overscan -1
            server-host 42
        "#;
        let doc: KdlDocument = kdl.parse().unwrap();
        let config = DashboardConfig::from_kdl(&doc);
        assert_eq!(config, DashboardConfig::default());
    }

    #[test]
    fn test_config_to_kdl_roundtrip() {
        let config = DashboardConfig {
            server_host: Some("localhost".to_string()),
            server_port: Some(8080),
            default_rig: Some("beads".to_string()),
            overscan: Some(3),
            full_render_limit: Some(40),
            ..Default::default()
        };
        let doc = config.to_kdl();
        assert_eq!(DashboardConfig::from_kdl(&doc), config);
    }

    #[test]
    fn test_config_validate_rejects_zero_values() {
        let config = DashboardConfig {
            server_port: Some(0),
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("server-port"));

        let config = DashboardConfig {
            fast_ttl_ms: Some(0),
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("fast-ttl-ms"));

        let config = DashboardConfig {
            server_host: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_merge() {
        let mut base = DashboardConfig {
            server_host: Some("a".to_string()),
            server_port: Some(1000),
            ..Default::default()
        };
        let override_config = DashboardConfig {
            server_port: Some(2000),
            default_rig: Some("gastown".to_string()),
            ..Default::default()
        };

        base.merge(&override_config);

        assert_eq!(base.server_host, Some("a".to_string())); // Not overridden
        assert_eq!(base.server_port, Some(2000)); // Overridden
        assert_eq!(base.default_rig, Some("gastown".to_string()));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let config = DashboardConfig::load_from_path(&temp.path().join("config.kdl")).unwrap();
        assert_eq!(config, DashboardConfig::default());
    }

    #[test]
    fn test_load_invalid_kdl_is_config_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.kdl");
        fs::write(&path, "server-host \"unterminated").unwrap();
        let err = DashboardConfig::load_from_path(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_default_config_path_file_name() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("rigview/config.kdl"));
        }
    }
}
