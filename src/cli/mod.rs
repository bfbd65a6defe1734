//! CLI argument definitions for rigview.

use std::path::PathBuf;

use clap::parser::ValueSource as ClapValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};

use crate::config::{ConfigOverrides, ValueSource};

pub const HOST_ENV: &str = "RIGVIEW_HOST";
pub const PORT_ENV: &str = "RIGVIEW_PORT";
pub const CONFIG_ENV: &str = "RIGVIEW_CONFIG";

/// Version string shown by `--version`, with build information.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("RIGVIEW_GIT_COMMIT"),
    ", built ",
    env!("RIGVIEW_BUILD_TIMESTAMP"),
    ")"
);

/// rigview - A live terminal dashboard for issue hierarchies and agent status.
///
/// Connects to a dashboard server's WebSocket feed and falls back to its
/// REST API while the feed is unavailable.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "rigview")]
#[command(author, version, long_version = LONG_VERSION, about = "A live terminal dashboard for issue hierarchies and agent status", long_about = None)]
pub struct Cli {
    /// Dashboard server host [default: localhost]
    #[arg(long, env = HOST_ENV)]
    pub host: Option<String>,

    /// Dashboard server port [default: 8080]
    #[arg(short, long, env = PORT_ENV)]
    pub port: Option<u16>,

    /// Rig to show at startup
    #[arg(short, long)]
    pub rig: Option<String>,

    /// Path to config.kdl [default: ~/.config/rigview/config.kdl]
    #[arg(short, long, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Write logs to this file [default: rigview.log in the data directory]
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Parse the process arguments, exiting on error like `Cli::parse`.
    pub fn parse_with_overrides() -> (Self, ConfigOverrides) {
        let matches = Self::command().get_matches();
        match Self::from_matches(&matches) {
            Ok(parsed) => parsed,
            Err(e) => e.exit(),
        }
    }

    /// Build the CLI and its config overrides from parsed matches.
    pub fn from_matches(matches: &ArgMatches) -> Result<(Self, ConfigOverrides), clap::Error> {
        let cli = Self::from_arg_matches(matches)?;
        let mut overrides = ConfigOverrides::new();
        if let Some(host) = &cli.host {
            overrides = overrides.with_host(host.clone(), source_of(matches, "host", HOST_ENV));
        }
        if let Some(port) = cli.port {
            overrides = overrides.with_port(port, source_of(matches, "port", PORT_ENV));
        }
        if let Some(rig) = &cli.rig {
            overrides = overrides.with_rig(rig.clone(), ValueSource::CliFlag);
        }
        Ok((cli, overrides))
    }
}

fn source_of(matches: &ArgMatches, id: &str, env: &str) -> ValueSource {
    match matches.value_source(id) {
        Some(ClapValueSource::EnvVariable) => ValueSource::EnvVar(env.to_string()),
        _ => ValueSource::CliFlag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        // This will panic if the CLI is misconfigured
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_become_cli_overrides() {
        let matches = Cli::command()
            .try_get_matches_from([
                "rigview", "--host", "dash.local", "--port", "9000", "--rig", "gastown", "-v",
            ])
            .unwrap();
        let (cli, overrides) = Cli::from_matches(&matches).unwrap();
        assert!(cli.verbose);
        assert_eq!(overrides.host.unwrap().source, ValueSource::CliFlag);
        assert_eq!(overrides.port.unwrap().value, 9000);
        assert_eq!(overrides.rig.unwrap().value, "gastown");
    }

    #[test]
    fn test_no_flags_no_overrides() {
        let matches = Cli::command()
            .try_get_matches_from(["rigview", "--log-file", "/tmp/rigview.log"])
            .unwrap();
        let (cli, overrides) = Cli::from_matches(&matches).unwrap();
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/rigview.log")));
        // Host/port may still come from the environment of the test runner
        assert!(overrides.rig.is_none());
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(
            Cli::command()
                .try_get_matches_from(["rigview", "--port", "not-a-port"])
                .is_err()
        );
    }
}
