//! rigview - A live terminal dashboard for issue hierarchies and agent status.

use std::process;

use rigview::cli::Cli;
use rigview::config::{
    ConfigOverrides, DashboardConfig, ResolvedConfig, default_config_path, resolve_config,
};
use rigview::{Error, logging, tui};

fn main() {
    let (cli, overrides) = Cli::parse_with_overrides();

    if let Err(e) = run(cli, overrides) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli, overrides: ConfigOverrides) -> rigview::Result<()> {
    let config = load_config(&cli, &overrides)?;

    // Keep the guard alive until exit so buffered log lines are flushed
    let log_path = cli.log_file.clone().unwrap_or_else(logging::default_log_path);
    let _guard = logging::init(&log_path, cli.verbose)?;
    tracing::info!(
        host = %config.host.value,
        host_source = %config.host.source,
        port = config.port.value,
        port_source = %config.port.source,
        config = ?config.config_path,
        "configuration resolved"
    );

    // Create tokio runtime and run the dashboard
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Other(format!("Failed to create runtime: {}", e)))?
        .block_on(tui::run_tui(config))
}

/// Read config.kdl (explicit path, or the default location) and resolve it
/// against the command line.
fn load_config(
    cli: &Cli,
    overrides: &ConfigOverrides,
) -> rigview::Result<ResolvedConfig> {
    let path = cli.config.clone().or_else(default_config_path);
    let file = match &path {
        Some(path) => DashboardConfig::load_from_path(path)?,
        None => DashboardConfig::default(),
    };
    file.validate().map_err(|e| match &path {
        Some(path) => Error::Config(format!("{}: {}", path.display(), e)),
        None => Error::Config(e),
    })?;
    Ok(resolve_config(&file, overrides, path))
}
