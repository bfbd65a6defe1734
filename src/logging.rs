//! File logging for the dashboard.
//!
//! The terminal belongs to the UI, so logs go to a file through a
//! non-blocking appender. The filter is read from `RIGVIEW_LOG` and
//! defaults to `info` (`debug` with `--verbose`).

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::{Error, Result};

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "RIGVIEW_LOG";

pub const LOG_FILE_NAME: &str = "rigview.log";

/// Default log file: `<data dir>/rigview/rigview.log`, or the temp dir when
/// no data dir is known.
pub fn default_log_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("rigview"))
        .unwrap_or_else(std::env::temp_dir)
        .join(LOG_FILE_NAME)
}

/// Build the filter from `RIGVIEW_LOG`, falling back to the default level.
pub fn env_filter(verbose: bool) -> EnvFilter {
    let default_level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber writing to `path`.
///
/// The returned guard flushes buffered lines when dropped; keep it alive
/// for the life of the process.
pub fn init(path: &Path, verbose: bool) -> Result<WorkerGuard> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Config(format!("invalid log file path: {}", path.display())))?;
    std::fs::create_dir_all(dir)?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| Error::Other(format!("failed to install logger: {}", e)))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_path_file_name() {
        assert!(default_log_path().ends_with(LOG_FILE_NAME));
    }

    #[test]
    fn test_init_rejects_path_without_file_name() {
        let err = init(Path::new("/"), false).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
