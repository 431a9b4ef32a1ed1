//! Tracing configuration and log routing.
//!
//! Logs go to stdout with a compact formatter and to a file through a non-blocking writer. The
//! file is `PDFRAG_LOG_FILE` when set, otherwise `logs/pdfrag.log`.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_FILE_VAR: &str = "PDFRAG_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "pdfrag.log";

/// Configure tracing subscribers for stdout and file logging.
///
/// `RUST_LOG` takes precedence over `default_directive` (for example `"info"` or
/// `"pdfrag=debug"`). Calling this more than once is a no-op after the first call.
pub fn init_tracing(default_directive: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    let (dir, file) = log_file_location(std::env::var(LOG_FILE_VAR).ok().as_deref());
    let result = match file_writer(&dir, &file) {
        Some(writer) => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_ansi(false)
                    .compact(),
            )
            .try_init(),
        None => registry.try_init(),
    };
    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Split the configured log path into directory and file name, falling back to the default.
fn log_file_location(configured: Option<&str>) -> (PathBuf, String) {
    let default = || (PathBuf::from(DEFAULT_LOG_DIR), DEFAULT_LOG_FILE.to_string());
    let Some(raw) = configured.map(str::trim).filter(|value| !value.is_empty()) else {
        return default();
    };
    let path = Path::new(raw);
    let Some(file) = path.file_name().and_then(|name| name.to_str()) else {
        return default();
    };
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    (dir, file.to_string())
}

/// Build a non-blocking appender, or `None` when the directory cannot be created.
fn file_writer(dir: &Path, file: &str) -> Option<NonBlocking> {
    if let Err(err) = std::fs::create_dir_all(dir) {
        eprintln!("Failed to create log directory {}: {err}", dir.display());
        return None;
    }
    let appender = tracing_appender::rolling::never(dir, file);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset_or_blank() {
        let expected = (PathBuf::from("logs"), "pdfrag.log".to_string());
        assert_eq!(log_file_location(None), expected);
        assert_eq!(log_file_location(Some("  ")), expected);
    }

    #[test]
    fn splits_configured_path() {
        assert_eq!(
            log_file_location(Some("/var/log/pdfrag/run.log")),
            (PathBuf::from("/var/log/pdfrag"), "run.log".to_string())
        );
        assert_eq!(
            log_file_location(Some("run.log")),
            (PathBuf::from("."), "run.log".to_string())
        );
    }
}
