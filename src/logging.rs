//! Tracing setup for the server binary.
//!
//! Events go to a compact stdout layer and to a plain-text log file chosen by
//! [`Config::log_file`](crate::config::Config::log_file). Only counts, identifiers and outcomes
//! are recorded; document text and generated answers never reach the log.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::Config;

const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "documind.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Directory and file name the file layer appends to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTarget {
    /// Directory holding the log file, created on demand.
    pub dir: PathBuf,
    /// File name inside `dir`.
    pub file_name: String,
}

impl LogTarget {
    /// Resolve the log destination from configuration.
    pub fn from_config(config: &Config) -> Self {
        let Some(path) = config.log_file.as_deref() else {
            return Self::default_target();
        };
        match path.file_name().and_then(|name| name.to_str()) {
            Some(file_name) => Self {
                dir: parent_or_current(path),
                file_name: file_name.to_string(),
            },
            None => Self::default_target(),
        }
    }

    fn default_target() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_LOG_DIR),
            file_name: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

fn parent_or_current(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Install the global subscriber: `RUST_LOG` filter (default `info`), stdout, and the log file.
///
/// When the log file cannot be prepared the server keeps running with stdout only.
pub fn init_tracing(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();
    let target = LogTarget::from_config(config);

    let file_layer = match file_writer(&target) {
        Ok(writer) => Some(
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact(),
        ),
        Err(err) => {
            eprintln!(
                "Failed to open log file {}: {err}",
                target.dir.join(&target.file_name).display()
            );
            None
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
}

fn file_writer(target: &LogTarget) -> std::io::Result<NonBlocking> {
    std::fs::create_dir_all(&target.dir)?;
    let appender = tracing_appender::rolling::never(&target.dir, &target.file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    Ok(writer)
}
