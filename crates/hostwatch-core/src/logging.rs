//! Logging infrastructure for hostwatch.
//!
//! Structured logging through the `tracing` ecosystem: JSON lines to a daily
//! rolling file for later inspection, plus a compact human layer on stderr.
//!
//! ## Example
//!
//! ```no_run
//! use hostwatch_core::logging;
//!
//! let _guard = logging::init_logging(None, false).expect("logging init");
//! tracing::info!(feed = "simulator", "hostwatch started");
//! ```

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{HostwatchError, Result};

/// Daily-rolled JSON log file name inside the log directory.
pub const LOG_FILE_NAME: &str = "hostwatch.log";

/// Crates whose events pass the default filter.
const LOG_TARGETS: &[&str] = &[
    "hostwatch",
    "hostwatch_core",
    "hostwatch_feed",
    "hostwatch_stream",
    "hostwatch_notify",
];

/// Guard that must be held to ensure log flushing on shutdown.
///
/// Dropping it flushes pending file entries, so keep it alive until the
/// stream controller has been stopped.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
    log_dir: PathBuf,
}

impl LogGuard {
    /// Directory the JSON log is written to.
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

/// Filter used when `RUST_LOG` is unset: hostwatch crates at `info`
/// (`debug` when verbose), the HTTP stack at `warn`.
pub fn default_filter(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    let mut directives: Vec<String> = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect();
    directives.push("axum=warn".to_string());
    directives.push("reqwest=warn".to_string());
    directives.join(",")
}

/// Initialize the hostwatch logging system.
///
/// This sets up:
/// - File logging to `~/.hostwatch/logs/hostwatch.log` (JSON lines, rolled daily)
/// - Console logging to stderr (compact, with file and line when verbose)
///
/// # Arguments
///
/// * `log_dir` - Optional custom log directory. Defaults to `~/.hostwatch/logs/`
/// * `verbose` - If true, hostwatch crates log at DEBUG. `RUST_LOG` overrides.
///
/// # Returns
///
/// A [`LogGuard`] that must be held for the life of the process. Fails with
/// [`HostwatchError::DirectoryCreation`] when the log directory cannot be
/// created, or [`HostwatchError::Internal`] when a global subscriber is
/// already installed.
///
/// # Example
///
/// ```no_run
/// use hostwatch_core::logging;
///
/// fn main() -> hostwatch_core::Result<()> {
///     let guard = logging::init_logging(None, true)?;
///     tracing::info!(log_dir = %guard.log_dir().display(), "watching hosts");
///     Ok(())
/// }
/// ```
pub fn init_logging(log_dir: Option<PathBuf>, verbose: bool) -> Result<LogGuard> {
    let log_dir = log_dir.map_or_else(default_log_dir, Ok)?;
    std::fs::create_dir_all(&log_dir).map_err(|source| HostwatchError::DirectoryCreation {
        path: log_dir.clone(),
        source,
    })?;

    let (file_writer, file_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, LOG_FILE_NAME));

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    // No spans are entered, so file lines stay flat.
    let file_layer = fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_current_span(false)
        .flatten_event(true);

    let console_layer = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_file(verbose)
        .with_line_number(verbose);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| HostwatchError::internal(format!("logging already initialized: {e}")))?;

    tracing::debug!(log_dir = %log_dir.display(), verbose, "logging initialized");

    Ok(LogGuard {
        _file_guard: Some(file_guard),
        log_dir,
    })
}

/// Initialize minimal console-only logging for tests.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Root of hostwatch state: `~/.hostwatch/`
pub fn default_home_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| HostwatchError::Internal {
        message: "home directory could not be determined".into(),
    })?;
    Ok(home.join(".hostwatch"))
}

/// Get the default log directory path (`~/.hostwatch/logs/`).
pub fn default_log_dir() -> Result<PathBuf> {
    Ok(default_home_dir()?.join("logs"))
}

/// Get the default log file path (`~/.hostwatch/logs/hostwatch.log`).
///
/// The appender adds a date suffix to each rolled file.
pub fn default_log_file() -> Result<PathBuf> {
    Ok(default_log_dir()?.join(LOG_FILE_NAME))
}

/// Convenience macro for logging feed lifecycle events.
///
/// ```ignore
/// log_feed_event!("simulator", "attached");
/// log_feed_event!("tcp://10.0.0.5:9000", "error", reason = %e);
/// ```
#[macro_export]
macro_rules! log_feed_event {
    ($feed:expr, $event:expr) => {
        tracing::info!(
            target: "hostwatch::feed",
            feed = %$feed,
            event = $event,
            "feed event"
        )
    };
    ($feed:expr, $event:expr, $($field:tt)*) => {
        tracing::info!(
            target: "hostwatch::feed",
            feed = %$feed,
            event = $event,
            $($field)*,
            "feed event"
        )
    };
}
