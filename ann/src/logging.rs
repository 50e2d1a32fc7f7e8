//! Logging bootstrap.
//!
//! # Invariants
//! - The subscriber is installed at most once per process.
//! - Repeating `init_logging` with the same level is a no-op.
//! - Re-initialization with a different level is rejected.
//! - Initialization never panics. If the host already installed a global
//!   subscriber, it is left in place and `init_logging` returns an error.

use once_cell::sync::OnceCell;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};
use crate::options::LogLevel;

static LOGGING_STATE: OnceCell<&'static str> = OnceCell::new();

/// Installs a `tracing` fmt subscriber writing to stderr.
///
/// `RUST_LOG`, when set, takes precedence over `level` for filtering.
pub fn init_logging(level: &str) -> Result<()> {
    let level = normalize_level(level)?;

    let active = LOGGING_STATE.get_or_try_init(|| -> Result<&'static str> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|err| Error::InvalidConfig(format!("failed to install subscriber: {err}")))?;
        info!(
            level,
            version = env!("CARGO_PKG_VERSION"),
            platform = std::env::consts::OS,
            "logging initialized"
        );
        Ok(level)
    })?;

    if *active != level {
        return Err(Error::InvalidConfig(format!(
            "logging already initialized with level `{active}`; refusing to switch to `{level}`"
        )));
    }
    Ok(())
}

/// Active level, or `None` before [`init_logging`] succeeded.
pub fn logging_status() -> Option<&'static str> {
    LOGGING_STATE.get().copied()
}

/// `debug` in debug builds, `info` in release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

/// Native severity matching a level name.
pub fn native_log_level(level: &str) -> Result<LogLevel> {
    let level = normalize_level(level)?;
    let level: tracing::Level = level
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("unsupported log level `{level}`")))?;
    Ok(LogLevel::from_tracing(level))
}

fn normalize_level(level: &str) -> Result<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(Error::InvalidConfig(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error"
        ))),
    }
}
