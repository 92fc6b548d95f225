//! Process-wide logging
//!
//! Lifecycle events, recognized text, and errors go to the console and are
//! mirrored to an append-only log file under the user's data directory.
//! Initialized once at process start; lives for the process lifetime.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::Result;

/// Log file name inside [`log_dir`]
const LOG_FILE: &str = "valet.log";

/// Return the user-scoped log directory: `<data_dir>/valet/logs/`
///
/// Uses `~/.local/share/valet/logs/` on Linux.
#[must_use]
pub fn log_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".local/share/valet/logs"),
        |d| d.data_dir().join("valet").join("logs"),
    )
}

/// Path of the append-only log file
#[must_use]
pub fn log_path() -> PathBuf {
    log_dir().join(LOG_FILE)
}

/// Initialize tracing with a console layer and an append-only file layer
///
/// `filter` is an env-filter directive string (e.g. `"info,valet=debug"`).
///
/// # Errors
///
/// Returns error if the log directory or file cannot be created.
pub fn init(filter: &str) -> Result<()> {
    let dir = log_dir();
    fs::create_dir_all(&dir)?;

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))?;

    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();

    tracing::debug!(path = %log_path().display(), "logging initialized");
    Ok(())
}
