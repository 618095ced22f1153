//! Logging setup.
//!
//! Log lines go to a file through a non-blocking writer, stamped with the
//! local time in RFC 3339. With `verbose`, the same lines are mirrored to
//! stderr. `RUST_LOG` overrides the default filter.

use std::path::{Path, PathBuf};

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::UtcOffset;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Errors from installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a global logger is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Keeps the background log writer alive. Dropping it flushes the file.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _writer: WorkerGuard,
    path: PathBuf,
}

impl LoggingGuard {
    /// The log file being written.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn default_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("iconsearch={0},iconsearch_cli={0}", level)))
}

/// Install the global subscriber, writing to `directory/file`.
///
/// The file is truncated on every start.
pub fn init_logging(
    directory: &Path,
    file: &str,
    verbose: bool,
) -> Result<LoggingGuard, LoggingError> {
    std::fs::create_dir_all(directory).map_err(|source| LoggingError::CreateDirectory {
        path: directory.to_path_buf(),
        source,
    })?;
    let path = directory.join(file);
    // Truncate leftovers from the previous run.
    if path.exists() {
        let _ = std::fs::remove_file(&path);
    }

    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let timer = OffsetTime::new(offset, Rfc3339);

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
        directory, file,
    ));
    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_timer(timer.clone())
        .with_ansi(false)
        .with_target(true);
    let console_layer = verbose.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(timer)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    tracing::info!(path = %path.display(), version = crate::VERSION, "Logging initialized");
    Ok(LoggingGuard {
        _writer: guard,
        path,
    })
}
