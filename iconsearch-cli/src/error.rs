//! CLI error types.

use std::fmt;

use iconsearch::config::ConfigError;
use iconsearch::index::IndexError;
use iconsearch::logging::LoggingError;
use iconsearch::search::SearchError;
use iconsearch::storage::StorageError;

/// Errors that end a CLI command.
#[derive(Debug)]
pub enum CliError {
    /// Invalid or incomplete configuration.
    Config(String),

    /// The configuration file could not be read or written.
    ConfigFile(ConfigError),

    /// Logging could not be set up.
    Logging(LoggingError),

    /// The storage backend could not be created.
    Storage(StorageError),

    /// The icon index could not be loaded.
    Index(IndexError),

    /// A query was refused.
    Search(SearchError),

    /// Failed to create the Tokio runtime.
    RuntimeCreation(String),

    /// Terminal input failed.
    Input(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Storage(e) => write!(f, "Storage error: {}", e),
            CliError::Index(e) => write!(f, "Could not load the icon list: {}", e),
            CliError::Search(e) => write!(f, "Search not started: {}", e),
            CliError::RuntimeCreation(msg) => {
                write!(f, "Failed to create Tokio runtime: {}", msg)
            }
            CliError::Input(msg) => write!(f, "Input error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Storage(e) => Some(e),
            CliError::Index(e) => Some(e),
            CliError::Search(e) => Some(e),
            CliError::Config(_) | CliError::RuntimeCreation(_) | CliError::Input(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<StorageError> for CliError {
    fn from(e: StorageError) -> Self {
        CliError::Storage(e)
    }
}

impl From<IndexError> for CliError {
    fn from(e: IndexError) -> Self {
        CliError::Index(e)
    }
}

impl From<SearchError> for CliError {
    fn from(e: SearchError) -> Self {
        CliError::Search(e)
    }
}

impl From<dialoguer::Error> for CliError {
    fn from(e: dialoguer::Error) -> Self {
        CliError::Input(e.to_string())
    }
}
