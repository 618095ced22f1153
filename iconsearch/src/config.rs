//! Configuration file.
//!
//! Settings live in an INI file at `~/.iconsearch/config.ini`. A missing
//! file means defaults; a present file only needs the keys it overrides.
//!
//! # Example
//!
//! ```ini
//! [storage]
//! bucket = my-app.appspot.com
//! root_folder = google_icons
//! max_download_retry_ms = 1000
//!
//! [search]
//! session_timeout_secs = 30
//! partial_results = present
//!
//! [display]
//! dpi = 420
//! ```
//!
//! Every key is described once by [`ConfigKey`], which both the loader and
//! the `config get|set|list` commands go through.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;
use tracing::debug;

use crate::connectivity::{ProbeConfig, Transport};
use crate::density::{DensityBucket, DEFAULT_ROOT_FOLDER};
use crate::search::{PartialPolicy, SearchConfig};
use crate::storage::{
    FirebaseConfig, RetryPolicy, DEFAULT_DOWNLOAD_RETRY, DEFAULT_ENDPOINT,
    DEFAULT_OPERATION_RETRY,
};

/// Name of the per-user configuration directory.
pub const CONFIG_DIR_NAME: &str = ".iconsearch";

/// Name of the configuration file inside it.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Density used when none is configured.
pub const DEFAULT_DPI: u32 = 160;

/// Errors from reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),
}

/// `~/.iconsearch`, or `./.iconsearch` when there is no home directory.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Full path of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    pub endpoint: String,
    /// Bucket name. Empty until configured.
    pub bucket: String,
    pub root_folder: String,
    pub max_operation_retry_ms: u64,
    pub max_download_retry_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            bucket: String::new(),
            root_folder: DEFAULT_ROOT_FOLDER.to_string(),
            max_operation_retry_ms: DEFAULT_OPERATION_RETRY.as_millis() as u64,
            max_download_retry_ms: DEFAULT_DOWNLOAD_RETRY.as_millis() as u64,
            request_timeout_secs: 30,
        }
    }
}

/// `[search]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    pub session_timeout_secs: u64,
    pub partial_results: PartialPolicy,
    pub preserve_order: bool,
    /// 0 = no limit.
    pub max_concurrent: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        let defaults = SearchConfig::default();
        Self {
            session_timeout_secs: defaults.session_timeout.as_secs(),
            partial_results: defaults.partial_policy,
            preserve_order: defaults.preserve_match_order,
            max_concurrent: defaults.max_concurrent_resolutions,
        }
    }
}

/// `[display]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplaySettings {
    pub dpi: u32,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self { dpi: DEFAULT_DPI }
    }
}

/// `[network]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    pub probe_host: String,
    pub probe_port: u16,
    pub probe_interval_secs: u64,
    /// Transport reported for a successful probe.
    pub transport: Transport,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        let defaults = ProbeConfig::default();
        Self {
            probe_host: defaults.host,
            probe_port: defaults.port,
            probe_interval_secs: defaults.interval.as_secs(),
            transport: defaults.transport,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: config_directory().join("logs"),
            file: "iconsearch.log".to_string(),
        }
    }
}

/// All settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub storage: StorageSettings,
    pub search: SearchSettings,
    pub display: DisplaySettings,
    pub network: NetworkSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load from the default location. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    /// Parse INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Read {
            path: PathBuf::from("<string>"),
            source: ini::Error::Parse(e),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|section| section.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Save to the default location, creating the directory if needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating parent directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }

        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        ini.write_to_file(path).map_err(write_error)?;
        debug!(path = %path.display(), "Config file saved");
        Ok(())
    }

    /// Firebase backend settings.
    pub fn firebase_config(&self) -> FirebaseConfig {
        FirebaseConfig::new(self.storage.bucket.clone())
            .with_endpoint(self.storage.endpoint.clone())
            .with_operation_retry(RetryPolicy::new(Duration::from_millis(
                self.storage.max_operation_retry_ms,
            )))
            .with_download_retry(RetryPolicy::new(Duration::from_millis(
                self.storage.max_download_retry_ms,
            )))
    }

    /// Per-request HTTP timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.storage.request_timeout_secs)
    }

    /// Coordinator settings.
    pub fn search_config(&self) -> SearchConfig {
        SearchConfig::default()
            .with_session_timeout(Duration::from_secs(self.search.session_timeout_secs))
            .with_partial_policy(self.search.partial_results)
            .with_preserve_match_order(self.search.preserve_order)
            .with_max_concurrent_resolutions(self.search.max_concurrent)
    }

    /// Connectivity probe settings.
    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig::new(self.network.probe_host.clone(), self.network.probe_port)
            .with_interval(Duration::from_secs(self.network.probe_interval_secs))
            .with_transport(self.network.transport)
    }

    /// Folder to search for a display of `dpi`.
    pub fn folder_for(&self, dpi: u32) -> String {
        DensityBucket::from_dpi(dpi).folder_path(&self.storage.root_folder)
    }
}

/// A settable configuration key, named `section.key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    StorageEndpoint,
    StorageBucket,
    StorageRootFolder,
    StorageMaxOperationRetryMs,
    StorageMaxDownloadRetryMs,
    StorageRequestTimeoutSecs,
    SearchSessionTimeoutSecs,
    SearchPartialResults,
    SearchPreserveOrder,
    SearchMaxConcurrent,
    DisplayDpi,
    NetworkProbeHost,
    NetworkProbePort,
    NetworkProbeIntervalSecs,
    NetworkTransport,
    LoggingDirectory,
    LoggingFile,
}

impl ConfigKey {
    const ALL: [ConfigKey; 17] = [
        ConfigKey::StorageEndpoint,
        ConfigKey::StorageBucket,
        ConfigKey::StorageRootFolder,
        ConfigKey::StorageMaxOperationRetryMs,
        ConfigKey::StorageMaxDownloadRetryMs,
        ConfigKey::StorageRequestTimeoutSecs,
        ConfigKey::SearchSessionTimeoutSecs,
        ConfigKey::SearchPartialResults,
        ConfigKey::SearchPreserveOrder,
        ConfigKey::SearchMaxConcurrent,
        ConfigKey::DisplayDpi,
        ConfigKey::NetworkProbeHost,
        ConfigKey::NetworkProbePort,
        ConfigKey::NetworkProbeIntervalSecs,
        ConfigKey::NetworkTransport,
        ConfigKey::LoggingDirectory,
        ConfigKey::LoggingFile,
    ];

    /// Every key, grouped by section in file order.
    pub fn all() -> &'static [ConfigKey] {
        &Self::ALL
    }

    /// INI section.
    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::StorageEndpoint
            | ConfigKey::StorageBucket
            | ConfigKey::StorageRootFolder
            | ConfigKey::StorageMaxOperationRetryMs
            | ConfigKey::StorageMaxDownloadRetryMs
            | ConfigKey::StorageRequestTimeoutSecs => "storage",
            ConfigKey::SearchSessionTimeoutSecs
            | ConfigKey::SearchPartialResults
            | ConfigKey::SearchPreserveOrder
            | ConfigKey::SearchMaxConcurrent => "search",
            ConfigKey::DisplayDpi => "display",
            ConfigKey::NetworkProbeHost
            | ConfigKey::NetworkProbePort
            | ConfigKey::NetworkProbeIntervalSecs
            | ConfigKey::NetworkTransport => "network",
            ConfigKey::LoggingDirectory | ConfigKey::LoggingFile => "logging",
        }
    }

    /// Key name inside the section.
    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::StorageEndpoint => "endpoint",
            ConfigKey::StorageBucket => "bucket",
            ConfigKey::StorageRootFolder => "root_folder",
            ConfigKey::StorageMaxOperationRetryMs => "max_operation_retry_ms",
            ConfigKey::StorageMaxDownloadRetryMs => "max_download_retry_ms",
            ConfigKey::StorageRequestTimeoutSecs => "request_timeout_secs",
            ConfigKey::SearchSessionTimeoutSecs => "session_timeout_secs",
            ConfigKey::SearchPartialResults => "partial_results",
            ConfigKey::SearchPreserveOrder => "preserve_order",
            ConfigKey::SearchMaxConcurrent => "max_concurrent",
            ConfigKey::DisplayDpi => "dpi",
            ConfigKey::NetworkProbeHost => "probe_host",
            ConfigKey::NetworkProbePort => "probe_port",
            ConfigKey::NetworkProbeIntervalSecs => "probe_interval_secs",
            ConfigKey::NetworkTransport => "transport",
            ConfigKey::LoggingDirectory => "directory",
            ConfigKey::LoggingFile => "file",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value, formatted as it would be written to the file.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::StorageEndpoint => config.storage.endpoint.clone(),
            ConfigKey::StorageBucket => config.storage.bucket.clone(),
            ConfigKey::StorageRootFolder => config.storage.root_folder.clone(),
            ConfigKey::StorageMaxOperationRetryMs => {
                config.storage.max_operation_retry_ms.to_string()
            }
            ConfigKey::StorageMaxDownloadRetryMs => {
                config.storage.max_download_retry_ms.to_string()
            }
            ConfigKey::StorageRequestTimeoutSecs => {
                config.storage.request_timeout_secs.to_string()
            }
            ConfigKey::SearchSessionTimeoutSecs => config.search.session_timeout_secs.to_string(),
            ConfigKey::SearchPartialResults => config.search.partial_results.as_str().to_string(),
            ConfigKey::SearchPreserveOrder => config.search.preserve_order.to_string(),
            ConfigKey::SearchMaxConcurrent => config.search.max_concurrent.to_string(),
            ConfigKey::DisplayDpi => config.display.dpi.to_string(),
            ConfigKey::NetworkProbeHost => config.network.probe_host.clone(),
            ConfigKey::NetworkProbePort => config.network.probe_port.to_string(),
            ConfigKey::NetworkProbeIntervalSecs => config.network.probe_interval_secs.to_string(),
            ConfigKey::NetworkTransport => config.network.transport.as_str().to_string(),
            ConfigKey::LoggingDirectory => config.logging.directory.display().to_string(),
            ConfigKey::LoggingFile => config.logging.file.clone(),
        }
    }

    /// Parse `value` and store it.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match self {
            ConfigKey::StorageEndpoint => config.storage.endpoint = self.non_empty(value)?,
            ConfigKey::StorageBucket => config.storage.bucket = value.to_string(),
            ConfigKey::StorageRootFolder => {
                config.storage.root_folder = self.non_empty(value)?.trim_matches('/').to_string()
            }
            ConfigKey::StorageMaxOperationRetryMs => {
                config.storage.max_operation_retry_ms = self.parse(value)?
            }
            ConfigKey::StorageMaxDownloadRetryMs => {
                config.storage.max_download_retry_ms = self.parse(value)?
            }
            ConfigKey::StorageRequestTimeoutSecs => {
                config.storage.request_timeout_secs = self.parse(value)?
            }
            ConfigKey::SearchSessionTimeoutSecs => {
                config.search.session_timeout_secs = self.parse(value)?
            }
            ConfigKey::SearchPartialResults => config.search.partial_results = self.parse(value)?,
            ConfigKey::SearchPreserveOrder => config.search.preserve_order = self.parse(value)?,
            ConfigKey::SearchMaxConcurrent => config.search.max_concurrent = self.parse(value)?,
            ConfigKey::DisplayDpi => config.display.dpi = self.parse(value)?,
            ConfigKey::NetworkProbeHost => config.network.probe_host = self.non_empty(value)?,
            ConfigKey::NetworkProbePort => config.network.probe_port = self.parse(value)?,
            ConfigKey::NetworkProbeIntervalSecs => {
                config.network.probe_interval_secs = self.parse(value)?
            }
            ConfigKey::NetworkTransport => config.network.transport = self.parse(value)?,
            ConfigKey::LoggingDirectory => {
                config.logging.directory = PathBuf::from(self.non_empty(value)?)
            }
            ConfigKey::LoggingFile => config.logging.file = self.non_empty(value)?,
        }
        Ok(())
    }

    fn parse<T>(&self, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        value.parse().map_err(|e: T::Err| self.invalid(value, e.to_string()))
    }

    fn non_empty(&self, value: &str) -> Result<String, ConfigError> {
        if value.is_empty() {
            Err(self.invalid(value, "must not be empty".to_string()))
        } else {
            Ok(value.to_string())
        }
    }

    fn invalid(&self, value: &str, reason: String) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason,
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}
