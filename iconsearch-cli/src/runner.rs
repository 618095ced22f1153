//! Shared setup for commands that talk to the bucket.
//!
//! Loads the configuration, applies command-line overrides, starts logging
//! and owns the Tokio runtime the command runs on.

use std::sync::Arc;

use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use iconsearch::config::ConfigFile;
use iconsearch::connectivity::ProbeMonitor;
use iconsearch::logging::{init_logging, LoggingGuard};
use iconsearch::presenter::ResultPresenter;
use iconsearch::session::SearchSession;
use iconsearch::storage::{FirebaseStorage, ReqwestClient};

use crate::error::CliError;

/// Options every bucket command accepts.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub dpi: Option<u32>,
    pub bucket: Option<String>,
    pub verbose: bool,
}

/// Runtime, configuration and logging for one command invocation.
pub struct CliRunner {
    config: ConfigFile,
    dpi: u32,
    runtime: Runtime,
    _logging: LoggingGuard,
}

impl CliRunner {
    /// Load configuration and start logging.
    pub fn new(options: &GlobalOptions) -> Result<Self, CliError> {
        let mut config = ConfigFile::load()?;
        if let Some(bucket) = &options.bucket {
            config.storage.bucket = bucket.clone();
        }
        let dpi = options.dpi.unwrap_or(config.display.dpi);

        let logging = init_logging(
            &config.logging.directory,
            &config.logging.file,
            options.verbose,
        )?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| CliError::RuntimeCreation(e.to_string()))?;

        Ok(Self {
            config,
            dpi,
            runtime,
            _logging: logging,
        })
    }

    /// Log the command being run.
    pub fn log_startup(&self, command: &str) {
        info!(
            command,
            version = iconsearch::VERSION,
            bucket = %self.config.storage.bucket,
            dpi = self.dpi,
            "iconsearch starting"
        );
    }

    /// Effective configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Folder searched for the effective DPI.
    pub fn folder(&self) -> String {
        self.config.folder_for(self.dpi)
    }

    /// The runtime commands run on.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Run a future to completion on the command runtime.
    pub fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Build a session against the configured bucket and start probing
    /// connectivity. The first probe has finished when this returns.
    pub fn connect(&self, presenter: Arc<dyn ResultPresenter>) -> Result<Connection, CliError> {
        if self.config.storage.bucket.trim().is_empty() {
            return Err(CliError::Config(
                "No bucket configured. Set storage.bucket with 'iconsearch config set' \
                 or pass --bucket."
                    .to_string(),
            ));
        }

        let client = ReqwestClient::with_timeout(self.config.request_timeout())?;
        let store = Arc::new(FirebaseStorage::new(client, self.config.firebase_config()));

        let monitor = Arc::new(ProbeMonitor::new(self.config.probe_config()));
        self.block_on(monitor.probe_once());

        let cancellation = CancellationToken::new();
        let probe = {
            let _guard = self.runtime.enter();
            Arc::clone(&monitor).spawn(cancellation.clone())
        };

        let session = Arc::new(SearchSession::new(
            store,
            monitor,
            presenter,
            self.folder(),
            self.config.search_config(),
        ));

        Ok(Connection {
            session,
            cancellation,
            probe,
        })
    }
}

/// A live session plus its background connectivity probe.
pub struct Connection {
    pub session: Arc<SearchSession>,
    cancellation: CancellationToken,
    probe: JoinHandle<()>,
}

impl Connection {
    /// Stop the probe and release the session's subscription.
    pub fn close(self, runner: &CliRunner) {
        self.session.shutdown();
        self.cancellation.cancel();
        let _ = runner.block_on(self.probe);
    }
}
