//! Screen-level wiring.
//!
//! A [`SearchSession`] plays the part of one search screen: it watches the
//! network for as long as it is active, loads the density folder, accepts
//! queries and turns every outcome into something the user sees.
//!
//! ```text
//! start ──► subscribe ──► online? ──► load index ──► ready
//!                            │                         │
//!                            └─► NetworkUnavailable    └─► submit(query) ──► coordinator
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connectivity::{ConnectivityEvent, ConnectivityMonitor, Subscription};
use crate::index::{HandleSet, IndexError, RemoteFolderIndex};
use crate::presenter::{Notice, ResultPresenter};
use crate::search::{Query, SearchConfig, SearchCoordinator, SearchError, SearchOutcome};
use crate::storage::ObjectStore;

/// One active search screen.
pub struct SearchSession {
    folder: String,
    monitor: Arc<dyn ConnectivityMonitor>,
    presenter: Arc<dyn ResultPresenter>,
    index: RemoteFolderIndex,
    coordinator: SearchCoordinator,
    subscription: Mutex<Option<Subscription>>,
    /// Set once the connectivity subscription exists.
    subscribed: watch::Sender<bool>,
    offline_notified: AtomicBool,
    shutdown: CancellationToken,
}

impl SearchSession {
    /// Create a session for `folder`. Nothing happens until [`start`](Self::start).
    pub fn new(
        store: Arc<dyn ObjectStore>,
        monitor: Arc<dyn ConnectivityMonitor>,
        presenter: Arc<dyn ResultPresenter>,
        folder: impl Into<String>,
        config: SearchConfig,
    ) -> Self {
        let index = RemoteFolderIndex::new(Arc::clone(&store), Arc::clone(&monitor));
        let coordinator = SearchCoordinator::new(
            store,
            Arc::clone(&monitor),
            Arc::clone(&presenter),
            config,
        );
        Self {
            folder: folder.into(),
            monitor,
            presenter,
            index,
            coordinator,
            subscription: Mutex::new(None),
            subscribed: watch::Sender::new(false),
            offline_notified: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    /// Folder this session searches.
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// The folder index.
    pub fn index(&self) -> &RemoteFolderIndex {
        &self.index
    }

    /// The coordinator, for state and progress watchers.
    pub fn coordinator(&self) -> &SearchCoordinator {
        &self.coordinator
    }

    /// Whether a query would be accepted right now.
    pub fn input_enabled(&self) -> bool {
        !self.shutdown.is_cancelled() && self.index.is_ready() && self.coordinator.input_enabled()
    }

    /// Activate the session: subscribe to connectivity and load the index.
    ///
    /// Calling it again keeps the existing subscription and only retries
    /// the load.
    pub async fn start(&self) -> Result<Arc<HandleSet>, IndexError> {
        self.subscribe();
        info!(folder = %self.folder, "Search session started");
        self.load_index().await
    }

    /// Register for connectivity events, at most once per session.
    ///
    /// The event loop may already be waiting in [`next_event`](Self::next_event);
    /// it picks the subscription up from here.
    fn subscribe(&self) {
        let mut subscription = self.subscription.lock();
        if self.shutdown.is_cancelled() || *self.subscribed.borrow() {
            return;
        }
        *subscription = Some(self.monitor.subscribe());
        self.subscribed.send_replace(true);
    }

    /// Load the index again after a failure.
    pub async fn retry_load(&self) -> Result<Arc<HandleSet>, IndexError> {
        self.load_index().await
    }

    async fn load_index(&self) -> Result<Arc<HandleSet>, IndexError> {
        if !self.monitor.is_connected() {
            self.notify_offline();
            return Err(IndexError::NetworkUnavailable);
        }

        let _loading = self
            .coordinator
            .state_machine()
            .begin_loading()
            .map_err(|state| {
                debug!(?state, "Index load refused: session busy");
                IndexError::LoadInProgress
            })?;

        self.presenter.set_busy(true);
        let result = self.index.load(&self.folder).await;
        self.presenter.set_busy(false);

        match &result {
            Ok(_) => {}
            Err(IndexError::ListingFailed { source, .. }) => {
                self.presenter.notify(Notice::ListingFailed(source.to_string()));
            }
            Err(IndexError::NetworkUnavailable) => self.notify_offline(),
            Err(e) => debug!(error = %e, "Index load did not run"),
        }
        result
    }

    /// Run a query and show its outcome.
    ///
    /// Every refusal and every outcome other than full success is also
    /// reported to the presenter as a [`Notice`].
    pub async fn submit(&self, query: &str) -> Result<SearchOutcome, SearchError> {
        let result = self.accept(query).await;

        match &result {
            Ok(outcome) => {
                if let Some(notice) = outcome_notice(outcome) {
                    self.presenter.notify(notice);
                }
            }
            Err(SearchError::QueryTooShort { min, .. }) => {
                self.presenter.notify(Notice::QueryTooShort { min: *min });
            }
            Err(SearchError::NetworkUnavailable) => {
                self.presenter.notify(Notice::NetworkUnavailable);
            }
            Err(e) => debug!(error = %e, "Query not accepted"),
        }
        result
    }

    async fn accept(&self, query: &str) -> Result<SearchOutcome, SearchError> {
        if self.shutdown.is_cancelled() {
            return Err(SearchError::SessionClosed);
        }
        Query::parse(query)?;
        // Input is disabled until the index is ready; the coordinator treats
        // a search over an unloaded index as a caller bug.
        if !self.index.is_ready() {
            return Err(SearchError::IndexNotReady);
        }
        self.coordinator.search_index(query, &self.index).await
    }

    /// React to a connectivity transition.
    ///
    /// Losing the last tracked transport disables input; searches already
    /// running are left to settle. When the network returns and the index
    /// never loaded, the load is retried.
    pub async fn handle_event(&self, event: ConnectivityEvent) {
        debug!(?event, "Session received connectivity event");
        match event {
            ConnectivityEvent::Lost(_) => {
                if !self.monitor.is_connected() {
                    warn!(folder = %self.folder, "Network lost, input disabled");
                    self.notify_offline();
                }
            }
            ConnectivityEvent::Available(_) => {
                // A Lost may have overtaken this event.
                if !self.monitor.is_connected() {
                    debug!("Stale availability event ignored");
                    return;
                }
                if self.offline_notified.swap(false, Ordering::SeqCst) {
                    self.presenter.notify(Notice::NetworkRestored);
                }
                if !self.index.is_ready() {
                    if let Err(e) = self.load_index().await {
                        warn!(error = %e, "Index reload after reconnect failed");
                    }
                }
            }
        }
    }

    /// Wait for the next connectivity event.
    ///
    /// Before [`start`](Self::start) this waits for the session to
    /// subscribe. Returns `None` once the session is shut down or the
    /// monitor went away.
    pub async fn next_event(&self) -> Option<ConnectivityEvent> {
        let mut subscribed = self.subscribed.subscribe();
        let ready = tokio::select! {
            _ = self.shutdown.cancelled() => false,
            ready = async { subscribed.wait_for(|subscribed| *subscribed).await.is_ok() } => ready,
        };
        if !ready {
            return None;
        }
        let mut subscription = self.subscription.lock().take()?;
        let event = tokio::select! {
            _ = self.shutdown.cancelled() => None,
            event = subscription.recv() => event,
        };
        if !self.shutdown.is_cancelled() {
            *self.subscription.lock() = Some(subscription);
        }
        event
    }

    /// Handle connectivity events until shutdown.
    pub async fn run_events(&self) {
        while let Some(event) = self.next_event().await {
            self.handle_event(event).await;
        }
        debug!("Session event loop finished");
    }

    /// Deactivate the session and release the connectivity subscription.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.unsubscribe();
        }
        info!(folder = %self.folder, "Search session stopped");
    }

    fn notify_offline(&self) {
        if !self.offline_notified.swap(true, Ordering::SeqCst) {
            self.presenter.notify(Notice::NetworkUnavailable);
        }
    }
}

/// Notice for an outcome, if it needs one.
fn outcome_notice(outcome: &SearchOutcome) -> Option<Notice> {
    match outcome {
        SearchOutcome::Complete(_) => None,
        SearchOutcome::NoMatches => Some(Notice::NoMatches),
        SearchOutcome::Partial {
            results, failures, ..
        } => Some(Notice::PartialResolutionFailure {
            delivered: results.len(),
            failed: failures.len(),
        }),
        SearchOutcome::AllFailed { failures } => Some(Notice::AllResolutionsFailed {
            failed: failures.len(),
        }),
    }
}
