//! Search coordinator: filter, resolve concurrently, join, deliver.
//!
//! # Flow
//!
//! ```text
//! query ──validate──► begin_search ──filter──► N matches
//!                                                │
//!                          ┌──── spawn N resolutions (JoinSet) ────┐
//!                          ▼                                        ▼
//!                    join loop (single writer) ──► SettlementTally ──► settled == N
//!                                                                        │
//!                                              Complete | Partial | AllFailed
//! ```
//!
//! The join loop is the only place that touches the tally, and it waits on
//! task completions rather than polling. A resolution that fails still
//! settles, so the gate opens as soon as every task has finished, however
//! many of them failed.
//!
//! A session timeout bounds the whole batch. Resolutions still running at
//! the deadline are detached (left to finish on their own) and counted as
//! failed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::connectivity::ConnectivityMonitor;
use crate::index::{HandleSet, RemoteFolderIndex};
use crate::presenter::ResultPresenter;
use crate::storage::{Handle, ObjectStore, ResolvedAddress};

use super::query::Query;
use super::state::{SessionState, SessionStateMachine};
use super::tally::{ResolutionFailure, SearchProgress, SettlementTally};
use super::SearchError;

/// Default bound on a whole search.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30);

/// What to do with results when some resolutions failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialPolicy {
    /// Show what resolved.
    #[default]
    Present,
    /// Show nothing; the caller is expected to retry the whole search.
    Withhold,
}

impl PartialPolicy {
    /// Config file spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            PartialPolicy::Present => "present",
            PartialPolicy::Withhold => "withhold",
        }
    }
}

impl std::str::FromStr for PartialPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "present" => Ok(PartialPolicy::Present),
            "withhold" => Ok(PartialPolicy::Withhold),
            other => Err(format!("unknown partial result policy: {}", other)),
        }
    }
}

/// Configuration for the search coordinator.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Upper bound for one search, from dispatch to the last settlement.
    pub session_timeout: Duration,
    /// Handling of partially resolved result sets.
    pub partial_policy: PartialPolicy,
    /// Deliver addresses in match order instead of completion order.
    pub preserve_match_order: bool,
    /// Maximum resolutions in flight (0 = no limit).
    pub max_concurrent_resolutions: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            partial_policy: PartialPolicy::Present,
            preserve_match_order: true,
            max_concurrent_resolutions: 0,
        }
    }
}

impl SearchConfig {
    /// Set the session timeout.
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Set the partial result policy.
    pub fn with_partial_policy(mut self, policy: PartialPolicy) -> Self {
        self.partial_policy = policy;
        self
    }

    /// Enable or disable match-order delivery.
    pub fn with_preserve_match_order(mut self, preserve: bool) -> Self {
        self.preserve_match_order = preserve;
        self
    }

    /// Set the in-flight limit (0 = no limit).
    pub fn with_max_concurrent_resolutions(mut self, max: usize) -> Self {
        self.max_concurrent_resolutions = max;
        self
    }
}

/// Addresses produced by one search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    addresses: Vec<ResolvedAddress>,
    match_count: usize,
}

impl ResultSet {
    fn new(addresses: Vec<ResolvedAddress>, match_count: usize) -> Self {
        Self {
            addresses,
            match_count,
        }
    }

    /// Resolved addresses.
    pub fn addresses(&self) -> &[ResolvedAddress] {
        &self.addresses
    }

    /// Number of addresses.
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Whether no address resolved.
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Number of matches the search started with.
    pub fn match_count(&self) -> usize {
        self.match_count
    }

    /// Whether every match produced an address.
    pub fn is_complete(&self) -> bool {
        self.addresses.len() == self.match_count
    }

    /// Unwrap into the address list.
    pub fn into_addresses(self) -> Vec<ResolvedAddress> {
        self.addresses
    }
}

/// Result of a search that ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Nothing matched; no resolution was attempted.
    NoMatches,
    /// Every match resolved.
    Complete(ResultSet),
    /// Some matches resolved.
    Partial {
        results: ResultSet,
        failures: Vec<ResolutionFailure>,
        /// Whether the partial set was handed to the presenter.
        presented: bool,
    },
    /// No match resolved.
    AllFailed { failures: Vec<ResolutionFailure> },
}

impl SearchOutcome {
    /// Addresses produced, if any.
    pub fn results(&self) -> Option<&ResultSet> {
        match self {
            SearchOutcome::Complete(results) | SearchOutcome::Partial { results, .. } => {
                Some(results)
            }
            _ => None,
        }
    }

    /// Failed resolutions.
    pub fn failures(&self) -> &[ResolutionFailure] {
        match self {
            SearchOutcome::Partial { failures, .. } | SearchOutcome::AllFailed { failures } => {
                failures
            }
            _ => &[],
        }
    }

    /// Number of matches the search started with.
    pub fn match_count(&self) -> usize {
        match self {
            SearchOutcome::NoMatches => 0,
            SearchOutcome::Complete(results) => results.match_count(),
            SearchOutcome::Partial { results, .. } => results.match_count(),
            SearchOutcome::AllFailed { failures } => failures.len(),
        }
    }
}

/// Turns busy on when created and off when dropped.
struct BusySignal<'a> {
    presenter: &'a dyn ResultPresenter,
}

impl<'a> BusySignal<'a> {
    fn raise(presenter: &'a dyn ResultPresenter) -> Self {
        presenter.set_busy(true);
        Self { presenter }
    }
}

impl Drop for BusySignal<'_> {
    fn drop(&mut self) {
        self.presenter.set_busy(false);
    }
}

type TaskOutput = (usize, Result<ResolvedAddress, String>);

/// Runs searches against a loaded handle set.
///
/// One search at a time: while a search runs, further calls are refused
/// with [`SearchError::SearchInProgress`].
pub struct SearchCoordinator {
    store: Arc<dyn ObjectStore>,
    monitor: Arc<dyn ConnectivityMonitor>,
    presenter: Arc<dyn ResultPresenter>,
    config: SearchConfig,
    state: SessionStateMachine,
    progress: watch::Sender<SearchProgress>,
}

impl SearchCoordinator {
    /// Create a coordinator.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        monitor: Arc<dyn ConnectivityMonitor>,
        presenter: Arc<dyn ResultPresenter>,
        config: SearchConfig,
    ) -> Self {
        let (progress, _rx) = watch::channel(SearchProgress::default());
        Self {
            store,
            monitor,
            presenter,
            config,
            state: SessionStateMachine::new(),
            progress,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    /// The state machine, for callers that run their own busy phases
    /// (index loads) through it.
    pub fn state_machine(&self) -> &SessionStateMachine {
        &self.state
    }

    /// Watch session state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Watch settlement progress of the running search.
    pub fn subscribe_progress(&self) -> watch::Receiver<SearchProgress> {
        self.progress.subscribe()
    }

    /// Whether a query could be submitted right now.
    pub fn input_enabled(&self) -> bool {
        self.state.is_idle() && self.monitor.is_connected()
    }

    /// Filter `handles` by `query` and resolve every match.
    ///
    /// Validation failures and refusals leave the state untouched and never
    /// raise the busy indicator. Once the search started, the state returns
    /// to `Idle` and busy is cleared on every exit path.
    pub async fn search(
        &self,
        query: &str,
        handles: &HandleSet,
    ) -> Result<SearchOutcome, SearchError> {
        let query = Query::parse(query)?;

        if !self.monitor.is_connected() {
            warn!(query = %query, "Search refused: no network");
            return Err(SearchError::NetworkUnavailable);
        }

        let guard = self.state.begin_search().map_err(|blocking| match blocking {
            SessionState::Loading => SearchError::IndexNotReady,
            _ => SearchError::SearchInProgress,
        })?;
        let _busy = BusySignal::raise(self.presenter.as_ref());

        let matches: Vec<(usize, Handle)> = handles
            .iter()
            .filter(|handle| query.matches(handle.name()))
            .cloned()
            .enumerate()
            .collect();
        let match_count = matches.len();

        let span = info_span!("search", query = %query, matches = match_count);
        if matches.is_empty() {
            span.in_scope(|| info!("No matching icons"));
            return Ok(SearchOutcome::NoMatches);
        }

        let tally = self.resolve_all(matches).instrument(span.clone()).await;
        let (succeeded, failed) = (tally.succeeded(), tally.failed());
        let (addresses, failures) = tally.into_parts(self.config.preserve_match_order);
        let results = ResultSet::new(addresses, match_count);

        let _entered = span.enter();
        let outcome = if failed == 0 {
            info!(resolved = succeeded, "Search complete");
            guard.presenting();
            self.presenter.present(results.addresses());
            SearchOutcome::Complete(results)
        } else if succeeded > 0 {
            let presented = self.config.partial_policy == PartialPolicy::Present;
            warn!(
                resolved = succeeded,
                failed,
                presented,
                "Search finished with failed resolutions"
            );
            if presented {
                guard.presenting();
                self.presenter.present(results.addresses());
            }
            SearchOutcome::Partial {
                results,
                failures,
                presented,
            }
        } else {
            warn!(failed, "No match could be resolved");
            SearchOutcome::AllFailed { failures }
        };

        Ok(outcome)
    }

    /// Search the current set of `index`.
    ///
    /// Calling this before the index finished loading is a caller bug. Debug
    /// builds panic; release builds log it at error level and refuse with
    /// [`SearchError::IndexNotReady`].
    pub async fn search_index(
        &self,
        query: &str,
        index: &RemoteFolderIndex,
    ) -> Result<SearchOutcome, SearchError> {
        Query::parse(query)?;
        let handles = match index.handles() {
            Ok(handles) => handles,
            Err(e) => {
                error!(state = index.state().label(), error = %e, "Search issued before the index was ready");
                debug_assert!(
                    index.is_ready(),
                    "search issued before the index was ready ({})",
                    index.state().label()
                );
                return Err(SearchError::IndexNotReady);
            }
        };
        self.search(query, &handles).await
    }

    /// Dispatch one resolution per match and join them all.
    async fn resolve_all(&self, matches: Vec<(usize, Handle)>) -> SettlementTally {
        let mut tally = SettlementTally::new(matches.len());
        let limiter = (self.config.max_concurrent_resolutions > 0)
            .then(|| Arc::new(Semaphore::new(self.config.max_concurrent_resolutions)));
        let mut tasks: JoinSet<TaskOutput> = JoinSet::new();

        for (position, handle) in matches {
            tally.record_dispatch(position, handle.clone());
            let store = Arc::clone(&self.store);
            let limiter = limiter.clone();

            tasks.spawn(async move {
                let _permit = match limiter {
                    // Closed on timeout: queued work never starts.
                    Some(limiter) => match limiter.acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(_) => return (position, Err("cancelled".to_string())),
                    },
                    None => None,
                };
                let result = store.resolve(&handle).await.map_err(|e| e.to_string());
                (position, result)
            });
        }

        self.progress.send_replace(tally.progress());
        debug!(dispatched = tally.total(), "Resolutions dispatched");

        let deadline = Instant::now() + self.config.session_timeout;
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((position, Ok(address))))) => {
                    debug!(position, address = %address, "Resolved");
                    tally.record_success(position, address);
                }
                Ok(Some(Ok((position, Err(reason))))) => {
                    debug!(position, reason = %reason, "Resolution failed");
                    tally.record_failure(position, reason);
                }
                Ok(Some(Err(join_error))) => {
                    // The position is unknown here; whatever stays pending
                    // after the join is settled below.
                    warn!(error = %join_error, "Resolution task aborted");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        pending = tally.pending(),
                        timeout_secs = self.config.session_timeout.as_secs_f64(),
                        "Search timed out, detaching unsettled resolutions"
                    );
                    if let Some(limiter) = &limiter {
                        limiter.close();
                    }
                    tasks.detach_all();
                    tally.fail_pending("timed out");
                    break;
                }
            }
            self.progress.send_replace(tally.progress());
        }

        tally.fail_pending("resolution task aborted");
        self.progress.send_replace(tally.progress());
        debug_assert!(tally.is_settled());
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::{NetworkState, Transport};
    use crate::presenter::tests::{Call, RecordingPresenter};
    use crate::storage::MemoryStore;

    const FOLDER: &str = "google_icons/drawable-hdpi";

    struct Fixture {
        store: Arc<MemoryStore>,
        network: NetworkState,
        presenter: Arc<RecordingPresenter>,
        coordinator: SearchCoordinator,
        handles: HandleSet,
    }

    fn fixture_with(names: &[&str], config: SearchConfig) -> Fixture {
        let paths: Vec<String> = names.iter().map(|n| format!("{}/{}", FOLDER, n)).collect();
        let store = Arc::new(MemoryStore::new("mem://b").with_objects(paths.clone()));
        let network = NetworkState::connected(Transport::Wifi);
        let presenter = Arc::new(RecordingPresenter::default());
        let coordinator = SearchCoordinator::new(
            store.clone(),
            Arc::new(network.clone()),
            presenter.clone(),
            config,
        );
        let handles = paths.into_iter().map(Handle::new).collect();
        Fixture {
            store,
            network,
            presenter,
            coordinator,
            handles,
        }
    }

    fn fixture(names: &[&str]) -> Fixture {
        fixture_with(names, SearchConfig::default())
    }

    fn address(name: &str) -> String {
        format!("mem://b/{}/{}", FOLDER, name)
    }

    #[test]
    fn test_default_config() {
        let config = SearchConfig::default();
        assert_eq!(config.session_timeout, Duration::from_secs(30));
        assert_eq!(config.partial_policy, PartialPolicy::Present);
        assert!(config.preserve_match_order);
        assert_eq!(config.max_concurrent_resolutions, 0);
    }

    #[test]
    fn test_partial_policy_parse() {
        assert_eq!("Withhold".parse::<PartialPolicy>(), Ok(PartialPolicy::Withhold));
        assert_eq!("present".parse::<PartialPolicy>(), Ok(PartialPolicy::Present));
        assert!("retry".parse::<PartialPolicy>().is_err());
    }

    #[tokio::test]
    async fn test_full_success_presents_in_match_order() {
        let f = fixture(&["home_hdpi.png", "search_hdpi.png", "back.png"]);
        f.store
            .delay_resolution("home_hdpi.png", Duration::from_millis(30));

        let outcome = f.coordinator.search("_hdpi", &f.handles).await.unwrap();

        let results = outcome.results().unwrap();
        assert!(results.is_complete());
        assert_eq!(results.len(), 2);
        assert_eq!(
            f.presenter.calls(),
            vec![
                Call::Busy(true),
                Call::Present(vec![address("home_hdpi.png"), address("search_hdpi.png")]),
                Call::Busy(false),
            ]
        );
        assert_eq!(f.coordinator.state(), SessionState::Idle);
        assert!(f.coordinator.input_enabled());
    }

    #[tokio::test]
    async fn test_completion_order_when_not_preserved() {
        let f = fixture_with(
            &["home_hdpi.png", "search_hdpi.png"],
            SearchConfig::default().with_preserve_match_order(false),
        );
        f.store
            .delay_resolution("home_hdpi.png", Duration::from_millis(50));

        let outcome = f.coordinator.search("hdpi", &f.handles).await.unwrap();
        let addresses: Vec<_> = outcome
            .results()
            .unwrap()
            .addresses()
            .iter()
            .map(|a| a.as_str().to_string())
            .collect();
        assert_eq!(addresses, vec![address("search_hdpi.png"), address("home_hdpi.png")]);
    }

    #[tokio::test]
    async fn test_short_query_touches_nothing() {
        let f = fixture(&["home_hdpi.png"]);

        let err = f.coordinator.search("h", &f.handles).await.unwrap_err();

        assert_eq!(err, SearchError::QueryTooShort { len: 1, min: 2 });
        assert!(f.presenter.calls().is_empty());
        assert_eq!(f.store.resolve_calls(), 0);
        assert_eq!(f.coordinator.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_no_matches_returns_to_idle_without_resolving() {
        let f = fixture(&["home_hdpi.png", "back.png"]);

        let outcome = f.coordinator.search("xyz", &f.handles).await.unwrap();

        assert_eq!(outcome, SearchOutcome::NoMatches);
        assert_eq!(f.store.resolve_calls(), 0);
        assert_eq!(
            f.presenter.calls(),
            vec![Call::Busy(true), Call::Busy(false)]
        );
        assert_eq!(f.coordinator.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_partial_failure_settles_and_presents() {
        let f = fixture(&["a_icon.png", "b_icon.png", "c_icon.png"]);
        f.store.fail_resolution("b_icon.png");

        let outcome = f.coordinator.search("icon", &f.handles).await.unwrap();

        match &outcome {
            SearchOutcome::Partial {
                results,
                failures,
                presented,
            } => {
                assert_eq!(results.len(), 2);
                assert_eq!(results.match_count(), 3);
                assert!(!results.is_complete());
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].name, "b_icon.png");
                assert!(*presented);
            }
            other => panic!("expected partial outcome, got {:?}", other),
        }
        assert_eq!(
            f.presenter.presented(),
            vec![vec![address("a_icon.png"), address("c_icon.png")]]
        );
        assert!(f.coordinator.input_enabled());
    }

    #[tokio::test]
    async fn test_partial_failure_withheld() {
        let f = fixture_with(
            &["a_icon.png", "b_icon.png"],
            SearchConfig::default().with_partial_policy(PartialPolicy::Withhold),
        );
        f.store.fail_resolution("a_icon.png");

        let outcome = f.coordinator.search("icon", &f.handles).await.unwrap();

        assert!(matches!(
            outcome,
            SearchOutcome::Partial {
                presented: false,
                ..
            }
        ));
        assert!(f.presenter.presented().is_empty());
        assert_eq!(f.coordinator.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_all_failed() {
        let f = fixture(&["a_icon.png", "b_icon.png"]);
        f.store.fail_resolution("a_icon.png");
        f.store.fail_resolution("b_icon.png");

        let outcome = f.coordinator.search("icon", &f.handles).await.unwrap();

        assert_eq!(outcome.failures().len(), 2);
        assert_eq!(outcome.match_count(), 2);
        assert!(matches!(outcome, SearchOutcome::AllFailed { .. }));
        assert!(f.presenter.presented().is_empty());
        assert_eq!(
            f.presenter.calls(),
            vec![Call::Busy(true), Call::Busy(false)]
        );
    }

    #[tokio::test]
    async fn test_offline_search_refused() {
        let f = fixture(&["home_hdpi.png"]);
        f.network.set_lost(Transport::Wifi);

        let err = f.coordinator.search("home", &f.handles).await.unwrap_err();

        assert_eq!(err, SearchError::NetworkUnavailable);
        assert!(f.presenter.calls().is_empty());
        assert!(!f.coordinator.input_enabled());
    }

    #[tokio::test]
    async fn test_overlapping_search_refused() {
        let f = fixture(&["home_hdpi.png"]);
        f.store
            .delay_resolution("home_hdpi.png", Duration::from_millis(100));

        let (first, second) = tokio::join!(
            f.coordinator.search("home", &f.handles),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                f.coordinator.search("home", &f.handles).await
            }
        );

        assert!(matches!(first, Ok(SearchOutcome::Complete(_))));
        assert_eq!(second, Err(SearchError::SearchInProgress));
        assert_eq!(f.store.resolve_calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_submitters_get_one_search() {
        let f = fixture(&["home_hdpi.png", "search_hdpi.png"]);
        f.store
            .delay_resolution("home_hdpi.png", Duration::from_millis(50));

        let results =
            futures::future::join_all((0..5).map(|_| f.coordinator.search("hdpi", &f.handles)))
                .await;

        let started = results.iter().filter(|r| r.is_ok()).count();
        let refused = results
            .iter()
            .filter(|r| matches!(r, Err(SearchError::SearchInProgress)))
            .count();
        assert_eq!(started, 1);
        assert_eq!(refused, 4);
        assert_eq!(f.store.resolve_calls(), 2);
    }

    #[tokio::test]
    async fn test_loading_state_reports_index_not_ready() {
        let f = fixture(&["home_hdpi.png"]);
        let _loading = f.coordinator.state_machine().begin_loading().unwrap();

        let err = f.coordinator.search("home", &f.handles).await.unwrap_err();
        assert_eq!(err, SearchError::IndexNotReady);
    }

    #[tokio::test]
    async fn test_search_index_over_loaded_index() {
        let f = fixture(&["home_hdpi.png"]);
        let index = RemoteFolderIndex::new(f.store.clone(), Arc::new(f.network.clone()));

        index.load(&format!("{}/", FOLDER)).await.unwrap();
        let outcome = f.coordinator.search_index("home", &index).await.unwrap();
        assert!(matches!(outcome, SearchOutcome::Complete(_)));
    }

    #[cfg(debug_assertions)]
    #[tokio::test]
    #[should_panic(expected = "search issued before the index was ready")]
    async fn test_search_index_before_load_panics_in_debug() {
        let f = fixture(&["home_hdpi.png"]);
        let index = RemoteFolderIndex::new(f.store.clone(), Arc::new(f.network.clone()));

        let _ = f.coordinator.search_index("home", &index).await;
    }

    #[cfg(not(debug_assertions))]
    #[tokio::test]
    async fn test_search_index_before_load_is_refused_in_release() {
        let f = fixture(&["home_hdpi.png"]);
        let index = RemoteFolderIndex::new(f.store.clone(), Arc::new(f.network.clone()));

        let err = f.coordinator.search_index("home", &index).await.unwrap_err();
        assert_eq!(err, SearchError::IndexNotReady);
        assert!(f.presenter.calls().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_counts_unsettled_as_failed() {
        let f = fixture_with(
            &["fast_icon.png", "slow_icon.png"],
            SearchConfig::default().with_session_timeout(Duration::from_millis(50)),
        );
        f.store
            .delay_resolution("slow_icon.png", Duration::from_secs(10));

        let started = std::time::Instant::now();
        let outcome = f.coordinator.search("icon", &f.handles).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        let failures = outcome.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name, "slow_icon.png");
        assert_eq!(failures[0].reason, "timed out");
        assert_eq!(outcome.results().unwrap().len(), 1);
        assert_eq!(f.coordinator.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_concurrency_limit_still_resolves_everything() {
        let names: Vec<String> = (0..8).map(|i| format!("icon_{}.png", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let f = fixture_with(
            &refs,
            SearchConfig::default().with_max_concurrent_resolutions(2),
        );

        let outcome = f.coordinator.search("icon_", &f.handles).await.unwrap();

        assert_eq!(outcome.results().unwrap().len(), 8);
        assert_eq!(f.store.resolve_calls(), 8);
    }

    #[tokio::test]
    async fn test_timeout_with_limit_starts_no_queued_resolution() {
        let f = fixture_with(
            &["a_icon.png", "b_icon.png", "c_icon.png"],
            SearchConfig::default()
                .with_max_concurrent_resolutions(1)
                .with_session_timeout(Duration::from_millis(30)),
        );
        for name in ["a_icon.png", "b_icon.png", "c_icon.png"] {
            f.store.delay_resolution(name, Duration::from_millis(100));
        }

        let outcome = f.coordinator.search("icon", &f.handles).await.unwrap();
        assert_eq!(outcome.failures().len(), 3);
        assert_eq!(f.store.resolve_calls(), 1);

        // The in-flight request finishes and releases its permit; nothing
        // queued behind it may start.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(f.store.resolve_calls(), 1);
    }

    #[tokio::test]
    async fn test_progress_reaches_total() {
        let f = fixture(&["a_icon.png", "b_icon.png", "c_icon.png"]);
        f.store.fail_resolution("c_icon.png");
        let progress = f.coordinator.subscribe_progress();

        f.coordinator.search("icon", &f.handles).await.unwrap();

        let last = *progress.borrow();
        assert_eq!(last.total, 3);
        assert_eq!(last.succeeded, 2);
        assert_eq!(last.failed, 1);
        assert_eq!(last.settled(), 3);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            /// Whatever fails, every match settles exactly once and the
            /// session ends idle with busy cleared.
            #[test]
            fn prop_every_match_settles(failing in prop::collection::vec(any::<bool>(), 1..12)) {
                let names: Vec<String> =
                    (0..failing.len()).map(|i| format!("icon_{:02}.png", i)).collect();
                let refs: Vec<&str> = names.iter().map(String::as_str).collect();
                let f = fixture(&refs);
                for (name, fail) in names.iter().zip(&failing) {
                    if *fail {
                        f.store.fail_resolution(name.clone());
                    }
                }

                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                    .unwrap();
                let outcome = runtime
                    .block_on(f.coordinator.search("icon", &f.handles))
                    .unwrap();

                let expected_failures = failing.iter().filter(|fail| **fail).count();
                let delivered = outcome.results().map(ResultSet::len).unwrap_or(0);
                prop_assert_eq!(delivered + outcome.failures().len(), failing.len());
                prop_assert_eq!(outcome.failures().len(), expected_failures);
                prop_assert_eq!(f.coordinator.state(), SessionState::Idle);
                prop_assert_eq!(f.presenter.calls().last().cloned(), Some(Call::Busy(false)));
            }
        }
    }
}
