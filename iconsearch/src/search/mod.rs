//! Icon search.
//!
//! A search filters a loaded [`HandleSet`](crate::index::HandleSet) by a
//! substring query, resolves every match concurrently and delivers the
//! addresses once every resolution has settled.
//!
//! # Components
//!
//! - [`Query`]: length validation and matching
//! - [`SettlementTally`]: success and failure counts for one batch
//! - [`SessionStateMachine`]: `Idle`, `Loading`, `Searching`, `Presenting`
//! - [`SearchCoordinator`]: runs the batch and talks to the presenter

mod coordinator;
mod query;
mod state;
mod tally;

pub use coordinator::{
    PartialPolicy, ResultSet, SearchConfig, SearchCoordinator, SearchOutcome,
    DEFAULT_SESSION_TIMEOUT,
};
pub use query::{Query, MIN_QUERY_LEN};
pub use state::{LoadingGuard, SearchGuard, SessionState, SessionStateMachine};
pub use tally::{ResolutionFailure, SearchProgress, SettlementTally};

use thiserror::Error;

/// Reasons a search did not start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// The query is shorter than [`MIN_QUERY_LEN`].
    #[error("query too short: {len} characters, at least {min} required")]
    QueryTooShort { len: usize, min: usize },

    /// Another search is running.
    #[error("a search is already in progress")]
    SearchInProgress,

    /// No tracked transport is active.
    #[error("no network connection")]
    NetworkUnavailable,

    /// The folder index has not finished loading.
    #[error("the icon index is not ready")]
    IndexNotReady,

    /// The session was shut down.
    #[error("the search session is closed")]
    SessionClosed,
}
