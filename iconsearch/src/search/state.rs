//! Session state machine.
//!
//! # State Machine
//!
//! ```text
//! Idle --[begin_loading]--> Loading --[guard dropped]--> Idle
//! Idle --[begin_search]--> Searching --[present]--> Presenting
//! Searching | Presenting --[guard dropped]--> Idle
//! ```
//!
//! Transitions out of `Idle` are compare-and-set: a second search or load
//! while the machine is busy is refused. Leaving a busy state happens when
//! the guard is dropped, which covers early returns, errors and cancelled
//! futures alike.

use tokio::sync::watch;
use tracing::debug;

/// State of one search screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Accepting queries.
    Idle,
    /// The folder index is loading.
    Loading,
    /// Resolutions are in flight.
    Searching,
    /// Results are being handed to the presenter.
    Presenting,
}

impl SessionState {
    /// User-facing label.
    pub fn display_status(&self) -> &'static str {
        match self {
            SessionState::Idle => "Ready",
            SessionState::Loading => "Loading icon list...",
            SessionState::Searching => "Searching...",
            SessionState::Presenting => "Showing results",
        }
    }
}

/// Observable session state with guarded transitions.
#[derive(Debug)]
pub struct SessionStateMachine {
    tx: watch::Sender<SessionState>,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    /// Create a machine in `Idle`.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Idle);
        Self { tx }
    }

    /// Current state.
    pub fn current(&self) -> SessionState {
        *self.tx.borrow()
    }

    /// Whether a new search could start now.
    pub fn is_idle(&self) -> bool {
        self.current() == SessionState::Idle
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Move to `to` if the current state is one of `from`.
    /// Returns the blocking state otherwise.
    fn transition(&self, from: &[SessionState], to: SessionState) -> Result<(), SessionState> {
        let mut outcome = Ok(());
        self.tx.send_if_modified(|state| {
            if from.contains(state) {
                debug!(from = ?*state, to = ?to, "Session state transition");
                *state = to;
                true
            } else {
                outcome = Err(*state);
                false
            }
        });
        outcome
    }

    /// Idle → Searching.
    pub fn begin_search(&self) -> Result<SearchGuard<'_>, SessionState> {
        self.transition(&[SessionState::Idle], SessionState::Searching)?;
        Ok(SearchGuard { machine: self })
    }

    /// Idle → Loading.
    pub fn begin_loading(&self) -> Result<LoadingGuard<'_>, SessionState> {
        self.transition(&[SessionState::Idle], SessionState::Loading)?;
        Ok(LoadingGuard { machine: self })
    }

    fn finish(&self, from: &[SessionState]) {
        // Only fails if someone else already moved the machine, which the
        // guards rule out.
        let _ = self.transition(from, SessionState::Idle);
    }
}

/// Held while a search runs. Dropping it returns the machine to `Idle`.
#[derive(Debug)]
pub struct SearchGuard<'a> {
    machine: &'a SessionStateMachine,
}

impl SearchGuard<'_> {
    /// Searching → Presenting.
    pub fn presenting(&self) {
        let _ = self
            .machine
            .transition(&[SessionState::Searching], SessionState::Presenting);
    }
}

impl Drop for SearchGuard<'_> {
    fn drop(&mut self) {
        self.machine
            .finish(&[SessionState::Searching, SessionState::Presenting]);
    }
}

/// Held while the index loads. Dropping it returns the machine to `Idle`.
#[derive(Debug)]
pub struct LoadingGuard<'a> {
    machine: &'a SessionStateMachine,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.machine.finish(&[SessionState::Loading]);
    }
}
