//! Presentation surface for search results.
//!
//! The coordinator and the session talk to the user only through a
//! [`ResultPresenter`]: a busy indicator, the final address list, and short
//! transient notices.

use std::fmt;

use crate::storage::ResolvedAddress;

/// Transient user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The query was shorter than the minimum.
    QueryTooShort { min: usize },
    /// Nothing in the folder matched.
    NoMatches,
    /// There is no usable network.
    NetworkUnavailable,
    /// The network came back.
    NetworkRestored,
    /// The folder listing failed; searching stays disabled.
    ListingFailed(String),
    /// Some matches could not be resolved.
    PartialResolutionFailure { delivered: usize, failed: usize },
    /// No match could be resolved.
    AllResolutionsFailed { failed: usize },
}

impl Notice {
    /// Whether the user can fix the situation by searching again.
    pub fn offers_retry(&self) -> bool {
        matches!(
            self,
            Notice::PartialResolutionFailure { .. } | Notice::AllResolutionsFailed { .. }
        )
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::QueryTooShort { min } => {
                write!(f, "Enter at least {} characters.", min)
            }
            Notice::NoMatches => write!(f, "No icons found."),
            Notice::NetworkUnavailable => write!(f, "No network connection."),
            Notice::NetworkRestored => write!(f, "Network connection restored."),
            Notice::ListingFailed(reason) => {
                write!(f, "Could not load the icon list: {}", reason)
            }
            Notice::PartialResolutionFailure { delivered, failed } => write!(
                f,
                "Showing {} icons; {} could not be loaded. Search again to retry.",
                delivered, failed
            ),
            Notice::AllResolutionsFailed { failed } => write!(
                f,
                "None of the {} matching icons could be loaded. Search again to retry.",
                failed
            ),
        }
    }
}

/// Receiver of search output.
///
/// Calls arrive from the task running the search; implementations that
/// drive a UI forward them to their own thread.
pub trait ResultPresenter: Send + Sync {
    /// Show or hide the busy indicator.
    fn set_busy(&self, busy: bool);

    /// Display a list of icon addresses.
    fn present(&self, addresses: &[ResolvedAddress]);

    /// Show a transient message.
    fn notify(&self, notice: Notice);
}

/// Presenter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPresenter;

impl ResultPresenter for NullPresenter {
    fn set_busy(&self, _busy: bool) {}

    fn present(&self, _addresses: &[ResolvedAddress]) {}

    fn notify(&self, _notice: Notice) {}
}
