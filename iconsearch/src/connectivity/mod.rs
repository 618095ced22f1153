//! Network reachability tracking.
//!
//! Components ask a [`ConnectivityMonitor`] whether the network is usable
//! before starting remote work, and hold a [`Subscription`] to react to
//! transitions while a screen is active.
//!
//! # Architecture
//!
//! ```text
//! ProbeMonitor ──set_available / set_lost──► NetworkState ──events──► Subscription(s)
//!  (TCP probe)                               (source of truth)        (scoped guards)
//! ```
//!
//! Only cellular and Wi-Fi transports count as connected, and only their
//! transitions reach subscribers.

mod probe;
mod state;

pub use probe::{ProbeConfig, ProbeMonitor};
pub use state::{NetworkState, Subscription};

use std::fmt;
use std::str::FromStr;

/// Network transport kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// Mobile data.
    Cellular,
    /// Wireless LAN.
    Wifi,
    /// Wired LAN. Reported but not counted as connected.
    Ethernet,
}

impl Transport {
    /// Whether this transport counts towards connectivity.
    pub fn is_tracked(&self) -> bool {
        matches!(self, Transport::Cellular | Transport::Wifi)
    }

    /// Lowercase name, as used in config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Cellular => "cellular",
            Transport::Wifi => "wifi",
            Transport::Ethernet => "ethernet",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cellular" => Ok(Transport::Cellular),
            "wifi" => Ok(Transport::Wifi),
            "ethernet" => Ok(Transport::Ethernet),
            other => Err(format!("unknown transport: {}", other)),
        }
    }
}

/// A reachability transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    /// A transport became usable.
    Available(Transport),
    /// A transport went away.
    Lost(Transport),
}

impl ConnectivityEvent {
    /// Transport the event is about.
    pub fn transport(&self) -> Transport {
        match self {
            ConnectivityEvent::Available(t) | ConnectivityEvent::Lost(t) => *t,
        }
    }
}

/// Source of reachability information.
///
/// Implementations must be cheap to query and must never fail: anything
/// that prevents answering is reported as "not connected".
pub trait ConnectivityMonitor: Send + Sync {
    /// Instantaneous check: is any tracked transport active?
    fn is_connected(&self) -> bool;

    /// Register for transitions of tracked transports.
    ///
    /// The registration lives as long as the returned guard.
    fn subscribe(&self) -> Subscription;
}
