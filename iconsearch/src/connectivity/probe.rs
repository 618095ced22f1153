//! Reachability probing.
//!
//! Desktop hosts have no platform callback for "network available", so the
//! probe monitor opens a TCP connection to a known endpoint on a fixed
//! interval and feeds the result into a [`NetworkState`].

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::state::{NetworkState, Subscription};
use super::{ConnectivityMonitor, Transport};

/// Default probe target: the storage API front end.
pub const DEFAULT_PROBE_HOST: &str = "firebasestorage.googleapis.com";

/// Default probe port.
pub const DEFAULT_PROBE_PORT: u16 = 443;

/// Configuration for the probe monitor.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Host to connect to.
    pub host: String,
    /// Port to connect to.
    pub port: u16,
    /// Delay between probes.
    pub interval: Duration,
    /// Connect timeout for a single probe.
    pub timeout: Duration,
    /// Transport reported when the probe succeeds.
    pub transport: Transport,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_PROBE_HOST.to_string(),
            port: DEFAULT_PROBE_PORT,
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(2),
            transport: Transport::Wifi,
        }
    }
}

impl ProbeConfig {
    /// Create a config probing the given endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set the probe interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the connect timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the transport reported on success.
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }
}

/// Connectivity monitor backed by periodic TCP probes.
#[derive(Debug)]
pub struct ProbeMonitor {
    config: ProbeConfig,
    state: NetworkState,
}

impl ProbeMonitor {
    /// Create a monitor. Nothing is probed until [`probe_once`](Self::probe_once)
    /// or [`spawn`](Self::spawn) runs.
    pub fn new(config: ProbeConfig) -> Self {
        Self {
            config,
            state: NetworkState::new(),
        }
    }

    /// The state this monitor feeds.
    pub fn state(&self) -> &NetworkState {
        &self.state
    }

    /// Probe once and apply the result. Returns whether the endpoint answered.
    pub async fn probe_once(&self) -> bool {
        let addr = (self.config.host.as_str(), self.config.port);
        let reachable = matches!(
            tokio::time::timeout(self.config.timeout, TcpStream::connect(addr)).await,
            Ok(Ok(_))
        );

        debug!(
            host = %self.config.host,
            port = self.config.port,
            reachable,
            "Connectivity probe"
        );

        if reachable {
            self.state.set_available(self.config.transport);
        } else {
            self.state.set_lost(self.config.transport);
        }
        reachable
    }

    /// Probe in the background until the token is cancelled.
    ///
    /// The first probe runs immediately.
    pub fn spawn(self: Arc<Self>, cancellation: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                host = %self.config.host,
                interval_secs = self.config.interval.as_secs(),
                "Connectivity probe started"
            );
            loop {
                self.probe_once().await;
                tokio::select! {
                    _ = cancellation.cancelled() => break,
                    _ = tokio::time::sleep(self.config.interval) => {}
                }
            }
            info!("Connectivity probe stopped");
        })
    }
}

impl ConnectivityMonitor for ProbeMonitor {
    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn subscribe(&self) -> Subscription {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ConnectivityEvent;
    use tokio::net::TcpListener;

    #[test]
    fn test_default_config() {
        let config = ProbeConfig::default();
        assert_eq!(config.host, DEFAULT_PROBE_HOST);
        assert_eq!(config.port, 443);
        assert_eq!(config.transport, Transport::Wifi);
    }

    #[test]
    fn test_builder_pattern() {
        let config = ProbeConfig::new("127.0.0.1", 8080)
            .with_interval(Duration::from_millis(250))
            .with_timeout(Duration::from_millis(100))
            .with_transport(Transport::Cellular);

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.interval, Duration::from_millis(250));
        assert_eq!(config.timeout, Duration::from_millis(100));
        assert_eq!(config.transport, Transport::Cellular);
    }

    #[tokio::test]
    async fn test_probe_reports_reachable_then_lost() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let monitor = ProbeMonitor::new(
            ProbeConfig::new("127.0.0.1", port).with_timeout(Duration::from_millis(500)),
        );
        let mut sub = monitor.subscribe();
        assert!(!monitor.is_connected());

        assert!(monitor.probe_once().await);
        assert!(monitor.is_connected());
        assert_eq!(
            sub.try_recv(),
            Some(ConnectivityEvent::Available(Transport::Wifi))
        );

        drop(listener);
        assert!(!monitor.probe_once().await);
        assert!(!monitor.is_connected());
        assert_eq!(sub.try_recv(), Some(ConnectivityEvent::Lost(Transport::Wifi)));
    }

    #[tokio::test]
    async fn test_spawned_probe_stops_on_cancel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let monitor = Arc::new(ProbeMonitor::new(
            ProbeConfig::new("127.0.0.1", port).with_interval(Duration::from_millis(20)),
        ));
        let mut sub = monitor.subscribe();
        let cancellation = CancellationToken::new();
        let handle = Arc::clone(&monitor).spawn(cancellation.clone());

        let event = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(ConnectivityEvent::Available(Transport::Wifi)));

        cancellation.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
