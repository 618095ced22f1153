//! Shared network state and scoped subscriptions.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{ConnectivityEvent, ConnectivityMonitor, Transport};

type EventSender = mpsc::UnboundedSender<ConnectivityEvent>;

#[derive(Debug, Default)]
struct Shared {
    active: Mutex<HashSet<Transport>>,
    subscribers: Mutex<HashMap<u64, EventSender>>,
    next_id: AtomicU64,
}

impl Shared {
    fn publish(&self, event: ConnectivityEvent) {
        let mut subscribers = self.subscribers.lock();
        // Receivers that went away without unsubscribing are pruned here.
        subscribers.retain(|_, tx| tx.send(event).is_ok());
        debug!(?event, subscribers = subscribers.len(), "Connectivity event published");
    }

    fn remove(&self, id: u64) -> bool {
        self.subscribers.lock().remove(&id).is_some()
    }
}

/// Current set of active transports plus the subscriber registry.
///
/// Cloning is cheap and every clone observes the same state.
#[derive(Debug, Clone, Default)]
pub struct NetworkState {
    shared: Arc<Shared>,
}

impl NetworkState {
    /// Create a state with no active transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state with one transport already active.
    pub fn connected(transport: Transport) -> Self {
        let state = Self::new();
        state.shared.active.lock().insert(transport);
        state
    }

    /// Mark a transport as active.
    ///
    /// Subscribers hear about it only if the transport is tracked and was
    /// not already active.
    pub fn set_available(&self, transport: Transport) {
        // Publishing under the lock keeps event order equal to state order.
        let mut active = self.shared.active.lock();
        if active.insert(transport) && transport.is_tracked() {
            info!(%transport, "Network available");
            self.shared.publish(ConnectivityEvent::Available(transport));
        }
    }

    /// Mark a transport as gone.
    pub fn set_lost(&self, transport: Transport) {
        let mut active = self.shared.active.lock();
        if active.remove(&transport) && transport.is_tracked() {
            info!(%transport, "Network lost");
            self.shared.publish(ConnectivityEvent::Lost(transport));
        }
    }

    /// Transports currently active, tracked or not.
    pub fn active_transports(&self) -> Vec<Transport> {
        self.shared.active.lock().iter().copied().collect()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().len()
    }
}

impl ConnectivityMonitor for NetworkState {
    fn is_connected(&self) -> bool {
        self.shared.active.lock().iter().any(Transport::is_tracked)
    }

    fn subscribe(&self) -> Subscription {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.subscribers.lock().insert(id, tx);
        debug!(id, "Connectivity subscription registered");

        Subscription {
            id,
            rx,
            registry: Arc::downgrade(&self.shared),
        }
    }
}

/// Registration for connectivity events.
///
/// Events are queued on the subscriber's side and drained with
/// [`recv`](Self::recv) or [`try_recv`](Self::try_recv), so they are always
/// handled on the task that owns the subscription.
///
/// The registration is released when the guard is dropped or consumed by
/// [`unsubscribe`](Self::unsubscribe), whichever comes first, so it is
/// released exactly once on every exit path.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<ConnectivityEvent>,
    registry: Weak<Shared>,
}

impl Subscription {
    /// Registration id, unique per state.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the network state itself has been dropped.
    pub async fn recv(&mut self) -> Option<ConnectivityEvent> {
        self.rx.recv().await
    }

    /// Take the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<ConnectivityEvent> {
        self.rx.try_recv().ok()
    }

    /// Release the registration explicitly.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.registry.upgrade() {
            if shared.remove(self.id) {
                debug!(id = self.id, "Connectivity subscription released");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_disconnected() {
        let state = NetworkState::new();
        assert!(!state.is_connected());
        assert!(state.active_transports().is_empty());
    }

    #[test]
    fn test_ethernet_alone_is_not_connected() {
        let state = NetworkState::connected(Transport::Ethernet);
        assert!(!state.is_connected());

        state.set_available(Transport::Cellular);
        assert!(state.is_connected());
    }

    #[test]
    fn test_connected_while_any_tracked_transport_remains() {
        let state = NetworkState::new();
        state.set_available(Transport::Wifi);
        state.set_available(Transport::Cellular);

        state.set_lost(Transport::Wifi);
        assert!(state.is_connected());

        state.set_lost(Transport::Cellular);
        assert!(!state.is_connected());
    }

    #[tokio::test]
    async fn test_subscriber_receives_transitions() {
        let state = NetworkState::new();
        let mut sub = state.subscribe();

        state.set_available(Transport::Wifi);
        state.set_lost(Transport::Wifi);

        assert_eq!(
            sub.recv().await,
            Some(ConnectivityEvent::Available(Transport::Wifi))
        );
        assert_eq!(
            sub.recv().await,
            Some(ConnectivityEvent::Lost(Transport::Wifi))
        );
        assert_eq!(sub.try_recv(), None);
    }

    #[test]
    fn test_untracked_and_repeated_transitions_are_not_delivered() {
        let state = NetworkState::new();
        let mut sub = state.subscribe();

        state.set_available(Transport::Ethernet);
        state.set_lost(Transport::Ethernet);
        state.set_lost(Transport::Wifi); // never active
        state.set_available(Transport::Cellular);
        state.set_available(Transport::Cellular);

        assert_eq!(
            sub.try_recv(),
            Some(ConnectivityEvent::Available(Transport::Cellular))
        );
        assert_eq!(sub.try_recv(), None);
    }

    #[test]
    fn test_concurrent_transitions_arrive_in_state_order() {
        let state = NetworkState::new();
        let mut sub = state.subscribe();

        let workers: Vec<_> = (0..4)
            .map(|i| {
                let state = state.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        if i % 2 == 0 {
                            state.set_available(Transport::Wifi);
                        } else {
                            state.set_lost(Transport::Wifi);
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let mut last = None;
        while let Some(event) = sub.try_recv() {
            match (last, event) {
                (None, ConnectivityEvent::Available(_))
                | (Some(ConnectivityEvent::Lost(_)), ConnectivityEvent::Available(_))
                | (Some(ConnectivityEvent::Available(_)), ConnectivityEvent::Lost(_)) => {}
                (previous, event) => panic!("{:?} delivered after {:?}", event, previous),
            }
            last = Some(event);
        }
        let ends_connected = matches!(last, Some(ConnectivityEvent::Available(_)));
        assert_eq!(ends_connected, state.is_connected());
    }

    #[test]
    fn test_drop_releases_registration() {
        let state = NetworkState::new();
        let first = state.subscribe();
        let second = state.subscribe();
        assert_eq!(state.subscriber_count(), 2);
        assert_ne!(first.id(), second.id());

        drop(first);
        assert_eq!(state.subscriber_count(), 1);

        second.unsubscribe();
        assert_eq!(state.subscriber_count(), 0);
    }

    #[test]
    fn test_subscription_outliving_state_is_harmless() {
        let state = NetworkState::new();
        let mut sub = state.subscribe();
        drop(state);

        assert_eq!(sub.try_recv(), None);
        sub.unsubscribe();
    }
}
