//! Connection state tracking.

use tokio::sync::watch;
use tracing::debug;

/// Lifecycle phase of the gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection attempt has been made yet.
    #[default]
    Idle,
    /// The websocket handshake or authentication is in flight.
    Connecting,
    /// Authenticated and receiving events.
    Connected,
    /// A previously established connection ended.
    Disconnected,
}

impl ConnectionState {
    /// Whether the connection is established and authenticated.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether a connection attempt is in flight or established.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        };
        f.write_str(label)
    }
}

/// Broadcasts connection state transitions to any number of observers.
///
/// Clones share the same underlying channel.
#[derive(Debug, Clone)]
pub struct ConnectionSignal {
    tx: watch::Sender<ConnectionState>,
}

impl ConnectionSignal {
    /// Creates a signal starting in [`ConnectionState::Idle`].
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::default());
        Self { tx }
    }

    /// Publishes a state transition. Setting the current state again is a
    /// no-op and does not wake observers.
    pub fn set(&self, state: ConnectionState) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            debug!(%state, "gateway state transition");
        }
    }

    /// Current state.
    #[must_use]
    pub fn current(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    /// A receiver that observes every subsequent transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }
}

impl Default for ConnectionSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_are_observed() {
        let signal = ConnectionSignal::new();
        let rx = signal.subscribe();
        assert_eq!(*rx.borrow(), ConnectionState::Idle);

        signal.set(ConnectionState::Connecting);
        signal.set(ConnectionState::Connected);
        assert_eq!(signal.current(), ConnectionState::Connected);
        assert!(signal.current().is_connected());
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn only_connecting_and_connected_are_active() {
        assert!(ConnectionState::Connecting.is_active());
        assert!(ConnectionState::Connected.is_active());
        assert!(!ConnectionState::Idle.is_active());
        assert!(!ConnectionState::Disconnected.is_active());
    }
}
