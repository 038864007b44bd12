//! Connection state tracking.
//!
//! The current state is held in a [`StateCell`] and is only changed by the callback
//! translator in reaction to hardware connection-state callbacks.

use tokio::sync::watch;
use tracing::debug;

/// Raw hardware code for a disconnected link.
pub const STATE_DISCONNECTED: i32 = 0;
/// Raw hardware code for a link being established.
pub const STATE_CONNECTING: i32 = 1;
/// Raw hardware code for an established link.
pub const STATE_CONNECTED: i32 = 2;
/// Raw hardware code for a link being torn down.
pub const STATE_DISCONNECTING: i32 = 3;

/// Connection state of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    /// Not connected to the peer.
    #[default]
    Disconnected,
    /// Currently attempting to connect.
    Connecting,
    /// Connected to the peer.
    Connected,
    /// Currently disconnecting.
    Disconnecting,
}

impl ConnectionState {
    /// Map a raw hardware state code. Unknown codes map to `Disconnected`.
    pub fn from_raw(state: i32) -> Self {
        match state {
            STATE_CONNECTED => Self::Connected,
            STATE_CONNECTING => Self::Connecting,
            STATE_DISCONNECTING => Self::Disconnecting,
            _ => Self::Disconnected,
        }
    }

    /// Raw hardware state code.
    pub fn raw(self) -> i32 {
        match self {
            Self::Disconnected => STATE_DISCONNECTED,
            Self::Connecting => STATE_CONNECTING,
            Self::Connected => STATE_CONNECTED,
            Self::Disconnecting => STATE_DISCONNECTING,
        }
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if in a transitional state.
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting | Self::Disconnecting)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

/// Current-value cell for the connection state.
///
/// Observers receive a [`watch::Receiver`] which always holds the latest state.
#[derive(Debug)]
pub(crate) struct StateCell {
    tx: watch::Sender<ConnectionState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionState::Disconnected);
        Self { tx }
    }

    pub(crate) fn get(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// Update the state, notifying observers only on change. Returns the previous state.
    pub(crate) fn set(&self, new_state: ConnectionState) -> ConnectionState {
        let mut old_state = new_state;
        self.tx.send_if_modified(|state| {
            old_state = *state;
            if *state == new_state {
                return false;
            }
            *state = new_state;
            true
        });

        if old_state != new_state {
            debug!("Connection state changed: {} -> {}", old_state, new_state);
        }

        old_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_connection_state() {
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());

        assert!(ConnectionState::Connecting.is_transitioning());
        assert!(ConnectionState::Disconnecting.is_transitioning());
        assert!(!ConnectionState::Connected.is_transitioning());
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(format!("{}", ConnectionState::Connected), "Connected");
        assert_eq!(format!("{}", ConnectionState::Disconnected), "Disconnected");
    }

    #[test]
    fn test_raw_mapping() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnecting,
        ] {
            assert_eq!(ConnectionState::from_raw(state.raw()), state);
        }
    }

    proptest! {
        #[test]
        fn unknown_raw_codes_map_to_disconnected(code in any::<i32>()) {
            prop_assume!(!(STATE_DISCONNECTED..=STATE_DISCONNECTING).contains(&code));
            prop_assert_eq!(ConnectionState::from_raw(code), ConnectionState::Disconnected);
        }
    }

    #[tokio::test]
    async fn test_state_cell_replays_current_value() {
        let cell = StateCell::new();
        assert_eq!(cell.set(ConnectionState::Connecting), ConnectionState::Disconnected);

        // A late observer sees the current value immediately.
        let rx = cell.subscribe();
        assert_eq!(*rx.borrow(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn test_state_cell_only_notifies_on_change() {
        let cell = StateCell::new();
        let mut rx = cell.subscribe();

        cell.set(ConnectionState::Disconnected);
        assert!(!rx.has_changed().unwrap());

        cell.set(ConnectionState::Connected);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ConnectionState::Connected);
    }
}
