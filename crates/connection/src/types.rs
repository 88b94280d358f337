//! Public types for the connection manager.

use std::time::Duration;

/// Connection state published by the manager.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Never connected, or stopped by `disconnect`.
    Disconnected,
    /// WebSocket handshake in progress.
    Connecting,
    /// Transport open; outbound frames go straight to the wire.
    Connected,
    /// Connection lost, waiting `delay` before reconnect number `attempt` (1-based).
    Reconnecting { attempt: u32, delay: Duration },
    /// Reconnect budget exhausted. Only a new `connect` call resumes.
    GaveUp,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Events emitted by the connection manager.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Connection state changed.
    StateChanged(ConnectionState),
    /// A reconnect was scheduled.
    Reconnecting { attempt: u32, delay: Duration },
    /// The outbound queue was full and a frame was discarded.
    QueueOverflow { dropped: usize },
    /// Reconnection stopped after `attempts` scheduled attempts.
    GaveUp { attempts: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_state_equality() {
        assert_eq!(ConnectionState::Connected, ConnectionState::Connected);
        assert_ne!(ConnectionState::Connected, ConnectionState::Connecting);
        let a = ConnectionState::Reconnecting {
            attempt: 1,
            delay: Duration::from_secs(1),
        };
        let b = ConnectionState::Reconnecting {
            attempt: 2,
            delay: Duration::from_secs(2),
        };
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn only_connected_is_connected() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::GaveUp.is_connected());
        assert!(!ConnectionState::Disconnected.is_connected());
    }
}
