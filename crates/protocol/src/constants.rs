use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Server path of the real-time endpoint.
pub const WS_PATH: &str = "/ws";

/// Query parameter carrying the bearer credential.
pub const WS_TOKEN_PARAM: &str = "token";

/// Base endpoint used when nothing is configured.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

/// How often to send pings while a connection is open.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(25);

/// Read deadline: if nothing arrives within this window (no pong, no push
/// event) the connection is considered dead.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(60);

/// Maximum inbound message size in bytes (1 MiB).
pub const WS_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Delay before the first reconnection attempt.
pub const RECONNECT_INITIAL_DELAY: Duration = Duration::from_millis(1000);

/// Upper bound for the reconnection delay.
pub const RECONNECT_MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Number of reconnects scheduled before giving up.
pub const RECONNECT_MAX_ATTEMPTS: u32 = 10;

/// Outbound frames held while disconnected.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 1024;

/// WebSocket event type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    // Client to server
    SendMessage,
    TypingStart,
    TypingStop,
    MessageDelivered,

    // Server to client
    NewMessage,
    MessageSent,
    UserTyping,
    UserStoppedTyping,
    ReceiptUpdate,
    UserOnline,
    UserOffline,
    ConversationCreated,

    /// Forward compatibility: unknown event types deserialize here.
    #[serde(other)]
    Unknown,
}

impl MessageType {
    /// Every named type, in declaration order.
    pub const ALL: [MessageType; 12] = [
        MessageType::SendMessage,
        MessageType::TypingStart,
        MessageType::TypingStop,
        MessageType::MessageDelivered,
        MessageType::NewMessage,
        MessageType::MessageSent,
        MessageType::UserTyping,
        MessageType::UserStoppedTyping,
        MessageType::ReceiptUpdate,
        MessageType::UserOnline,
        MessageType::UserOffline,
        MessageType::ConversationCreated,
    ];

    /// Returns the wire name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::SendMessage => "send_message",
            MessageType::TypingStart => "typing_start",
            MessageType::TypingStop => "typing_stop",
            MessageType::MessageDelivered => "message_delivered",
            MessageType::NewMessage => "new_message",
            MessageType::MessageSent => "message_sent",
            MessageType::UserTyping => "user_typing",
            MessageType::UserStoppedTyping => "user_stopped_typing",
            MessageType::ReceiptUpdate => "receipt_update",
            MessageType::UserOnline => "user_online",
            MessageType::UserOffline => "user_offline",
            MessageType::ConversationCreated => "conversation_created",
            MessageType::Unknown => "unknown",
        }
    }

    /// Looks up a type by wire name. Unrecognized names map to `Unknown`.
    pub fn from_name(name: &str) -> MessageType {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == name)
            .unwrap_or(MessageType::Unknown)
    }

    /// Returns `true` for types the server pushes to clients.
    pub fn is_inbound(&self) -> bool {
        matches!(
            self,
            MessageType::NewMessage
                | MessageType::MessageSent
                | MessageType::UserTyping
                | MessageType::UserStoppedTyping
                | MessageType::ReceiptUpdate
                | MessageType::UserOnline
                | MessageType::UserOffline
                | MessageType::ConversationCreated
        )
    }
}

impl AsRef<str> for MessageType {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
