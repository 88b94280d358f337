//! Wire types for the chat event stream: envelope, event names and payloads.

pub mod constants;
pub mod envelope;
pub mod events;

// Re-export primary types for convenience.
pub use constants::MessageType;
pub use envelope::Frame;
pub use events::{
    ChatMessage, Conversation, ConversationType, InboundEvent, MessageKind, MessageRef,
    OutboundEvent, PresencePayload, ReceiptStatus, ReceiptUpdate, SendMessagePayload,
    StoppedTypingPayload, TypingPayload, TypingTarget, User,
};
