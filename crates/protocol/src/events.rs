//! Typed payloads for the chat event schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::MessageType;
use crate::envelope::Frame;

/// Kind of conversation a message or typing indicator targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversationType {
    #[serde(rename = "DM")]
    Dm,
    #[serde(rename = "GROUP")]
    Group,
}

impl ConversationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationType::Dm => "DM",
            ConversationType::Group => "GROUP",
        }
    }
}

impl std::fmt::Display for ConversationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage kind of a chat message.
///
/// The server writes `DM` or `GROUP`. Lowercase `private`/`group` from older
/// payloads are accepted too. Anything else, including the store's `TEXT`
/// default, decodes as [`MessageKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    #[serde(rename = "DM", alias = "private")]
    Dm,
    #[serde(rename = "GROUP", alias = "group")]
    Group,
    #[serde(rename = "TEXT", other)]
    Other,
}

/// Delivery status carried by receipt updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReceiptStatus {
    Sent,
    Delivered,
    Read,
}

/// A user as embedded in server payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A chat message (`new_message` / `message_sent` payload).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub content: String,
    pub msg_type: MessageKind,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<User>,
}

impl ChatMessage {
    /// Returns the conversation this message belongs to, seen from `me`.
    ///
    /// Group messages are keyed by group; direct messages by the other party.
    pub fn conversation_key(&self, me: &str) -> (ConversationType, &str) {
        if let Some(group) = self.group_id.as_deref() {
            return (ConversationType::Group, group);
        }
        let other = if self.sender_id == me {
            self.receiver_id.as_deref().unwrap_or(&self.sender_id)
        } else {
            &self.sender_id
        };
        (ConversationType::Dm, other)
    }
}

/// `user_typing` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingPayload {
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    pub conversation_type: ConversationType,
    pub target_id: String,
}

/// `user_stopped_typing` payload (no username on the wire).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoppedTypingPayload {
    pub user_id: String,
    pub conversation_type: ConversationType,
    pub target_id: String,
}

/// `receipt_update` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptUpdate {
    pub message_id: String,
    pub user_id: String,
    pub status: ReceiptStatus,
    pub updated_at: DateTime<Utc>,
}

/// `user_online` / `user_offline` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresencePayload {
    pub user_id: String,
}

/// `conversation_created` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(rename = "type")]
    pub conversation_type: ConversationType,
    pub target_id: String,
    #[serde(default)]
    pub target_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_avatar: Option<String>,
    #[serde(default)]
    pub last_message: Option<String>,
    pub last_message_at: DateTime<Utc>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_online: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_count: Option<u32>,
}

/// `send_message` payload. Exactly one of `to_user_id` / `group_id` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessagePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub content: String,
}

impl SendMessagePayload {
    pub fn new(
        content: impl Into<String>,
        target_id: impl Into<String>,
        conversation_type: ConversationType,
    ) -> Self {
        let target_id = target_id.into();
        let (to_user_id, group_id) = match conversation_type {
            ConversationType::Dm => (Some(target_id), None),
            ConversationType::Group => (None, Some(target_id)),
        };
        Self {
            to_user_id,
            group_id,
            content: content.into(),
        }
    }
}

/// `typing_start` / `typing_stop` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingTarget {
    pub conversation_type: ConversationType,
    pub target_id: String,
}

/// Payload referencing a single message by ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRef {
    pub message_id: String,
}

/// Events a client sends to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    SendMessage(SendMessagePayload),
    TypingStart(TypingTarget),
    TypingStop(TypingTarget),
    MessageDelivered(MessageRef),
}

impl OutboundEvent {
    pub fn msg_type(&self) -> MessageType {
        match self {
            OutboundEvent::SendMessage(_) => MessageType::SendMessage,
            OutboundEvent::TypingStart(_) => MessageType::TypingStart,
            OutboundEvent::TypingStop(_) => MessageType::TypingStop,
            OutboundEvent::MessageDelivered(_) => MessageType::MessageDelivered,
        }
    }

    /// Wraps the event in its wire envelope.
    pub fn to_frame(&self) -> Result<Frame, serde_json::Error> {
        let msg_type = self.msg_type();
        match self {
            OutboundEvent::SendMessage(p) => Frame::new(msg_type, p),
            OutboundEvent::TypingStart(p) | OutboundEvent::TypingStop(p) => {
                Frame::new(msg_type, p)
            }
            OutboundEvent::MessageDelivered(p) => Frame::new(msg_type, p),
        }
    }
}

/// Events the server pushes to a client.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    NewMessage(ChatMessage),
    MessageSent(ChatMessage),
    UserTyping(TypingPayload),
    UserStoppedTyping(StoppedTypingPayload),
    ReceiptUpdate(ReceiptUpdate),
    UserOnline(PresencePayload),
    UserOffline(PresencePayload),
    ConversationCreated(Conversation),
}

impl InboundEvent {
    /// Decodes a frame into a typed event.
    ///
    /// Returns `Ok(None)` for frames whose type is not a server push event.
    pub fn decode(frame: &Frame) -> Result<Option<Self>, serde_json::Error> {
        let event = match frame.msg_type() {
            MessageType::NewMessage => InboundEvent::NewMessage(frame.parse_payload()?),
            MessageType::MessageSent => InboundEvent::MessageSent(frame.parse_payload()?),
            MessageType::UserTyping => InboundEvent::UserTyping(frame.parse_payload()?),
            MessageType::UserStoppedTyping => {
                InboundEvent::UserStoppedTyping(frame.parse_payload()?)
            }
            MessageType::ReceiptUpdate => InboundEvent::ReceiptUpdate(frame.parse_payload()?),
            MessageType::UserOnline => InboundEvent::UserOnline(frame.parse_payload()?),
            MessageType::UserOffline => InboundEvent::UserOffline(frame.parse_payload()?),
            MessageType::ConversationCreated => {
                InboundEvent::ConversationCreated(frame.parse_payload()?)
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    pub fn msg_type(&self) -> MessageType {
        match self {
            InboundEvent::NewMessage(_) => MessageType::NewMessage,
            InboundEvent::MessageSent(_) => MessageType::MessageSent,
            InboundEvent::UserTyping(_) => MessageType::UserTyping,
            InboundEvent::UserStoppedTyping(_) => MessageType::UserStoppedTyping,
            InboundEvent::ReceiptUpdate(_) => MessageType::ReceiptUpdate,
            InboundEvent::UserOnline(_) => MessageType::UserOnline,
            InboundEvent::UserOffline(_) => MessageType::UserOffline,
            InboundEvent::ConversationCreated(_) => MessageType::ConversationCreated,
        }
    }
}
