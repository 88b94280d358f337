//! Chat lines shown at the prompt.
//!
//! The server echoes our own messages back as `message_sent` and may push the
//! same message again after a reconnect, so lines are deduplicated by id.

use std::collections::{HashSet, VecDeque};

use parley_protocol::events::{ChatMessage, ConversationType};

/// How many message ids are remembered for deduplication.
const REMEMBERED_IDS: usize = 1024;

#[derive(Debug, Default)]
pub struct Transcript {
    me: Option<String>,
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl Transcript {
    /// `me` is the local user id, if known up front.
    pub fn new(me: Option<String>) -> Self {
        Self {
            me,
            ..Self::default()
        }
    }

    /// Records a message and returns the line to print, or `None` if a
    /// message with this id was already shown.
    ///
    /// `own` marks a `message_sent` echo; its sender is the local user.
    pub fn record(&mut self, msg: &ChatMessage, own: bool) -> Option<String> {
        if own && self.me.is_none() {
            self.me = Some(msg.sender_id.clone());
        }
        if !self.seen.insert(msg.id.clone()) {
            return None;
        }
        self.order.push_back(msg.id.clone());
        if self.order.len() > REMEMBERED_IDS {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }

        let me = self.me.as_deref().unwrap_or_default();
        Some(format_message(msg, msg.conversation_key(me)))
    }
}

pub fn format_message(msg: &ChatMessage, (kind, id): (ConversationType, &str)) -> String {
    let sender = msg
        .sender
        .as_ref()
        .map_or(msg.sender_id.as_str(), |u| u.username.as_str());
    let time = msg.created_at.with_timezone(&chrono::Local).format("%H:%M:%S");
    let conversation = match kind {
        ConversationType::Group => format!("#{id}"),
        ConversationType::Dm => format!("@{id}"),
    };
    format!("[{time}] {conversation} <{sender}> {}", msg.content)
}
