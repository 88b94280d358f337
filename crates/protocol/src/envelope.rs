use serde::{Deserialize, Serialize};

use crate::constants::MessageType;

/// Envelope for all WebSocket communication, in both directions.
///
/// `event_type` stays a plain string so that frames with types this crate
/// does not know about still parse and can be routed (or ignored) by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Frame {
    /// Creates a frame with the given type and payload.
    pub fn new<T: Serialize>(
        msg_type: MessageType,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_type: msg_type.as_str().to_string(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Parses a text frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serializes the frame for the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Returns the typed event type; unrecognized names yield `Unknown`.
    pub fn msg_type(&self) -> MessageType {
        MessageType::from_name(&self.event_type)
    }

    /// Deserializes the payload into the given type.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MessageRef;

    #[test]
    fn frame_new_with_payload() {
        let payload = MessageRef {
            message_id: "m-1".into(),
        };
        let frame = Frame::new(MessageType::MessageDelivered, &payload).unwrap();
        assert_eq!(frame.event_type, "message_delivered");
        assert_eq!(frame.payload["message_id"], "m-1");
    }

    #[test]
    fn frame_parse_missing_payload_is_null() {
        let frame = Frame::parse(r#"{"type":"user_online"}"#).unwrap();
        assert_eq!(frame.msg_type(), MessageType::UserOnline);
        assert!(frame.payload.is_null());
    }

    #[test]
    fn frame_parse_unknown_type_keeps_name() {
        let frame = Frame::parse(r#"{"type":"server_restarting","payload":{}}"#).unwrap();
        assert_eq!(frame.event_type, "server_restarting");
        assert_eq!(frame.msg_type(), MessageType::Unknown);
    }

    #[test]
    fn frame_parse_rejects_garbage() {
        assert!(Frame::parse("not valid json {{{").is_err());
        assert!(Frame::parse(r#"{"payload":{}}"#).is_err());
    }

    #[test]
    fn frame_parse_payload() {
        let frame =
            Frame::parse(r#"{"type":"message_delivered","payload":{"message_id":"abc"}}"#)
                .unwrap();
        let parsed: MessageRef = frame.parse_payload().unwrap();
        assert_eq!(parsed.message_id, "abc");
    }

    #[test]
    fn frame_wire_shape() {
        let frame = Frame::new(MessageType::TypingStop, &serde_json::json!({"a": 1})).unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({"type": "typing_stop", "payload": {"a": 1}}));
    }
}
