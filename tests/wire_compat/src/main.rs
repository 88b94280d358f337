fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use parley_protocol::events::{
        ChatMessage, Conversation, ConversationType, InboundEvent, MessageKind, MessageRef,
        OutboundEvent, PresencePayload, ReceiptStatus, ReceiptUpdate, SendMessagePayload,
        StoppedTypingPayload, TypingPayload, TypingTarget,
    };
    use parley_protocol::{Frame, MessageType};

    const ALICE: &str = "0b9e4c1a-7d2f-4f6a-9c3e-5a8b7d6e4f21";
    const BOB: &str = "8d3a2b1c-4e5f-4a6b-8c7d-9e0f1a2b3c4d";
    const HIKERS: &str = "f1e2d3c4-b5a6-4978-8a9b-0c1d2e3f4a5b";

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn read_fixture(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_str(&read_fixture(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Parses a fixture frame, checks its type, and round-trips the payload
    /// through `T`. The re-serialized payload must equal the server's.
    fn inbound_roundtrip<T>(name: &str, expected: MessageType) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let frame = Frame::parse(&read_fixture(name))
            .unwrap_or_else(|e| panic!("failed to parse frame {name}: {e}"));
        assert_eq!(frame.msg_type(), expected, "type mismatch for {name}");

        let typed: T = frame
            .parse_payload()
            .unwrap_or_else(|e| panic!("failed to decode payload of {name}: {e}"));
        let reserialized = serde_json::to_value(&typed).unwrap();
        assert_eq!(
            frame.payload, reserialized,
            "roundtrip mismatch for {name}:\n  server: {}\n  client: {reserialized}",
            frame.payload
        );

        let event = InboundEvent::decode(&frame)
            .unwrap_or_else(|e| panic!("decode failed for {name}: {e}"))
            .unwrap_or_else(|| panic!("{name} did not decode to an inbound event"));
        assert_eq!(event.msg_type(), expected);
        typed
    }

    /// Serializes an outbound event exactly as the manager puts it on the wire
    /// and compares it with the fixture the server expects.
    fn outbound_matches(name: &str, event: OutboundEvent) {
        let text = event.to_frame().and_then(|f| f.to_json()).unwrap();
        let sent: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(sent, load_fixture(name), "outbound mismatch for {name}");
    }

    // --- Server push events ---

    #[test]
    fn fixture_new_message() {
        let msg: ChatMessage = inbound_roundtrip("inbound/new_message.json", MessageType::NewMessage);
        assert_eq!(msg.msg_type, MessageKind::Dm);
        assert_eq!(msg.sender.as_ref().map(|u| u.username.as_str()), Some("alice"));
        assert_eq!(msg.conversation_key(BOB), (ConversationType::Dm, ALICE));
    }

    #[test]
    fn fixture_message_sent() {
        let msg: ChatMessage =
            inbound_roundtrip("inbound/message_sent.json", MessageType::MessageSent);
        assert!(msg.receiver_id.is_none());
        assert_eq!(msg.msg_type, MessageKind::Group);
        assert_eq!(msg.conversation_key(BOB), (ConversationType::Group, HIKERS));
    }

    #[test]
    fn fixture_user_typing() {
        let p: TypingPayload = inbound_roundtrip("inbound/user_typing.json", MessageType::UserTyping);
        assert_eq!(p.username, "alice");
        assert_eq!(p.conversation_type, ConversationType::Dm);
    }

    #[test]
    fn fixture_user_stopped_typing() {
        let p: StoppedTypingPayload = inbound_roundtrip(
            "inbound/user_stopped_typing.json",
            MessageType::UserStoppedTyping,
        );
        assert_eq!(p.conversation_type, ConversationType::Group);
    }

    #[test]
    fn fixture_receipt_update() {
        let r: ReceiptUpdate =
            inbound_roundtrip("inbound/receipt_update.json", MessageType::ReceiptUpdate);
        assert_eq!(r.status, ReceiptStatus::Delivered);
    }

    #[test]
    fn fixture_presence() {
        let on: PresencePayload = inbound_roundtrip("inbound/user_online.json", MessageType::UserOnline);
        let off: PresencePayload =
            inbound_roundtrip("inbound/user_offline.json", MessageType::UserOffline);
        assert_eq!(on, off);
    }

    #[test]
    fn fixture_conversation_created() {
        let c: Conversation = inbound_roundtrip(
            "inbound/conversation_created.json",
            MessageType::ConversationCreated,
        );
        assert_eq!(c.conversation_type, ConversationType::Group);
        assert_eq!(c.member_count, Some(5));
        assert!(c.is_online.is_none());
    }

    #[test]
    fn every_inbound_type_has_a_fixture() {
        for t in MessageType::ALL.iter().filter(|t| t.is_inbound()) {
            let path = fixtures_dir().join("inbound").join(format!("{t}.json"));
            assert!(path.exists(), "missing fixture for {t}");
        }
    }

    // --- Client events ---

    #[test]
    fn fixture_send_message_dm() {
        outbound_matches(
            "outbound/send_message_dm.json",
            OutboundEvent::SendMessage(SendMessagePayload::new(
                "see you there",
                BOB,
                ConversationType::Dm,
            )),
        );
    }

    #[test]
    fn fixture_send_message_group() {
        outbound_matches(
            "outbound/send_message_group.json",
            OutboundEvent::SendMessage(SendMessagePayload::new(
                "bringing snacks",
                HIKERS,
                ConversationType::Group,
            )),
        );
    }

    #[test]
    fn fixture_typing() {
        outbound_matches(
            "outbound/typing_start.json",
            OutboundEvent::TypingStart(TypingTarget {
                conversation_type: ConversationType::Dm,
                target_id: BOB.into(),
            }),
        );
        outbound_matches(
            "outbound/typing_stop.json",
            OutboundEvent::TypingStop(TypingTarget {
                conversation_type: ConversationType::Group,
                target_id: HIKERS.into(),
            }),
        );
    }

    #[test]
    fn fixture_message_delivered() {
        outbound_matches(
            "outbound/message_delivered.json",
            OutboundEvent::MessageDelivered(MessageRef {
                message_id: "6c1f0a52-93d4-4b7e-8a0e-2f4b1d9c7e11".into(),
            }),
        );
    }

    // --- Tolerance for older or sparser servers ---

    #[test]
    fn legacy_typing_without_username() {
        let json = r#"{"user_id":"u1","conversation_type":"DM","target_id":"u2"}"#;
        let p: TypingPayload = serde_json::from_str(json).unwrap();
        assert!(p.username.is_empty(), "missing username should default to empty");
    }

    #[test]
    fn legacy_message_with_explicit_nulls() {
        let json = r#"{
            "id": "m1",
            "sender_id": "u1",
            "receiver_id": null,
            "group_id": "g1",
            "content": "hi",
            "msg_type": "group",
            "created_at": "2024-03-01T12:00:00.5+02:00"
        }"#;
        let msg: ChatMessage = serde_json::from_str(json).unwrap();
        assert!(msg.receiver_id.is_none());
        assert_eq!(msg.msg_type, MessageKind::Group);
        assert_eq!(msg.created_at.to_rfc3339(), "2024-03-01T10:00:00.500+00:00");
    }

    #[test]
    fn extra_fields_are_ignored() {
        let json = r#"{"type":"user_online","payload":{"user_id":"u1","since":"now"},"seq":9}"#;
        let frame = Frame::parse(json).unwrap();
        let event = InboundEvent::decode(&frame).unwrap().unwrap();
        assert_eq!(
            event,
            InboundEvent::UserOnline(PresencePayload { user_id: "u1".into() })
        );
    }
}
