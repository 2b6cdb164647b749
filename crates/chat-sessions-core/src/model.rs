//! Conversation data model and checkpoint wire types.
//!
//! Field order on the serde structs is deliberate: it pins the key order of
//! the pretty-printed checkpoint so that `save(load())` is byte-for-byte
//! stable.

use serde::{Deserialize, Serialize};

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Text entered by the person driving the UI.
    User,
    /// A reply produced by the response generator.
    Assistant,
    /// Seed instructions copied from an app descriptor.
    System,
}

/// One turn in a session.
///
/// `id` has the form `<sessionId>-<sequence>` with a zero-based, strictly
/// increasing suffix. Content is immutable once committed; the assistant
/// message under active streaming is accumulated outside the session and only
/// committed here when the stream ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Display-only, minute granularity. Uniqueness lives in `id`.
    pub timestamp: String,
    pub id: String,
}

impl Message {
    /// Create a message.
    #[must_use]
    pub fn new(
        role: Role,
        content: impl Into<String>,
        timestamp: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: timestamp.into(),
            id: id.into(),
        }
    }
}

/// One persisted conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Caller-chosen, unique, immutable.
    pub id: String,
    /// Reference to an external app descriptor; not owned by the engine.
    #[serde(rename = "app")]
    pub app_id: String,
    pub scroll_pos: u32,
    pub messages: Vec<Message>,
}

impl Session {
    /// Create an empty session bound to an app descriptor.
    #[must_use]
    pub fn new(id: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            app_id: app_id.into(),
            scroll_pos: 0,
            messages: Vec::new(),
        }
    }

    /// The most recently appended message, if any.
    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// The on-disk serialized document representing all sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub last_session: Option<String>,
    pub sidebar_scrollpos: u32,
    pub sessions: Vec<Session>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
    }

    #[test]
    fn session_app_field_renamed_on_wire() {
        let session = Session::new("notes", "scratchpad");
        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"app\":\"scratchpad\""));
        assert!(!json.contains("app_id"));
    }

    #[test]
    fn checkpoint_pretty_print_is_stable() {
        let mut session = Session::new("notes", "scratchpad");
        session.messages.push(Message::new(
            Role::System,
            "You are a helpful assistant.",
            "24.03.01 09:15",
            "notes-0",
        ));
        let checkpoint = Checkpoint {
            last_session: Some("notes".to_owned()),
            sidebar_scrollpos: 3,
            sessions: vec![session],
        };

        let first = serde_json::to_string_pretty(&checkpoint).unwrap();
        let reparsed: Checkpoint = serde_json::from_str(&first).unwrap();
        let second = serde_json::to_string_pretty(&reparsed).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn message_key_order_matches_wire_schema() {
        let message = Message::new(Role::User, "hi", "24.03.01 09:15", "notes-1");
        let json = serde_json::to_string(&message).unwrap();
        let role = json.find("\"role\"").unwrap();
        let content = json.find("\"content\"").unwrap();
        let timestamp = json.find("\"timestamp\"").unwrap();
        let id = json.find("\"id\"").unwrap();
        assert!(role < content && content < timestamp && timestamp < id);
    }
}
