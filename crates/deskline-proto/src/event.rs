//! Closed event enums for both wire directions.
//!
//! The envelope is adjacently tagged: `{"event": <snake_case name>, "data":
//! <payload>}`. The payload type is determined entirely by the event name, so
//! new event kinds are a compile-time-checked addition: adding a variant
//! causes compile errors in `event_name()` until it is wired through.

use serde::{Deserialize, Serialize};

use crate::{
    error::ProtocolError,
    model::{Message, Session, SessionId, SessionStatus},
};

/// Events the client emits to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Outbound {
    /// Request the full session roster.
    GetAllSessions,

    /// Request the full message log for a session; doubles as the join.
    #[serde(rename_all = "camelCase")]
    GetMessages {
        /// Session whose log to fetch.
        session_id: SessionId,
    },

    /// Send an operator reply into a session.
    #[serde(rename_all = "camelCase")]
    ReplyMessage {
        /// Target session.
        session_id: SessionId,
        /// Reply body, already trimmed by the dispatcher.
        message: String,
    },
}

/// Roster upsert payload carried by `new_session` pushes.
///
/// A reduced view of [`Session`]: guest-initiated sessions are announced
/// before any correlation token exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    /// Session id the update applies to.
    pub session_id: SessionId,
    /// Customer account id, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<i64>,
    /// Display name of the guest.
    pub guest_name: String,
    /// Lifecycle state at announcement time.
    pub status: SessionStatus,
    /// Creation timestamp.
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<SessionUpdate> for Session {
    fn from(update: SessionUpdate) -> Self {
        Self {
            id: update.session_id,
            guest_name: update.guest_name,
            status: update.status,
            session_key: None,
            customer_id: update.customer_id,
            created_at: update.created_at,
            updated_at: None,
        }
    }
}

/// Events the gateway pushes to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Inbound {
    /// Full roster snapshot; replaces the client's roster wholesale.
    AllSessions(Vec<Session>),

    /// Full log snapshot for one session (all entries share one session id).
    Messages(Vec<Message>),

    /// Live single-message push.
    NewMessage(Message),

    /// Roster upsert push for a guest-initiated session.
    NewSession(SessionUpdate),

    /// Lifecycle transition push.
    #[serde(rename_all = "camelCase")]
    SessionEnded {
        /// Session that ended.
        session_id: SessionId,
        /// Farewell text for in-context display.
        message: String,
    },

    /// Non-fatal protocol error from the gateway.
    SessionError {
        /// Human-readable description.
        message: String,
    },
}

impl Outbound {
    /// Wire event name for this variant.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::GetAllSessions => "get_all_sessions",
            Self::GetMessages { .. } => "get_messages",
            Self::ReplyMessage { .. } => "reply_message",
        }
    }

    /// Encode into a wire envelope.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::Encode`] if serialization fails
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}

impl Inbound {
    /// Wire event name for this variant.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::AllSessions(_) => "all_sessions",
            Self::Messages(_) => "messages",
            Self::NewMessage(_) => "new_message",
            Self::NewSession(_) => "new_session",
            Self::SessionEnded { .. } => "session_ended",
            Self::SessionError { .. } => "session_error",
        }
    }

    /// Decode a wire envelope.
    ///
    /// Unknown event names fail here rather than being dropped, so a protocol
    /// version skew is visible instead of silent.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::Decode`] if the envelope is malformed or the event
    ///   name is not recognized
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use serde_json::json;

    use super::*;
    use crate::model::{DeliveryStatus, Sender};

    fn timestamp() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T09:30:00Z")
            .map(|t| t.with_timezone(&Utc))
            .unwrap()
    }

    #[test]
    fn outbound_envelope_shapes() {
        let value = serde_json::to_value(&Outbound::GetAllSessions).unwrap();
        assert_eq!(value, json!({ "event": "get_all_sessions" }));

        let value = serde_json::to_value(&Outbound::GetMessages { session_id: 3 }).unwrap();
        assert_eq!(value, json!({ "event": "get_messages", "data": { "sessionId": 3 } }));

        let value = serde_json::to_value(&Outbound::ReplyMessage {
            session_id: 3,
            message: "on my way".into(),
        })
        .unwrap();
        assert_eq!(
            value,
            json!({
                "event": "reply_message",
                "data": { "sessionId": 3, "message": "on my way" },
            })
        );
    }

    #[test]
    fn inbound_new_message_decodes() {
        let envelope = json!({
            "event": "new_message",
            "data": {
                "id": 11,
                "sessionId": 3,
                "sender": "customer",
                "body": "hi",
                "status": "delivered",
                "createdAt": "2024-03-01T09:30:00Z",
            },
        })
        .to_string();

        let decoded = Inbound::decode(&envelope).unwrap();
        match decoded {
            Inbound::NewMessage(m) => {
                assert_eq!(m.id, 11);
                assert_eq!(m.session_id, 3);
                assert_eq!(m.sender, Sender::Customer);
                assert_eq!(m.status, DeliveryStatus::Delivered);
            },
            other => unreachable!("expected new_message, got {other:?}"),
        }
    }

    #[test]
    fn inbound_session_ended_round_trips() {
        let event = Inbound::SessionEnded { session_id: 9, message: "Guest left the chat".into() };
        let encoded = serde_json::to_string(&event).unwrap();
        let decoded = Inbound::decode(&encoded).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn inbound_new_session_round_trips() {
        let event = Inbound::NewSession(SessionUpdate {
            session_id: 4,
            customer_id: None,
            guest_name: "Bob".into(),
            status: SessionStatus::Open,
            created_at: timestamp(),
        });
        let encoded = serde_json::to_string(&event).unwrap();
        assert_eq!(event, Inbound::decode(&encoded).unwrap());
    }

    #[test]
    fn unknown_event_name_is_rejected() {
        let envelope = json!({ "event": "made_up_event", "data": {} }).to_string();
        let result = Inbound::decode(&envelope);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn event_names_match_wire_contract() {
        assert_eq!(Outbound::GetAllSessions.event_name(), "get_all_sessions");
        assert_eq!(Outbound::GetMessages { session_id: 1 }.event_name(), "get_messages");
        assert_eq!(
            Outbound::ReplyMessage { session_id: 1, message: String::new() }.event_name(),
            "reply_message"
        );
        assert_eq!(Inbound::AllSessions(vec![]).event_name(), "all_sessions");
        assert_eq!(Inbound::Messages(vec![]).event_name(), "messages");
        assert_eq!(
            Inbound::SessionEnded { session_id: 1, message: String::new() }.event_name(),
            "session_ended"
        );
        assert_eq!(
            Inbound::SessionError { message: String::new() }.event_name(),
            "session_error"
        );
    }

    #[test]
    fn session_update_converts_to_roster_entry() {
        let update = SessionUpdate {
            session_id: 4,
            customer_id: Some(77),
            guest_name: "Bob".into(),
            status: SessionStatus::Open,
            created_at: timestamp(),
        };

        let session: Session = update.into();
        assert_eq!(session.id, 4);
        assert_eq!(session.customer_id, Some(77));
        // Pushes carry no correlation token
        assert_eq!(session.session_key, None);
    }
}
