//! Data model shared by both directions of the wire.
//!
//! These are the shapes the gateway serializes; field names on the wire are
//! `camelCase`. A `Session` is one guest-to-support conversation thread, a
//! `Message` one utterance within it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable server-assigned session identifier.
pub type SessionId = i64;

/// Message identifier, unique within a session (assumed globally unique).
///
/// Server-assigned ids are positive; locally synthesized notices use negative
/// ids so the two ranges can never collide.
pub type MessageId = i64;

/// Session lifecycle state.
///
/// Exactly one state at a time. Once `Closed`, a session accepts no further
/// outbound sends (enforced by the client's outbound dispatch) but stays
/// visible in the roster as history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    /// Conversation is live.
    Open,
    /// Conversation has ended.
    Closed,
}

/// One guest-to-support conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Stable server-assigned id, unique.
    pub id: SessionId,
    /// Display name of the guest.
    pub guest_name: String,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// Opaque correlation token. Absent on `new_session` pushes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    /// Numeric id of the customer account, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<i64>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp, when the server provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The guest on the other end of the session.
    Customer,
    /// A support-desk operator.
    Admin,
    /// Locally synthesized notice; never originates from the wire.
    System,
}

/// Delivery state of a message. Cosmetic, display-only for admin-authored
/// messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Accepted by the gateway.
    #[default]
    Sent,
    /// Delivered to the counterparty.
    Delivered,
    /// Read by the counterparty.
    Read,
}

/// One chat utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique id within the owning session.
    pub id: MessageId,
    /// Owning session.
    pub session_id: SessionId,
    /// Sender category.
    pub sender: Sender,
    /// Numeric id of the sender, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<i64>,
    /// Body text.
    pub body: String,
    /// Delivery state.
    #[serde(default)]
    pub status: DeliveryStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
