//! Wire protocol for the Deskline chat gateway.
//!
//! The gateway speaks a JSON event protocol over a persistent bidirectional
//! transport. Every frame is an envelope `{"event": <name>, "data": <payload>}`
//! with `camelCase` payload fields. This crate defines the closed set of event
//! kinds ([`Inbound`], [`Outbound`]) and the data model they carry
//! ([`Session`], [`Message`]).
//!
//! # Invariants
//!
//! Each event variant maps to exactly one wire event name (enforced by match
//! exhaustiveness in `event_name()`). Unknown event names are a decode error,
//! never silently ignored. Round-trip encoding must produce identical values.
//!
//! Authentication is not an event: the bearer credential rides as a query
//! parameter on connection establishment and is a transport concern.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod event;
mod model;

pub use error::ProtocolError;
pub use event::{Inbound, Outbound, SessionUpdate};
pub use model::{
    DeliveryStatus, Message, MessageId, Sender, Session, SessionId, SessionStatus,
};
