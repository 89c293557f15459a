//! Client
//!
//! Sans-IO client state machine for the Deskline gateway protocol. Manages the
//! connection lifecycle, the session roster, and the message log of the one
//! currently active session, multiplexed over a single gateway connection.
//!
//! # Architecture
//!
//! The client follows the Sans-IO and Action-Based patterns. It receives
//! events ([`ClientEvent`]: transport lifecycle transitions, decoded wire
//! pushes, operator intents, and time ticks), processes them through pure
//! state machine logic, and returns actions ([`ClientAction`]) for the caller
//! to execute. The UI layer reads the observable snapshot (roster, active
//! buffer, loading flags, error string) and never mutates it directly.
//!
//! No failure crosses the public contract as an `Err` or panic: every failure
//! path resolves into the snapshot's single nullable error string, the way the
//! consuming dashboard expects to branch on it.
//!
//! # Components
//!
//! - [`Client`]: the state machine (roster, active log, dispatch, routing)
//! - [`ClientEvent`]: events fed into the client
//! - [`ClientAction`]: actions produced by the client
//! - [`ClientConfig`]: gateway address, credential, and tunables
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`transport::ConnectedGateway`]: owned handle to a live connection
//! - [`transport::connect`]: dial the gateway (websocket, long-poll fallback)

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod config;
mod event;

#[cfg(feature = "transport")]
pub mod transport;

pub use client::{Client, ConnectionStatus};
pub use config::{
    ClientConfig, TransportKind, DEFAULT_MESSAGE_FETCH_TIMEOUT, DEFAULT_RECONNECT_ATTEMPTS,
    DEFAULT_RECONNECT_DELAY,
};
pub use deskline_proto::{Inbound, Message, MessageId, Outbound, Session, SessionId, SessionStatus};
pub use event::{ClientAction, ClientEvent, Notification};
