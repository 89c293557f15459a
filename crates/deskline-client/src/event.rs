//! Client events and actions.

use deskline_proto::{Inbound, Outbound, SessionId};

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Forwarding decoded wire pushes and transport lifecycle transitions
/// - Driving time forward via ticks
/// - Forwarding operator intents (fetch roster, join session, send message)
///
/// Generic over `I` (Instant type) to support both production
/// (`std::time::Instant`) and deterministic test clocks.
#[derive(Debug, Clone)]
pub enum ClientEvent<I = std::time::Instant> {
    /// Initial connection established and authenticated.
    Connected,

    /// Connection re-established after a loss.
    Reconnected,

    /// Connection lost.
    Disconnected {
        /// True when the gateway closed the connection, in which case the
        /// client asks the transport to redial immediately rather than
        /// waiting out its retry delay.
        server_initiated: bool,
    },

    /// Initial connection attempt failed.
    ConnectFailed {
        /// Human-readable failure description.
        reason: String,
    },

    /// A reconnect attempt failed.
    ReconnectFailed {
        /// Human-readable failure description.
        reason: String,
        /// True when this was the final attempt and the transport gave up.
        attempts_exhausted: bool,
    },

    /// Decoded push from the gateway.
    Wire(Inbound),

    /// Operator wants the roster refreshed.
    FetchSessions,

    /// Operator selected a session; switches the active log.
    JoinSession {
        /// Session to activate.
        session_id: SessionId,
    },

    /// Operator wants to send a reply.
    SendMessage {
        /// Target session.
        session_id: SessionId,
        /// Raw input text; the dispatcher trims and validates it.
        text: String,
    },

    /// Time tick for soft-timeout processing.
    ///
    /// The caller should send ticks periodically so stuck log fetches can
    /// release their loading flag.
    Tick {
        /// Current time from the caller's clock.
        now: I,
    },
}

/// Passive alert for a message belonging to a non-active session.
///
/// Raised instead of touching the visible log, so the operator can be
/// notified without the active conversation being disrupted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Session the message belongs to.
    pub session_id: SessionId,
    /// Guest display name, looked up from the roster snapshot.
    pub guest_name: String,
    /// Message body text.
    pub body: String,
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Emit this event on the wire.
    Send(Outbound),

    /// Raise a passive notification.
    Notify(Notification),

    /// Redial now, skipping the transport's current retry delay.
    Reconnect,
}
