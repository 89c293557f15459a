//! Client configuration.

use std::time::Duration;

/// Reconnect attempts after a connection loss before giving up.
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;

/// Fixed delay between reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Soft timeout for an in-flight message-log fetch. Expiry clears the loading
/// flag only; it does not retry or surface an error.
pub const DEFAULT_MESSAGE_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Transport flavors the gateway can be reached over, in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Persistent bidirectional websocket connection.
    WebSocket,
    /// HTTP long-poll fallback for environments where websockets are blocked.
    LongPoll,
}

/// Configuration shared by the state machine and the transport.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Gateway base address, `http(s)://host[:port][/path]`.
    pub gateway_url: String,
    /// Opaque bearer credential, carried as a query parameter at connect time.
    /// An empty credential makes the feature unusable (fail fast, no dial).
    pub credential: String,
    /// Reconnect attempts before giving up.
    pub reconnect_attempts: u32,
    /// Fixed delay between reconnect attempts (not exponential).
    pub reconnect_delay: Duration,
    /// Soft timeout for message-log fetches.
    pub message_fetch_timeout: Duration,
    /// Transports to try, in order.
    pub transports: Vec<TransportKind>,
}

impl ClientConfig {
    /// Create a configuration with the documented defaults.
    pub fn new(gateway_url: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            credential: credential.into(),
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            message_fetch_timeout: DEFAULT_MESSAGE_FETCH_TIMEOUT,
            transports: vec![TransportKind::WebSocket, TransportKind::LongPoll],
        }
    }

    /// Whether a usable credential is present.
    #[must_use]
    pub fn has_credential(&self) -> bool {
        !self.credential.trim().is_empty()
    }
}
