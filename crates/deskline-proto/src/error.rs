//! Protocol error types.

use thiserror::Error;

/// Errors raised while encoding or decoding wire envelopes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// JSON serialization failed.
    #[error("encode failed: {0}")]
    Encode(String),

    /// JSON deserialization failed, including unknown event names.
    #[error("decode failed: {0}")]
    Decode(String),
}
