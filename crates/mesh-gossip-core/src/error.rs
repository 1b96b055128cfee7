//! Error types for the membership core

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Membership protocol errors
#[derive(Debug, Error)]
pub enum Error {
    /// Inbound payload could not be decoded (includes unrecognized
    /// message kinds). Rejected by the dispatcher, never fatal.
    #[error("decode error: {0}")]
    Decode(postcard::Error),

    /// Outbound message could not be encoded.
    #[error("encode error: {0}")]
    Encode(postcard::Error),
}
