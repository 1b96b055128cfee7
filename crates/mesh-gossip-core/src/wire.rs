//! Postcard wire codec for membership messages
//!
//! Decoding is validating: a payload with an unknown discriminant or a
//! truncated body is a protocol error, surfaced as [`Error::Decode`]
//! and dropped by the dispatcher without side effects.

use crate::error::{Error, Result};
use crate::types::Message;

/// Encode a message for transmission.
pub fn encode(msg: &Message) -> Result<Vec<u8>> {
    postcard::to_allocvec(msg).map_err(Error::Encode)
}

/// Decode an inbound payload.
pub fn decode(payload: &[u8]) -> Result<Message> {
    postcard::from_bytes(payload).map_err(Error::Decode)
}
