//! # Error Types
//!
//! Errors raised while reading blocks, envelopes and configuration payloads.

use thiserror::Error;

use crate::envelope::HeaderType;

/// Errors raised by the block and envelope codec.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// Block has fewer envelopes than requested.
    #[error("envelope index {index} out of range (block has {len} envelopes)")]
    EnvelopeIndexOutOfRange { index: usize, len: usize },

    /// First envelope has an empty channel id.
    #[error("block does not carry a channel id")]
    MissingChannelId,

    /// Envelope was not of the expected kind.
    #[error("unexpected header type: expected {expected:?}, got {actual:?}")]
    UnexpectedHeaderType {
        expected: HeaderType,
        actual: HeaderType,
    },

    /// Block metadata lacks the last-config pointer.
    #[error("block {0} has no last config index in its metadata")]
    MissingLastConfig(u64),

    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(String),

    /// Deserialization failed.
    #[error("decode failed: {0}")]
    Decode(String),
}
