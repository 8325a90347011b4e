//! # Transaction Envelopes
//!
//! Every entry in a block is an `Envelope`: a channel header naming the
//! channel and the kind of payload, followed by the encoded payload itself.
//! Configuration envelopes carry a bincode-encoded [`ConfigEnvelope`].

use serde::{Deserialize, Serialize};

use crate::config::ChannelConfig;
use crate::errors::CodecError;

/// Kind of payload an envelope carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeaderType {
    /// Full channel configuration.
    Config,
    /// Signed configuration update submitted by a client.
    ConfigUpdate,
    /// Chaincode invocation endorsed by peers.
    EndorserTransaction,
    /// Opaque message (unused by the peer).
    Message,
}

/// Channel header common to all envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelHeader {
    pub channel_id: String,
    pub tx_id: String,
    pub header_type: HeaderType,
    /// Target chaincode for endorser transactions.
    pub chaincode: Option<String>,
}

/// A header plus its encoded payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub header: ChannelHeader,
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Wrap a channel configuration into a `Config` envelope.
    pub fn config(channel_id: &str, config: ChannelConfig) -> Result<Self, CodecError> {
        let payload = crate::encode(&ConfigEnvelope { config })?;
        Ok(Self {
            header: ChannelHeader {
                channel_id: channel_id.to_string(),
                tx_id: String::new(),
                header_type: HeaderType::Config,
                chaincode: None,
            },
            payload,
        })
    }

    /// Build an endorser transaction invoking `chaincode`.
    pub fn endorser_transaction(
        channel_id: &str,
        tx_id: &str,
        chaincode: &str,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            header: ChannelHeader {
                channel_id: channel_id.to_string(),
                tx_id: tx_id.to_string(),
                header_type: HeaderType::EndorserTransaction,
                chaincode: Some(chaincode.to_string()),
            },
            payload,
        }
    }

    /// Decode the payload of a `Config` envelope.
    pub fn config_envelope(&self) -> Result<ConfigEnvelope, CodecError> {
        if self.header.header_type != HeaderType::Config {
            return Err(CodecError::UnexpectedHeaderType {
                expected: HeaderType::Config,
                actual: self.header.header_type,
            });
        }
        crate::decode(&self.payload)
    }
}

/// Payload of a `Config` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEnvelope {
    pub config: ChannelConfig,
}
