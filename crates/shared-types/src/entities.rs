//! # Core Ledger Entities
//!
//! Blocks as the peer sees them: a header chaining to the previous block, the
//! ordered envelopes, and the metadata the orderer stamps on every block.
//!
//! ## Clusters
//!
//! - **Chain**: `Block`, `BlockHeader`, `BlockData`, `BlockMetadata`
//! - **Ledger info**: `BlockchainInfo`, `ChannelInfo`

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::envelope::{Envelope, HeaderType};
use crate::errors::CodecError;

/// A 32-byte SHA-256 hash.
pub type Hash = [u8; 32];

/// Block header linking a block to its predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockHeader {
    /// Block number (genesis is 0).
    pub number: u64,
    /// Hash of the previous block header.
    pub previous_hash: Hash,
    /// SHA-256 over the encoded envelopes.
    pub data_hash: Hash,
}

impl BlockHeader {
    /// Hash of this header, used as `previous_hash` by the next block.
    pub fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.number.to_be_bytes());
        hasher.update(self.previous_hash);
        hasher.update(self.data_hash);
        hasher.finalize().into()
    }
}

/// The ordered envelopes carried by a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockData {
    pub envelopes: Vec<Envelope>,
}

impl BlockData {
    /// SHA-256 over the bincode encoding of every envelope, in order.
    pub fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        for envelope in &self.envelopes {
            // Envelopes are plain data; encoding cannot fail.
            if let Ok(bytes) = crate::encode(envelope) {
                hasher.update(bytes);
            }
        }
        hasher.finalize().into()
    }
}

/// Orderer-assigned block metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockMetadata {
    /// Index of the most recent configuration block at the time this block
    /// was cut. `None` on blocks written by orderers that never stamped it.
    pub last_config_index: Option<u64>,
}

/// A block of ordered envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Block {
    pub header: BlockHeader,
    pub data: BlockData,
    pub metadata: BlockMetadata,
}

impl Block {
    /// Build a block, computing its data hash.
    pub fn new(number: u64, previous_hash: Hash, envelopes: Vec<Envelope>) -> Self {
        let data = BlockData { envelopes };
        Self {
            header: BlockHeader {
                number,
                previous_hash,
                data_hash: data.hash(),
            },
            data,
            metadata: BlockMetadata::default(),
        }
    }

    /// Stamp the last-config pointer.
    pub fn with_last_config_index(mut self, index: u64) -> Self {
        self.metadata.last_config_index = Some(index);
        self
    }

    /// Block number.
    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// Return the envelope at `index`.
    pub fn extract_envelope(&self, index: usize) -> Result<&Envelope, CodecError> {
        self.data
            .envelopes
            .get(index)
            .ok_or(CodecError::EnvelopeIndexOutOfRange {
                index,
                len: self.data.envelopes.len(),
            })
    }

    /// Channel identifier, read from the first envelope's channel header.
    pub fn channel_id(&self) -> Result<&str, CodecError> {
        let envelope = self.extract_envelope(0)?;
        if envelope.header.channel_id.is_empty() {
            return Err(CodecError::MissingChannelId);
        }
        Ok(&envelope.header.channel_id)
    }

    /// A config block carries exactly one `Config` envelope.
    pub fn is_config_block(&self) -> bool {
        self.data.envelopes.len() == 1 && self.data.envelopes[0].header.header_type == HeaderType::Config
    }

    /// The last-config pointer, or an error if the orderer never stamped it.
    pub fn last_config_index(&self) -> Result<u64, CodecError> {
        self.metadata
            .last_config_index
            .ok_or(CodecError::MissingLastConfig(self.header.number))
    }
}

/// Ledger height and tip hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockchainInfo {
    /// Number of blocks committed; the last block is `height - 1`.
    pub height: u64,
    pub current_block_hash: Hash,
    pub previous_block_hash: Hash,
}

/// Channel membership entry reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub channel_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::ChannelHeader;

    fn envelope(channel: &str, header_type: HeaderType) -> Envelope {
        Envelope {
            header: ChannelHeader {
                channel_id: channel.to_string(),
                tx_id: "tx-0".to_string(),
                header_type,
                chaincode: None,
            },
            payload: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_channel_id_from_first_envelope() {
        let block = Block::new(0, [0; 32], vec![envelope("mychannel", HeaderType::Config)]);
        assert_eq!(block.channel_id().unwrap(), "mychannel");
        assert!(block.is_config_block());
    }

    #[test]
    fn test_channel_id_of_empty_block() {
        let block = Block::new(0, [0; 32], vec![]);
        assert!(matches!(
            block.channel_id(),
            Err(CodecError::EnvelopeIndexOutOfRange { index: 0, len: 0 })
        ));
    }

    #[test]
    fn test_data_hash_depends_on_envelopes() {
        let a = Block::new(1, [0; 32], vec![envelope("c", HeaderType::EndorserTransaction)]);
        let b = Block::new(1, [0; 32], vec![envelope("d", HeaderType::EndorserTransaction)]);
        assert_ne!(a.header.data_hash, b.header.data_hash);
        assert_ne!(a.header.hash(), b.header.hash());
    }

    #[test]
    fn test_last_config_index_missing() {
        let block = Block::new(7, [0; 32], vec![]);
        assert!(matches!(block.last_config_index(), Err(CodecError::MissingLastConfig(7))));
        assert_eq!(block.with_last_config_index(3).last_config_index().unwrap(), 3);
    }
}
