//! # Domain Errors
//!
//! Error types for the channel core and for the collaborators it talks to.
//!
//! Construction-path errors carry the channel id and the step that failed.
//! Lookups by unknown channel id never produce an error; they return `None`.

use shared_types::CodecError;
use thiserror::Error;

/// Errors reported by the ledger collaborator.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// A ledger for this channel already exists.
    #[error("ledger {0} already exists")]
    AlreadyExists(String),

    /// No ledger exists for this channel.
    #[error("ledger {0} does not exist")]
    NotFound(String),

    /// Requested block is beyond the ledger height.
    #[error("block {0} not found")]
    BlockNotFound(u64),

    /// Underlying storage failure.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors reported by the transient store collaborator.
#[derive(Debug, Clone, Error)]
#[error("transient store error: {0}")]
pub struct StoreError(pub String);

/// Errors reported by the transport layer.
#[derive(Debug, Clone, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// Errors reported by lifecycle (chaincode definition) lookups.
#[derive(Debug, Clone, Error)]
pub enum LifecycleError {
    /// The lookup itself failed; the block cannot be validated.
    #[error("unexpected lifecycle error: {0}")]
    Unexpected(String),

    /// The chaincode definition makes the transaction invalid.
    #[error("invalid chaincode definition: {0}")]
    Invalid(String),
}

/// Errors reported by validation plugins.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    /// The transaction does not satisfy the plugin's rules.
    #[error("transaction rejected: {0}")]
    Invalid(String),

    /// The plugin could not run; the whole block must be retried.
    #[error("plugin execution failed: {0}")]
    Execution(String),
}

/// Errors raised by identity deserialization.
#[derive(Debug, Clone, Error)]
pub enum MspError {
    #[error("cannot decode serialized identity: {0}")]
    Decode(String),

    #[error("MSP {0} is not defined on this channel")]
    UnknownMsp(String),
}

/// Channel core errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Block or envelope could not be read.
    #[error("invalid block: {0}")]
    InvalidBlock(#[from] CodecError),

    /// Ledger creation from a genesis block failed.
    #[error("cannot create ledger from genesis block: {0}")]
    LedgerCreation(LedgerError),

    /// Ledger read failed while working on a channel.
    #[error("[channel {channel}] ledger error: {source}")]
    Ledger {
        channel: String,
        #[source]
        source: LedgerError,
    },

    /// The persisted ledgers could not be enumerated at startup.
    #[error("error in initializing ledger manager: {0}")]
    LedgerEnumeration(LedgerError),

    /// Configuration payload could not be decoded.
    #[error("[channel {channel}] cannot read channel configuration: {source}")]
    ConfigDecode {
        channel: String,
        #[source]
        source: CodecError,
    },

    /// Configuration failed structural validation.
    #[error("[channel {channel}] invalid configuration: {reason}")]
    InvalidConfig { channel: String, reason: String },

    /// Configuration requires a capability this peer does not support.
    #[error("[channel {channel}] {group} capability {capability} is required but not supported")]
    UnsupportedCapability {
        channel: String,
        group: &'static str,
        capability: String,
    },

    /// Configuration names no orderer endpoint.
    #[error("[channel {channel}] no ordering service endpoint provided in configuration block")]
    NoOrdererEndpoints { channel: String },

    /// Transient store could not be opened.
    #[error("[channel {channel}] failed opening transient store: {source}")]
    TransientStore {
        channel: String,
        #[source]
        source: StoreError,
    },

    /// Configuration update does not follow the current sequence.
    #[error("[channel {channel}] config sequence mismatch: expected {expected}, got {actual}")]
    SequenceMismatch {
        channel: String,
        expected: u64,
        actual: u64,
    },

    /// Trust roots could not be pushed to the transport layer.
    #[error(
        "[channel {channel}] failed to update trusted roots from latest config block, \
         this peer may not be able to communicate with members of the channel: {reason}"
    )]
    TrustRootUpdate { channel: String, reason: String },

    /// A channel with this id is already registered.
    #[error("channel {0} already exists")]
    ChannelExists(String),

    /// The channel is not (or no longer) known to this peer.
    #[error("channel {0} not found")]
    UnknownChannel(String),

    /// Block validation could not complete.
    #[error("[channel {channel}] block {block} validation failed: {reason}")]
    Validation {
        channel: String,
        block: u64,
        reason: String,
    },

    /// The validation capacity limiter has been shut down.
    #[error("validation capacity limiter closed")]
    ValidationCapacityClosed,

    /// `initialize` has not been called yet.
    #[error("channel registry not initialized")]
    NotInitialized,

    /// `initialize` was called a second time.
    #[error("channel registry already initialized")]
    AlreadyInitialized,

    /// Peer configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_orderer_message() {
        let err = ChannelError::NoOrdererEndpoints {
            channel: "ch1".into(),
        };
        assert!(err
            .to_string()
            .contains("no ordering service endpoint provided"));
        assert!(err.to_string().contains("ch1"));
    }

    #[test]
    fn test_ledger_creation_message() {
        let err = ChannelError::LedgerCreation(LedgerError::AlreadyExists("ch1".into()));
        assert!(err
            .to_string()
            .starts_with("cannot create ledger from genesis block"));
    }

    #[test]
    fn test_sequence_mismatch_message() {
        let err = ChannelError::SequenceMismatch {
            channel: "ch1".into(),
            expected: 3,
            actual: 5,
        };
        assert!(err.to_string().contains("expected 3, got 5"));
    }

    #[test]
    fn test_codec_error_converts() {
        let err: ChannelError = CodecError::MissingChannelId.into();
        assert!(matches!(err, ChannelError::InvalidBlock(_)));
    }
}
