//! # Peer Channels
//!
//! Per-channel state for a permissioned blockchain peer: which channels the
//! peer has joined, the live configuration of each, and the services the
//! rest of the peer obtains per channel (ledger, transient store, validator,
//! committer, policy lookups).
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────── ChannelRegistry ─────────────────────┐
//! genesis block ─►│ create_channel ─┐                                        │
//! persisted     ─►│ initialize ─────┴─► ChannelFactory ─► ChannelState (Arc) │
//! ledgers         │                                          │               │
//!                 │   lookups (channel, ledger, policy, msp) ◄┘               │
//!                 └──────────────────────────────────────────────────────────┘
//!
//! ChannelState
//! ├── BundleSource ── update ─► gossip ─► trust roots ─► MSP registry ─► resources
//! ├── TxValidator ─── ValidationCoordinator (global permits) ─► plugins
//! └── LedgerCommitter ── commit ─► ledger ─► apply config blocks
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Enforced by |
//! |-----------|-------------|
//! | Readers see a channel fully built or not at all | single insert after construction |
//! | At most one channel per id | `ChannelExists` on creation |
//! | Config sequence grows by exactly one per update | `ChannelState::check_config_update` |
//! | Concurrent validations never exceed the pool size | `ValidationCoordinator` |
//! | Pushed trust roots cover every joined channel | `TrustRootAggregator` |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Configuration bundles, policies, MSPs, validation codes
//! - `ports/` - Inbound API and outbound collaborator traits
//! - `application/` - Registry, construction, recovery, validation, commit
//! - `adapters/` - In-memory ledger, transient store and MSP registry
//! - `config.rs` / `logging.rs` - Peer settings and tracing setup
//!
//! ## Usage
//!
//! ```ignore
//! use peer_channels::{ChannelRegistry, PeerConfig};
//!
//! let registry = ChannelRegistry::new(PeerConfig::from_env(), collaborators);
//! let report = registry
//!     .initialize_from_config(Some(initializer), &providers, plugin_mapper)
//!     .await?;
//! registry.create_channel(&genesis_block, &providers).await?;
//! let policies = registry.policy_manager("mychannel");
//! ```

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod logging;
pub mod ports;
pub mod test_utils;

// Re-export key types for convenience
pub use application::{
    config_block_from_ledger, ChannelInitializer, ChannelRegistry, ChannelState,
    CredentialSupport, DeliverChainManager, LedgerBlockReader, LedgerCommitter,
    PeerCollaborators, RecoveryReport, TrustRootAggregator, TxValidator, ValidationCoordinator,
};
pub use config::{LogConfig, PeerConfig, TlsConfig, ValidationConfig};
pub use domain::{
    BundleSource, BundleSubscriber, ChannelError, ChannelResult, ConfigBundle, PolicyManager,
    TxValidationCode, TxValidationFlags,
};
pub use logging::init_logging;
pub use ports::inbound::{
    BlockValidator, ChannelProviders, ChannelRegistryApi, Committer, GossipSupport,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
