//! # Application Layer
//!
//! Channel construction, the registry, configuration propagation and the
//! per-channel validation and commit services.

pub mod channel;
pub mod collections;
pub mod committer;
pub mod construction;
pub mod coordinator;
pub mod deliver;
pub mod recovery;
pub mod registry;
pub mod shims;
pub mod subscribers;
pub mod trust_roots;
pub mod validator;

pub use channel::ChannelState;
pub use collections::SimpleCollectionStore;
pub use committer::LedgerCommitter;
pub use construction::{ChannelInitializer, PeerCollaborators};
pub use coordinator::{ValidationCoordinator, ValidationPermit};
pub use deliver::{DeliverChainManager, LedgerBlockReader};
pub use recovery::{config_block_from_ledger, RecoveryReport};
pub use registry::ChannelRegistry;
pub use shims::{CollectionInfoShim, ValidationInfoRetrieveShim};
pub use subscribers::{GossipConfigNotifier, MspRegistrar, ResourceSwap, TrustRootSubscriber};
pub use trust_roots::{CredentialSupport, TrustRootAggregator};
pub use validator::{PolicyManagerGetter, TxValidator};
