//! Driving Ports (API - Inbound)
//!
//! What the rest of the peer calls into: the registry API used by the
//! endorser, deliver and admin services, and the per-channel support
//! objects handed to the gossip layer.

use std::sync::Arc;

use async_trait::async_trait;
use shared_types::{ApplicationGroup, Block, ChannelInfo};

use crate::domain::{ChannelResult, ConfigBundle, LifecycleError, PolicyManager, TxValidationFlags};
use crate::ports::outbound::{
    CollectionAndLifecycleResources, DeployedChaincodeInfoProvider, IdentityDeserializerFactory,
    LifecycleResources, PeerLedger, StaticCollectionConfig, SystemChaincodeProvider,
    TransientStore,
};

/// Registry operations exposed to the rest of the peer.
///
/// Lookups by an unknown channel id return `None` or an empty list; they
/// never fail.
#[async_trait]
pub trait ChannelRegistryApi: Send + Sync {
    /// Create a channel from its genesis block.
    async fn create_channel(&self, genesis: &Block, providers: &ChannelProviders)
        -> ChannelResult<()>;

    /// Ids of every registered channel, unordered.
    fn channels(&self) -> Vec<String>;

    fn channels_info(&self) -> Vec<ChannelInfo>;

    fn ledger(&self, channel_id: &str) -> Option<Arc<dyn PeerLedger>>;

    /// The channel's current configuration bundle.
    fn channel_config(&self, channel_id: &str) -> Option<Arc<ConfigBundle>>;

    /// The configuration after every subscriber has applied it.
    fn stable_channel_config(&self, channel_id: &str) -> Option<Arc<ConfigBundle>>;

    fn policy_manager(&self, channel_id: &str) -> Option<Arc<PolicyManager>>;

    fn msp_ids(&self, channel_id: &str) -> Vec<String>;

    fn store_for_channel(&self, channel_id: &str) -> Option<Arc<dyn TransientStore>>;

    fn application_config(&self, channel_id: &str) -> Option<ApplicationGroup>;
}

/// Lifecycle and chaincode collaborators needed to build a channel.
#[derive(Clone)]
pub struct ChannelProviders {
    pub sccp: Arc<dyn SystemChaincodeProvider>,
    pub deployed_cc_info: Arc<dyn DeployedChaincodeInfoProvider>,
    pub legacy_lifecycle: Arc<dyn LifecycleResources>,
    pub new_lifecycle: Arc<dyn CollectionAndLifecycleResources>,
}

/// Validates the transactions of a block.
#[async_trait]
pub trait BlockValidator: Send + Sync {
    async fn validate(&self, block: &Block) -> ChannelResult<TxValidationFlags>;
}

/// Commits validated blocks.
#[async_trait]
pub trait Committer: Send + Sync {
    async fn commit(&self, block: Block) -> ChannelResult<()>;

    async fn ledger_height(&self) -> ChannelResult<u64>;

    /// Blocks by number; numbers beyond the height are skipped.
    async fn get_blocks(&self, numbers: &[u64]) -> ChannelResult<Vec<Block>>;
}

/// Private data collection lookups for one channel.
pub trait CollectionStore: Send + Sync {
    fn retrieve_collection_config(
        &self,
        chaincode: &str,
        collection: &str,
    ) -> Result<Option<StaticCollectionConfig>, LifecycleError>;

    /// Whether `msp_id` is a member of the collection.
    fn is_member(&self, chaincode: &str, collection: &str, msp_id: &str)
        -> Result<bool, LifecycleError>;
}

/// Everything gossip needs to run a channel.
#[derive(Clone)]
pub struct GossipSupport {
    pub validator: Arc<dyn BlockValidator>,
    pub committer: Arc<dyn Committer>,
    pub store: Arc<dyn TransientStore>,
    pub collection_store: Arc<dyn CollectionStore>,
    pub id_deserializer_factory: Arc<dyn IdentityDeserializerFactory>,
}
