//! Driven Ports (SPI - Outbound Dependencies)
//!
//! Collaborators the channel core orchestrates but does not implement:
//! ledger storage, the gossip layer, the transport server, the transient
//! private-data store, chaincode lifecycle lookups, validation plugins and
//! the process-wide MSP registry.

use std::sync::Arc;

use async_trait::async_trait;
use shared_types::{AnchorPeer, Block, BlockchainInfo, Envelope};

use crate::domain::{
    ConfigBundle, IdentityDeserializer, LedgerError, LifecycleError, MspManager, PluginError,
    PolicyManager, StoreError, TransportError,
};
use crate::ports::inbound::GossipSupport;

// =============================================================================
// LEDGER
// =============================================================================

/// Creates and opens per-channel ledgers.
#[async_trait]
pub trait LedgerProvider: Send + Sync {
    /// Create a new ledger from a genesis block. Fails if one already exists.
    async fn create_ledger(&self, genesis: &Block) -> Result<Arc<dyn PeerLedger>, LedgerError>;

    /// Open an existing ledger.
    async fn open_ledger(&self, channel_id: &str) -> Result<Arc<dyn PeerLedger>, LedgerError>;

    /// Ids of every persisted ledger.
    async fn ledger_ids(&self) -> Result<Vec<String>, LedgerError>;
}

/// One channel's ledger.
#[async_trait]
pub trait PeerLedger: Send + Sync {
    async fn blockchain_info(&self) -> Result<BlockchainInfo, LedgerError>;

    async fn block_by_number(&self, number: u64) -> Result<Block, LedgerError>;

    /// Append a validated block.
    async fn commit(&self, block: Block) -> Result<(), LedgerError>;

    /// Read-only view of the world state.
    fn new_query_executor(&self) -> Result<Box<dyn QueryExecutor>, LedgerError>;

    /// Iterate blocks from `start` up to the height at call time.
    fn blocks_iterator(&self, start: u64) -> Result<Box<dyn BlockIterator>, LedgerError>;
}

/// State reads against a ledger snapshot.
pub trait QueryExecutor: Send {
    fn get_state(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, LedgerError>;
}

/// Forward-only block cursor.
pub trait BlockIterator: Send {
    /// Next block, or `None` once the end of the range is reached.
    fn next_block(&mut self) -> Result<Option<Block>, LedgerError>;
}

// =============================================================================
// GOSSIP
// =============================================================================

/// The dissemination layer.
pub trait GossipService: Send + Sync {
    /// A handler for configuration updates of one channel.
    fn new_config_eventer(&self) -> Box<dyn ConfigEventer>;

    /// Start disseminating blocks for a channel.
    fn initialize_channel(&self, channel_id: &str, orderer_endpoints: &[String], support: GossipSupport);

    /// Re-verify the identities of every peer matching `predicate`.
    fn suspect_peers(&self, predicate: &dyn Fn(&[u8]) -> bool);
}

/// Receives configuration updates for one channel.
pub trait ConfigEventer: Send + Sync {
    fn process_config_update(&self, update: &ConfigUpdateView);
}

/// What the gossip layer needs to know about a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigUpdateView {
    pub channel_id: String,
    pub sequence: u64,
    pub orderer_addresses: Vec<String>,
    pub organizations: Vec<OrgView>,
}

/// An application organization as seen by gossip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgView {
    pub name: String,
    pub msp_id: String,
    pub anchor_peers: Vec<AnchorPeer>,
}

impl From<&ConfigBundle> for ConfigUpdateView {
    fn from(bundle: &ConfigBundle) -> Self {
        let organizations = bundle
            .application_config()
            .map(|app| {
                app.organizations
                    .iter()
                    .map(|org| OrgView {
                        name: org.name.clone(),
                        msp_id: org.msp_id.clone(),
                        anchor_peers: org.anchor_peers.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            channel_id: bundle.channel_id().to_string(),
            sequence: bundle.sequence(),
            orderer_addresses: bundle.orderer_addresses().to_vec(),
            organizations,
        }
    }
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// The peer's network server.
pub trait TransportServer: Send + Sync {
    /// Replace the set of CA certificates accepted for client authentication.
    fn set_client_root_cas(&self, roots: Vec<Vec<u8>>) -> Result<(), TransportError>;
}

// =============================================================================
// TRANSIENT STORE
// =============================================================================

/// Opens per-channel transient stores. Opening the same id twice returns the
/// same store.
#[async_trait]
pub trait TransientStoreProvider: Send + Sync {
    async fn open_store(&self, channel_id: &str) -> Result<Arc<dyn TransientStore>, StoreError>;
}

/// Private data held until its transaction commits.
pub trait TransientStore: Send + Sync {
    fn persist(&self, tx_id: &str, block_height: u64, data: Vec<u8>) -> Result<(), StoreError>;

    fn get_tx_private_data(&self, tx_id: &str) -> Result<Vec<Vec<u8>>, StoreError>;

    fn purge_by_tx_ids(&self, tx_ids: &[String]) -> Result<(), StoreError>;

    /// Drop every entry received below `height`.
    fn purge_below_height(&self, height: u64) -> Result<(), StoreError>;
}

// =============================================================================
// LIFECYCLE
// =============================================================================

/// Which plugin validates a chaincode's transactions, and with what args.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationInfo {
    pub plugin: String,
    pub args: Vec<u8>,
}

/// Private data collection definition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StaticCollectionConfig {
    pub name: String,
    pub member_orgs: Vec<String>,
    pub required_peer_count: u32,
    pub maximum_peer_count: u32,
    pub block_to_live: u64,
}

/// Legacy chaincode lifecycle.
pub trait LifecycleResources: Send + Sync {
    /// `Ok(None)` when the chaincode is not defined under this lifecycle.
    fn validation_info(
        &self,
        channel_id: &str,
        chaincode: &str,
    ) -> Result<Option<ValidationInfo>, LifecycleError>;
}

/// Current chaincode lifecycle, which also knows about collections.
pub trait CollectionAndLifecycleResources: LifecycleResources {
    fn collection_validation_info(
        &self,
        channel_id: &str,
        chaincode: &str,
        collection: &str,
    ) -> Result<Option<Vec<u8>>, LifecycleError>;
}

/// Looks up collection definitions of deployed chaincodes.
pub trait DeployedChaincodeInfoProvider: Send + Sync {
    fn collection_info(
        &self,
        channel_id: &str,
        chaincode: &str,
        collection: &str,
    ) -> Result<Option<StaticCollectionConfig>, LifecycleError>;
}

/// Collection validation lookups already bound to one channel.
pub trait ChannelCollectionInfo: Send + Sync {
    fn collection_validation_info(
        &self,
        chaincode: &str,
        collection: &str,
    ) -> Result<Option<Vec<u8>>, LifecycleError>;
}

/// Knows which chaincodes are built into the peer.
pub trait SystemChaincodeProvider: Send + Sync {
    fn is_sys_cc(&self, name: &str) -> bool;

    fn is_sys_cc_and_not_invokable_external(&self, name: &str) -> bool;
}

// =============================================================================
// VALIDATION PLUGINS
// =============================================================================

/// Everything a plugin may look at. Owned so it can cross into a blocking
/// task.
#[derive(Clone)]
pub struct PluginContext {
    pub channel_id: String,
    pub block_number: u64,
    pub tx_index: usize,
    pub envelope: Envelope,
    pub args: Vec<u8>,
    pub policy_manager: Arc<PolicyManager>,
    pub collections: Arc<dyn ChannelCollectionInfo>,
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("channel_id", &self.channel_id)
            .field("block_number", &self.block_number)
            .field("tx_index", &self.tx_index)
            .field("tx_id", &self.envelope.header.tx_id)
            .finish_non_exhaustive()
    }
}

/// A transaction validation plugin.
pub trait ValidationPlugin: Send + Sync {
    fn validate(&self, ctx: &PluginContext) -> Result<(), PluginError>;
}

/// Resolves plugin names to implementations.
pub trait PluginMapper: Send + Sync {
    fn plugin(&self, name: &str) -> Option<Arc<dyn ValidationPlugin>>;
}

// =============================================================================
// MSP
// =============================================================================

/// Process-wide MSP manager per channel.
pub trait MspManagerRegistry: Send + Sync {
    fn set_manager_for_chain(&self, channel_id: &str, manager: Arc<MspManager>);

    fn manager_for_chain(&self, channel_id: &str) -> Option<Arc<MspManager>>;
}

/// Hands out identity deserializers per channel.
pub trait IdentityDeserializerFactory: Send + Sync {
    fn identity_deserializer(&self, channel_id: &str) -> Option<Arc<dyn IdentityDeserializer>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{ApplicationGroup, ChannelConfig, ChannelGroup, OrganizationConfig};

    #[test]
    fn test_config_update_view_from_bundle() {
        let config = ChannelConfig {
            sequence: 3,
            channel: ChannelGroup {
                orderer_addresses: vec!["orderer:7050".into()],
                ..Default::default()
            },
            application: Some(ApplicationGroup {
                organizations: vec![OrganizationConfig {
                    name: "Org1".into(),
                    msp_id: "Org1MSP".into(),
                    root_certs: vec![b"root".to_vec()],
                    anchor_peers: vec![AnchorPeer {
                        host: "peer0".into(),
                        port: 7051,
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        };
        let bundle = ConfigBundle::new("ch1", config).unwrap();

        let view = ConfigUpdateView::from(&bundle);

        assert_eq!(view.sequence, 3);
        assert_eq!(view.orderer_addresses, vec!["orderer:7050"]);
        assert_eq!(view.organizations[0].anchor_peers[0].port, 7051);
    }
}
