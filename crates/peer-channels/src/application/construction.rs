//! # Channel Construction
//!
//! Shared by channel creation and startup recovery. Builds a fully wired
//! [`ChannelState`] from an opened ledger and its latest config block.
//! Nothing here touches the registry map; the caller inserts the result.
//!
//! ## Steps
//!
//! 1. Load the configuration: persisted ledger state first, else the config
//!    envelope of the block.
//! 2. Refuse unsupported capabilities.
//! 3. Warn about missing conventional policies.
//! 4. Require at least one orderer endpoint.
//! 5. Open the transient store.
//! 6. Wire committer and validator with a back-reference to the channel.
//! 7. Wrap the bundle in a bundle source with the fixed subscriber chain.
//! 8. Hand the channel to gossip.

use std::sync::Arc;

use arc_swap::ArcSwap;
use shared_types::{
    Block, ChannelConfig, CodecError, CHANNEL_CONFIG_KEY, CHANNEL_CONFIG_NAMESPACE,
};
use tracing::{debug, info};

use crate::application::channel::ChannelState;
use crate::application::collections::SimpleCollectionStore;
use crate::application::committer::LedgerCommitter;
use crate::application::coordinator::ValidationCoordinator;
use crate::application::shims::{CollectionInfoShim, ValidationInfoRetrieveShim};
use crate::application::subscribers::{
    GossipConfigNotifier, MspRegistrar, ResourceSwap, TrustRootSubscriber,
};
use crate::application::trust_roots::TrustRootAggregator;
use crate::application::validator::{PolicyManagerGetter, TxValidator};
use crate::domain::{
    check_supported, log_sanity_checks, BundleSource, BundleSubscriber, ChannelError,
    ChannelResult, ConfigBundle, LedgerError,
};
use crate::ports::inbound::{ChannelProviders, GossipSupport};
use crate::ports::outbound::{
    GossipService, IdentityDeserializerFactory, LedgerProvider, MspManagerRegistry, PeerLedger,
    PluginMapper, TransientStoreProvider, TransportServer,
};

/// Hook run once per channel after it is registered.
pub type ChannelInitializer = Arc<dyn Fn(&str) + Send + Sync>;

/// Process-wide collaborators of the channel core.
#[derive(Clone)]
pub struct PeerCollaborators {
    pub ledger_provider: Arc<dyn LedgerProvider>,
    pub transient_store_provider: Arc<dyn TransientStoreProvider>,
    pub gossip: Arc<dyn GossipService>,
    pub transport: Arc<dyn TransportServer>,
    pub msp_registry: Arc<dyn MspManagerRegistry>,
    pub id_deserializer_factory: Arc<dyn IdentityDeserializerFactory>,
}

/// Settings fixed by `initialize`.
pub(crate) struct RuntimeSettings {
    pub(crate) coordinator: ValidationCoordinator,
    pub(crate) plugin_mapper: Arc<dyn PluginMapper>,
    pub(crate) initializer: Option<ChannelInitializer>,
}

/// Builds channels. Borrowed from the registry for one construction.
pub(crate) struct ChannelFactory<'a> {
    pub(crate) collaborators: &'a PeerCollaborators,
    pub(crate) trust_roots: &'a Arc<TrustRootAggregator>,
    pub(crate) runtime: &'a RuntimeSettings,
    pub(crate) policy_managers: Arc<dyn PolicyManagerGetter>,
}

impl ChannelFactory<'_> {
    pub(crate) async fn build(
        &self,
        channel_id: &str,
        ledger: Arc<dyn PeerLedger>,
        config_block: &Block,
        providers: &ChannelProviders,
    ) -> ChannelResult<Arc<ChannelState>> {
        let config = load_config(channel_id, ledger.as_ref(), config_block)?;
        let bundle = Arc::new(ConfigBundle::new(channel_id, config)?);

        check_supported(&bundle)?;
        log_sanity_checks(&bundle);

        if bundle.orderer_addresses().is_empty() {
            return Err(ChannelError::NoOrdererEndpoints {
                channel: channel_id.to_string(),
            });
        }

        let store = self
            .collaborators
            .transient_store_provider
            .open_store(channel_id)
            .await
            .map_err(|source| ChannelError::TransientStore {
                channel: channel_id.to_string(),
                source,
            })?;

        let resources = Arc::new(ArcSwap::new(Arc::clone(&bundle)));
        let subscribers: Vec<Box<dyn BundleSubscriber>> = vec![
            Box::new(GossipConfigNotifier::new(Arc::clone(&self.collaborators.gossip))),
            Box::new(TrustRootSubscriber::new(Arc::clone(self.trust_roots))),
            Box::new(MspRegistrar::new(Arc::clone(&self.collaborators.msp_registry))),
            Box::new(ResourceSwap::new(Arc::clone(&resources))),
        ];
        let validation_info = ValidationInfoRetrieveShim::new(
            Arc::clone(&providers.new_lifecycle),
            Arc::clone(&providers.legacy_lifecycle),
        );
        let collections = Arc::new(CollectionInfoShim::new(
            Arc::clone(&providers.new_lifecycle),
            channel_id,
        ));

        let channel = Arc::new_cyclic(|weak| {
            let committer = Arc::new(LedgerCommitter::new(
                channel_id,
                Arc::clone(&ledger),
                weak.clone(),
            ));
            let validator = Arc::new(TxValidator::new(
                channel_id,
                self.runtime.coordinator.clone(),
                weak.clone(),
                validation_info,
                collections,
                Arc::clone(&providers.sccp),
                Arc::clone(&self.runtime.plugin_mapper),
                Arc::clone(&self.policy_managers),
            ));
            let bundle_source = BundleSource::new(Arc::clone(&bundle), subscribers);
            ChannelState::new(
                channel_id,
                ledger,
                Arc::clone(&store),
                resources,
                bundle_source,
                committer,
                validator,
            )
        });

        self.collaborators.gossip.initialize_channel(
            channel_id,
            bundle.orderer_addresses(),
            GossipSupport {
                validator: channel.validator(),
                committer: channel.committer(),
                store,
                collection_store: Arc::new(SimpleCollectionStore::new(
                    channel_id,
                    Arc::clone(&providers.deployed_cc_info),
                )),
                id_deserializer_factory: Arc::clone(&self.collaborators.id_deserializer_factory),
            },
        );

        info!(
            "[{}] channel ready at config sequence {}",
            channel_id,
            bundle.sequence()
        );
        Ok(channel)
    }
}

/// The persisted configuration if the ledger has one, else the configuration
/// carried by `config_block`.
fn load_config(
    channel_id: &str,
    ledger: &dyn PeerLedger,
    config_block: &Block,
) -> ChannelResult<ChannelConfig> {
    let ledger_error = |source: LedgerError| ChannelError::Ledger {
        channel: channel_id.to_string(),
        source,
    };
    let decode_error = |source: CodecError| ChannelError::ConfigDecode {
        channel: channel_id.to_string(),
        source,
    };

    let persisted = ledger
        .new_query_executor()
        .map_err(ledger_error)?
        .get_state(CHANNEL_CONFIG_NAMESPACE, CHANNEL_CONFIG_KEY)
        .map_err(ledger_error)?;

    if let Some(bytes) = persisted {
        debug!("[{}] using persisted channel config", channel_id);
        return shared_types::decode(&bytes).map_err(decode_error);
    }

    debug!(
        "[{}] no persisted config, reading block {}",
        channel_id,
        config_block.number()
    );
    config_block
        .extract_envelope(0)?
        .config_envelope()
        .map(|envelope| envelope.config)
        .map_err(decode_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryLedgerProvider;
    use crate::test_utils::{genesis_block, genesis_block_with, ConfigBuilder};

    #[tokio::test]
    async fn test_persisted_config_preferred() {
        let ledgers = InMemoryLedgerProvider::new();
        let ledger = ledgers.seed("ch1", vec![genesis_block("ch1")]);
        let newer = ConfigBuilder::new().sequence(7).build();
        ledger.put_state(
            CHANNEL_CONFIG_NAMESPACE,
            CHANNEL_CONFIG_KEY,
            shared_types::encode(&newer).unwrap(),
        );

        let config = load_config("ch1", ledger.as_ref(), &genesis_block("ch1")).unwrap();

        assert_eq!(config.sequence, 7);
    }

    #[tokio::test]
    async fn test_falls_back_to_block() {
        let ledgers = InMemoryLedgerProvider::new();
        let ledger = ledgers.seed("ch1", vec![genesis_block("ch1")]);
        ledger.delete_state(CHANNEL_CONFIG_NAMESPACE, CHANNEL_CONFIG_KEY);
        let block = genesis_block_with("ch1", ConfigBuilder::new().sequence(3));

        let config = load_config("ch1", ledger.as_ref(), &block).unwrap();

        assert_eq!(config.sequence, 3);
    }

    #[tokio::test]
    async fn test_non_config_block_without_state_fails() {
        let ledgers = InMemoryLedgerProvider::new();
        let ledger = ledgers.seed("ch1", vec![Block::new(0, [0; 32], vec![])]);

        let err = load_config("ch1", ledger.as_ref(), &Block::new(0, [0; 32], vec![])).unwrap_err();

        assert!(matches!(err, ChannelError::InvalidBlock(_)));
    }

    #[tokio::test]
    async fn test_corrupt_state_reported() {
        let ledgers = InMemoryLedgerProvider::new();
        let ledger = ledgers.seed("ch1", vec![genesis_block("ch1")]);
        ledger.put_state(CHANNEL_CONFIG_NAMESPACE, CHANNEL_CONFIG_KEY, vec![0xff]);

        let err = load_config("ch1", ledger.as_ref(), &genesis_block("ch1")).unwrap_err();

        assert!(matches!(err, ChannelError::ConfigDecode { .. }));
    }
}
