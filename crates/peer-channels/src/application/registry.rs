//! # Channel Registry
//!
//! The peer's map of joined channels. Creation and recovery build a channel
//! completely outside the lock and insert it in one short write, so a reader
//! either sees a fully constructed channel or none at all.
//!
//! ## Lifecycle
//!
//! ```text
//! new ──► initialize (once) ──► create_channel / lookups
//!              │
//!              └─ rebuilds every persisted ledger, skipping broken ones
//! ```

use std::collections::hash_map::Entry;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use shared_types::{ApplicationGroup, Block, ChannelInfo};
use tracing::{debug, error, info};

use crate::application::channel::ChannelState;
use crate::application::construction::{
    ChannelFactory, ChannelInitializer, PeerCollaborators, RuntimeSettings,
};
use crate::application::coordinator::ValidationCoordinator;
use crate::application::deliver::{ChannelMap, DeliverChainManager};
use crate::application::recovery::{config_block_from_ledger, RecoveryReport};
use crate::application::trust_roots::TrustRootAggregator;
use crate::application::validator::PolicyManagerGetter;
use crate::config::PeerConfig;
use crate::domain::{ChannelError, ChannelResult, ConfigBundle, PolicyManager};
use crate::ports::inbound::{ChannelProviders, ChannelRegistryApi};
use crate::ports::outbound::{PeerLedger, PluginMapper, TransientStore};

/// All channels this peer has joined.
pub struct ChannelRegistry {
    config: PeerConfig,
    collaborators: PeerCollaborators,
    trust_roots: Arc<TrustRootAggregator>,
    channels: ChannelMap,
    runtime: OnceLock<RuntimeSettings>,
}

impl ChannelRegistry {
    pub fn new(config: PeerConfig, collaborators: PeerCollaborators) -> Self {
        let trust_roots = Arc::new(TrustRootAggregator::new(
            config.tls.clone(),
            Arc::clone(&collaborators.transport),
        ));
        Self {
            config,
            collaborators,
            trust_roots,
            channels: ChannelMap::default(),
            runtime: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    pub fn trust_roots(&self) -> &Arc<TrustRootAggregator> {
        &self.trust_roots
    }

    /// The validation limiter, once `initialize` has run.
    pub fn validation_coordinator(&self) -> Option<&ValidationCoordinator> {
        self.runtime.get().map(|runtime| &runtime.coordinator)
    }

    /// Fix the validation pool, plugin mapper and per-channel initializer,
    /// then rebuild every channel with a persisted ledger.
    ///
    /// A channel that cannot be rebuilt is logged and skipped. Failing to
    /// list the persisted ledgers at all is returned; the peer cannot start.
    pub async fn initialize(
        &self,
        initializer: Option<ChannelInitializer>,
        providers: &ChannelProviders,
        plugin_mapper: Arc<dyn PluginMapper>,
        workers: usize,
    ) -> ChannelResult<RecoveryReport> {
        self.runtime
            .set(RuntimeSettings {
                coordinator: ValidationCoordinator::new(workers),
                plugin_mapper,
                initializer,
            })
            .map_err(|_| ChannelError::AlreadyInitialized)?;
        let runtime = self.runtime()?;

        let ids = self
            .collaborators
            .ledger_provider
            .ledger_ids()
            .await
            .map_err(ChannelError::LedgerEnumeration)?;

        let mut report = RecoveryReport::default();
        for channel_id in ids {
            info!("[{}] loading channel", channel_id);
            match self.recover_channel(&channel_id, providers, runtime).await {
                Ok(()) => {
                    self.run_initializer(runtime, &channel_id);
                    report.recovered.push(channel_id);
                }
                Err(e) => {
                    error!(channel = %channel_id, "Failed to load channel: {}", e);
                    report.skipped.push((channel_id, e.to_string()));
                }
            }
        }

        info!(
            recovered = report.recovered.len(),
            skipped = report.skipped.len(),
            "Channel recovery complete"
        );
        Ok(report)
    }

    /// [`initialize`](Self::initialize) with the validation pool sized from
    /// the peer configuration, which is checked first.
    pub async fn initialize_from_config(
        &self,
        initializer: Option<ChannelInitializer>,
        providers: &ChannelProviders,
        plugin_mapper: Arc<dyn PluginMapper>,
    ) -> ChannelResult<RecoveryReport> {
        self.config.validate()?;
        let workers = self.config.validation.pool_size;
        self.initialize(initializer, providers, plugin_mapper, workers)
            .await
    }

    async fn recover_channel(
        &self,
        channel_id: &str,
        providers: &ChannelProviders,
        runtime: &RuntimeSettings,
    ) -> ChannelResult<()> {
        let ledger = self
            .collaborators
            .ledger_provider
            .open_ledger(channel_id)
            .await
            .map_err(|source| ChannelError::Ledger {
                channel: channel_id.to_string(),
                source,
            })?;
        let config_block = config_block_from_ledger(channel_id, ledger.as_ref()).await?;

        let channel = self
            .factory(runtime)
            .build(channel_id, ledger, &config_block, providers)
            .await?;
        self.insert(channel)
    }

    /// Create a channel from its genesis block and register it.
    pub async fn create_channel(
        &self,
        genesis: &Block,
        providers: &ChannelProviders,
    ) -> ChannelResult<()> {
        let runtime = self.runtime()?;
        let channel_id = genesis.channel_id()?.to_string();

        if self.channels.read().contains_key(&channel_id) {
            return Err(ChannelError::ChannelExists(channel_id));
        }

        let ledger = self
            .collaborators
            .ledger_provider
            .create_ledger(genesis)
            .await
            .map_err(ChannelError::LedgerCreation)?;

        let channel = self
            .factory(runtime)
            .build(&channel_id, ledger, genesis, providers)
            .await?;
        self.insert(channel)?;
        info!("[{}] channel created", channel_id);

        self.run_initializer(runtime, &channel_id);
        Ok(())
    }

    pub fn channel(&self, channel_id: &str) -> Option<Arc<ChannelState>> {
        self.channels.read().get(channel_id).cloned()
    }

    pub fn channels(&self) -> Vec<String> {
        self.channels.read().keys().cloned().collect()
    }

    pub fn channels_info(&self) -> Vec<ChannelInfo> {
        self.channels
            .read()
            .keys()
            .map(|channel_id| ChannelInfo {
                channel_id: channel_id.clone(),
            })
            .collect()
    }

    pub fn ledger(&self, channel_id: &str) -> Option<Arc<dyn PeerLedger>> {
        self.channel(channel_id).map(|c| c.ledger())
    }

    pub fn channel_config(&self, channel_id: &str) -> Option<Arc<ConfigBundle>> {
        self.channel(channel_id).map(|c| c.bundle())
    }

    /// The bundle every config subscriber has already seen. Unlike
    /// `channel_config` it never runs ahead of the resource swap.
    pub fn stable_channel_config(&self, channel_id: &str) -> Option<Arc<ConfigBundle>> {
        self.channel(channel_id).map(|c| c.resources())
    }

    pub fn policy_manager(&self, channel_id: &str) -> Option<Arc<PolicyManager>> {
        self.channel(channel_id).map(|c| c.policy_manager())
    }

    /// MSP ids of the channel's application organizations.
    pub fn msp_ids(&self, channel_id: &str) -> Vec<String> {
        self.channel(channel_id)
            .map(|c| c.msp_ids())
            .unwrap_or_default()
    }

    pub fn store_for_channel(&self, channel_id: &str) -> Option<Arc<dyn TransientStore>> {
        self.channel(channel_id).map(|c| c.store())
    }

    pub fn application_config(&self, channel_id: &str) -> Option<ApplicationGroup> {
        self.channel(channel_id).and_then(|c| c.application_config())
    }

    /// Policy manager lookup that follows later registrations and
    /// configuration updates. Holds no strong reference to the registry.
    pub fn policy_manager_getter(&self) -> Arc<dyn PolicyManagerGetter> {
        let channels = Arc::downgrade(&self.channels);
        Arc::new(move |channel_id: &str| {
            let channels = channels.upgrade()?;
            let map = channels.read();
            map.get(channel_id).map(|c| c.policy_manager())
        })
    }

    pub fn deliver_chain_manager(&self) -> DeliverChainManager {
        DeliverChainManager::new(Arc::clone(&self.channels))
    }

    fn runtime(&self) -> ChannelResult<&RuntimeSettings> {
        self.runtime.get().ok_or(ChannelError::NotInitialized)
    }

    fn factory<'a>(&'a self, runtime: &'a RuntimeSettings) -> ChannelFactory<'a> {
        ChannelFactory {
            collaborators: &self.collaborators,
            trust_roots: &self.trust_roots,
            runtime,
            policy_managers: self.policy_manager_getter(),
        }
    }

    fn insert(&self, channel: Arc<ChannelState>) -> ChannelResult<()> {
        match self.channels.write().entry(channel.channel_id().to_string()) {
            Entry::Occupied(entry) => Err(ChannelError::ChannelExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(channel);
                Ok(())
            }
        }
    }

    fn run_initializer(&self, runtime: &RuntimeSettings, channel_id: &str) {
        if let Some(initializer) = &runtime.initializer {
            debug!("[{}] running channel initializer", channel_id);
            initializer(channel_id);
        }
    }
}

#[async_trait]
impl ChannelRegistryApi for ChannelRegistry {
    async fn create_channel(
        &self,
        genesis: &Block,
        providers: &ChannelProviders,
    ) -> ChannelResult<()> {
        ChannelRegistry::create_channel(self, genesis, providers).await
    }

    fn channels(&self) -> Vec<String> {
        ChannelRegistry::channels(self)
    }

    fn channels_info(&self) -> Vec<ChannelInfo> {
        ChannelRegistry::channels_info(self)
    }

    fn ledger(&self, channel_id: &str) -> Option<Arc<dyn PeerLedger>> {
        ChannelRegistry::ledger(self, channel_id)
    }

    fn channel_config(&self, channel_id: &str) -> Option<Arc<ConfigBundle>> {
        ChannelRegistry::channel_config(self, channel_id)
    }

    fn stable_channel_config(&self, channel_id: &str) -> Option<Arc<ConfigBundle>> {
        ChannelRegistry::stable_channel_config(self, channel_id)
    }

    fn policy_manager(&self, channel_id: &str) -> Option<Arc<PolicyManager>> {
        ChannelRegistry::policy_manager(self, channel_id)
    }

    fn msp_ids(&self, channel_id: &str) -> Vec<String> {
        ChannelRegistry::msp_ids(self, channel_id)
    }

    fn store_for_channel(&self, channel_id: &str) -> Option<Arc<dyn TransientStore>> {
        ChannelRegistry::store_for_channel(self, channel_id)
    }

    fn application_config(&self, channel_id: &str) -> Option<ApplicationGroup> {
        ChannelRegistry::application_config(self, channel_id)
    }
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("channels", &self.channels())
            .field("initialized", &self.runtime.get().is_some())
            .finish_non_exhaustive()
    }
}
