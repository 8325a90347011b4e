//! # Test Utilities
//!
//! Recording and static implementations of the outbound ports, a channel
//! configuration builder and a ready-wired test peer. Used by this crate's
//! tests and available to hosts that test against the channel core.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use shared_types::{
    ApplicationGroup, Block, ChannelConfig, ChannelGroup, Envelope, OrdererGroup,
    OrganizationConfig, Policy,
};

use crate::adapters::{
    InMemoryLedgerProvider, InMemoryMspRegistry, InMemoryTransientStoreProvider,
    RegistryDeserializerFactory,
};
use crate::application::{ChannelInitializer, ChannelRegistry, PeerCollaborators, RecoveryReport};
use crate::config::PeerConfig;
use crate::domain::policy::{
    BLOCK_VALIDATION, CHANNEL_APPLICATION_ADMINS, CHANNEL_APPLICATION_READERS,
    CHANNEL_APPLICATION_WRITERS, CHANNEL_READERS, CHANNEL_WRITERS,
};
use crate::domain::{
    ChannelResult, ConfigBundle, LifecycleError, PluginError, TransportError,
};
use crate::ports::inbound::{ChannelProviders, GossipSupport};
use crate::ports::outbound::{
    CollectionAndLifecycleResources, ConfigEventer, ConfigUpdateView,
    DeployedChaincodeInfoProvider, GossipService, LifecycleResources, PluginContext, PluginMapper,
    StaticCollectionConfig, SystemChaincodeProvider, TransportServer, ValidationInfo,
    ValidationPlugin,
};

// =============================================================================
// CONFIGURATION FIXTURES
// =============================================================================

/// An X509 organization with one root cert and `tls_root` as its TLS CA.
pub fn org_with_tls(msp_id: &str, tls_root: &[u8]) -> OrganizationConfig {
    OrganizationConfig {
        name: msp_id.trim_end_matches("MSP").to_string(),
        msp_id: msp_id.to_string(),
        root_certs: vec![format!("{msp_id}-ca").into_bytes()],
        tls_root_certs: vec![tls_root.to_vec()],
        ..Default::default()
    }
}

/// An X509 organization whose TLS CA is `<msp_id>-tls-ca`.
pub fn org(msp_id: &str) -> OrganizationConfig {
    org_with_tls(msp_id, format!("{msp_id}-tls-ca").as_bytes())
}

/// Builds channel configurations that pass every construction check unless
/// told otherwise.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: ChannelConfig,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Sequence 0, one orderer endpoint, `Org1MSP` in the application group,
    /// an etcdraft orderer group without organizations, every conventional
    /// policy.
    pub fn new() -> Self {
        let policies = [
            CHANNEL_READERS,
            CHANNEL_WRITERS,
            CHANNEL_APPLICATION_READERS,
            CHANNEL_APPLICATION_WRITERS,
            CHANNEL_APPLICATION_ADMINS,
            BLOCK_VALIDATION,
        ]
        .into_iter()
        .map(|path| (path.to_string(), Policy::Signature("OR('Org1MSP.member')".into())))
        .collect();

        Self {
            config: ChannelConfig {
                sequence: 0,
                channel: ChannelGroup {
                    orderer_addresses: vec!["orderer0:7050".to_string()],
                    capabilities: BTreeSet::from(["V2_0".to_string()]),
                    hashing_algorithm: "SHA256".to_string(),
                },
                application: Some(ApplicationGroup {
                    organizations: vec![org("Org1MSP")],
                    capabilities: BTreeSet::from(["V2_0".to_string()]),
                    ..Default::default()
                }),
                orderer: Some(OrdererGroup {
                    organizations: Vec::new(),
                    consensus_type: "etcdraft".to_string(),
                    capabilities: BTreeSet::new(),
                }),
                policies,
            },
        }
    }

    pub fn sequence(mut self, sequence: u64) -> Self {
        self.config.sequence = sequence;
        self
    }

    /// Replace the application organizations.
    pub fn orgs(mut self, orgs: Vec<OrganizationConfig>) -> Self {
        if let Some(app) = self.config.application.as_mut() {
            app.organizations = orgs;
        }
        self
    }

    pub fn orderer_org(mut self, org: OrganizationConfig) -> Self {
        if let Some(orderer) = self.config.orderer.as_mut() {
            orderer.organizations.push(org);
        }
        self
    }

    pub fn orderer_addresses(mut self, addresses: &[&str]) -> Self {
        self.config.channel.orderer_addresses = addresses.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn consensus_type(mut self, consensus_type: &str) -> Self {
        if let Some(orderer) = self.config.orderer.as_mut() {
            orderer.consensus_type = consensus_type.to_string();
        }
        self
    }

    pub fn application_capability(mut self, capability: &str) -> Self {
        if let Some(app) = self.config.application.as_mut() {
            app.capabilities.insert(capability.to_string());
        }
        self
    }

    pub fn channel_capability(mut self, capability: &str) -> Self {
        self.config.channel.capabilities.insert(capability.to_string());
        self
    }

    pub fn without_application(mut self) -> Self {
        self.config.application = None;
        self
    }

    pub fn without_policy(mut self, path: &str) -> Self {
        self.config.policies.remove(path);
        self
    }

    pub fn build(self) -> ChannelConfig {
        self.config
    }

    /// A validated bundle. Panics if the configuration is invalid.
    pub fn bundle(self, channel_id: &str) -> ConfigBundle {
        ConfigBundle::new(channel_id, self.config).expect("test configuration is valid")
    }

    /// A `Config` envelope carrying this configuration.
    pub fn envelope(self, channel_id: &str) -> Envelope {
        Envelope::config(channel_id, self.config).expect("configuration encodes")
    }
}

/// Genesis block of `channel_id` with the default configuration.
pub fn genesis_block(channel_id: &str) -> Block {
    genesis_block_with(channel_id, ConfigBuilder::new())
}

/// Genesis block of `channel_id` carrying `builder`'s configuration.
pub fn genesis_block_with(channel_id: &str, builder: ConfigBuilder) -> Block {
    config_block(channel_id, 0, [0; 32], builder)
}

/// A config block at `number` pointing at itself as the last config.
pub fn config_block(channel_id: &str, number: u64, previous_hash: [u8; 32], builder: ConfigBuilder) -> Block {
    Block::new(number, previous_hash, vec![builder.envelope(channel_id)])
        .with_last_config_index(number)
}

/// A block of endorser transactions invoking `chaincode`.
pub fn tx_block(channel_id: &str, number: u64, last_config: u64, chaincode: &str, txs: usize) -> Block {
    let envelopes = (0..txs)
        .map(|i| Envelope::endorser_transaction(channel_id, &format!("tx-{number}-{i}"), chaincode, vec![]))
        .collect();
    Block::new(number, [0; 32], envelopes).with_last_config_index(last_config)
}

// =============================================================================
// GOSSIP
// =============================================================================

/// What the recording gossip service observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GossipEvent {
    ConfigUpdate(ConfigUpdateView),
    SuspectPeers { matched_all: bool },
    InitializeChannel {
        channel_id: String,
        orderer_endpoints: Vec<String>,
    },
}

/// Gossip service that records every call.
#[derive(Default)]
pub struct RecordingGossip {
    events: Arc<Mutex<Vec<GossipEvent>>>,
    supports: Mutex<HashMap<String, GossipSupport>>,
}

impl RecordingGossip {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<GossipEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Config updates delivered for `channel_id`, by sequence.
    pub fn config_updates(&self, channel_id: &str) -> Vec<u64> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                GossipEvent::ConfigUpdate(view) if view.channel_id == channel_id => {
                    Some(view.sequence)
                }
                _ => None,
            })
            .collect()
    }

    /// The support objects handed over for `channel_id`.
    pub fn support(&self, channel_id: &str) -> Option<GossipSupport> {
        self.supports.lock().get(channel_id).cloned()
    }
}

struct RecordingEventer {
    events: Arc<Mutex<Vec<GossipEvent>>>,
}

impl ConfigEventer for RecordingEventer {
    fn process_config_update(&self, update: &ConfigUpdateView) {
        self.events.lock().push(GossipEvent::ConfigUpdate(update.clone()));
    }
}

impl GossipService for RecordingGossip {
    fn new_config_eventer(&self) -> Box<dyn ConfigEventer> {
        Box::new(RecordingEventer {
            events: Arc::clone(&self.events),
        })
    }

    fn initialize_channel(&self, channel_id: &str, orderer_endpoints: &[String], support: GossipSupport) {
        self.events.lock().push(GossipEvent::InitializeChannel {
            channel_id: channel_id.to_string(),
            orderer_endpoints: orderer_endpoints.to_vec(),
        });
        self.supports.lock().insert(channel_id.to_string(), support);
    }

    fn suspect_peers(&self, predicate: &dyn Fn(&[u8]) -> bool) {
        let matched_all = predicate(b"any-identity");
        self.events.lock().push(GossipEvent::SuspectPeers { matched_all });
    }
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// Transport server that records every pushed root set.
#[derive(Default)]
pub struct RecordingTransport {
    pushes: Mutex<Vec<Vec<Vec<u8>>>>,
    failing: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make pushes fail while set.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn pushes(&self) -> Vec<Vec<Vec<u8>>> {
        self.pushes.lock().clone()
    }

    pub fn last_push(&self) -> Option<Vec<Vec<u8>>> {
        self.pushes.lock().last().cloned()
    }
}

impl TransportServer for RecordingTransport {
    fn set_client_root_cas(&self, roots: Vec<Vec<u8>>) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError("server is shutting down".into()));
        }
        self.pushes.lock().push(roots);
        Ok(())
    }
}

// =============================================================================
// LIFECYCLE
// =============================================================================

type CollectionKey = (String, String, String);

/// Lifecycle with fixed answers. Serves as legacy lifecycle, current
/// lifecycle and deployed chaincode info provider.
#[derive(Default)]
pub struct StaticLifecycle {
    infos: HashMap<String, Result<ValidationInfo, LifecycleError>>,
    collection_policies: HashMap<CollectionKey, Vec<u8>>,
    collections: HashMap<CollectionKey, StaticCollectionConfig>,
}

impl StaticLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_info(mut self, chaincode: &str, info: ValidationInfo) -> Self {
        self.infos.insert(chaincode.to_string(), Ok(info));
        self
    }

    pub fn with_error(mut self, chaincode: &str, error: LifecycleError) -> Self {
        self.infos.insert(chaincode.to_string(), Err(error));
        self
    }

    pub fn with_collection(mut self, channel_id: &str, chaincode: &str, collection: &str, policy: Vec<u8>) -> Self {
        self.collection_policies.insert(
            (channel_id.to_string(), chaincode.to_string(), collection.to_string()),
            policy,
        );
        self
    }

    pub fn with_static_collection(mut self, channel_id: &str, chaincode: &str, config: StaticCollectionConfig) -> Self {
        self.collections.insert(
            (channel_id.to_string(), chaincode.to_string(), config.name.clone()),
            config,
        );
        self
    }

    fn key(channel_id: &str, chaincode: &str, collection: &str) -> CollectionKey {
        (channel_id.to_string(), chaincode.to_string(), collection.to_string())
    }
}

impl LifecycleResources for StaticLifecycle {
    fn validation_info(&self, _channel_id: &str, chaincode: &str) -> Result<Option<ValidationInfo>, LifecycleError> {
        self.infos.get(chaincode).cloned().transpose()
    }
}

impl CollectionAndLifecycleResources for StaticLifecycle {
    fn collection_validation_info(
        &self,
        channel_id: &str,
        chaincode: &str,
        collection: &str,
    ) -> Result<Option<Vec<u8>>, LifecycleError> {
        Ok(self
            .collection_policies
            .get(&Self::key(channel_id, chaincode, collection))
            .cloned())
    }
}

impl DeployedChaincodeInfoProvider for StaticLifecycle {
    fn collection_info(
        &self,
        channel_id: &str,
        chaincode: &str,
        collection: &str,
    ) -> Result<Option<StaticCollectionConfig>, LifecycleError> {
        Ok(self.collections.get(&Self::key(channel_id, chaincode, collection)).cloned())
    }
}

/// System chaincode names known up front.
#[derive(Default)]
pub struct StaticSystemChaincodes {
    invokable: Vec<String>,
    not_invokable: Vec<String>,
}

impl StaticSystemChaincodes {
    pub fn new(invokable: &[&str], not_invokable: &[&str]) -> Self {
        Self {
            invokable: invokable.iter().map(|s| s.to_string()).collect(),
            not_invokable: not_invokable.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SystemChaincodeProvider for StaticSystemChaincodes {
    fn is_sys_cc(&self, name: &str) -> bool {
        self.invokable.iter().chain(&self.not_invokable).any(|n| n == name)
    }

    fn is_sys_cc_and_not_invokable_external(&self, name: &str) -> bool {
        self.not_invokable.iter().any(|n| n == name)
    }
}

// =============================================================================
// PLUGINS
// =============================================================================

/// Plugin names to implementations.
#[derive(Default)]
pub struct StaticPluginMapper {
    plugins: HashMap<String, Arc<dyn ValidationPlugin>>,
}

impl StaticPluginMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, plugin: Arc<dyn ValidationPlugin>) -> Self {
        self.plugins.insert(name.to_string(), plugin);
        self
    }
}

impl PluginMapper for StaticPluginMapper {
    fn plugin(&self, name: &str) -> Option<Arc<dyn ValidationPlugin>> {
        self.plugins.get(name).cloned()
    }
}

/// Accepts every transaction.
pub struct AcceptPlugin;

impl ValidationPlugin for AcceptPlugin {
    fn validate(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Rejects every transaction.
pub struct RejectPlugin;

impl ValidationPlugin for RejectPlugin {
    fn validate(&self, ctx: &PluginContext) -> Result<(), PluginError> {
        Err(PluginError::Invalid(format!(
            "endorsement of {} does not satisfy policy",
            ctx.envelope.header.tx_id
        )))
    }
}

/// Sleeps while validating and records how many validations overlapped.
#[derive(Default)]
pub struct ConcurrencyProbe {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
    delay: Duration,
}

impl ConcurrencyProbe {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ValidationPlugin for ConcurrencyProbe {
    fn validate(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// TEST PEER
// =============================================================================

/// A channel registry wired to in-memory and recording collaborators.
///
/// Chaincode `mycc` validates with plugin `accept`, `badcc` with `reject`
/// and `probecc` with the shared [`ConcurrencyProbe`].
pub struct TestPeer {
    pub registry: ChannelRegistry,
    pub ledgers: Arc<InMemoryLedgerProvider>,
    pub stores: Arc<InMemoryTransientStoreProvider>,
    pub gossip: Arc<RecordingGossip>,
    pub transport: Arc<RecordingTransport>,
    pub msp_registry: Arc<InMemoryMspRegistry>,
    pub providers: ChannelProviders,
    pub probe: Arc<ConcurrencyProbe>,
}

impl TestPeer {
    pub fn new(config: PeerConfig) -> Self {
        Self::with_ledgers(config, Arc::new(InMemoryLedgerProvider::new()))
    }

    /// A peer whose ledger provider already holds `ledgers`.
    pub fn with_ledgers(config: PeerConfig, ledgers: Arc<InMemoryLedgerProvider>) -> Self {
        let stores = Arc::new(InMemoryTransientStoreProvider::new());
        let gossip = Arc::new(RecordingGossip::new());
        let transport = Arc::new(RecordingTransport::new());
        let msp_registry = Arc::new(InMemoryMspRegistry::new());

        let collaborators = PeerCollaborators {
            ledger_provider: ledgers.clone(),
            transient_store_provider: stores.clone(),
            gossip: gossip.clone(),
            transport: transport.clone(),
            msp_registry: msp_registry.clone(),
            id_deserializer_factory: Arc::new(RegistryDeserializerFactory::new(
                msp_registry.clone(),
            )),
        };

        let lifecycle = Arc::new(
            StaticLifecycle::new()
                .with_info("mycc", plugin_info("accept"))
                .with_info("badcc", plugin_info("reject"))
                .with_info("probecc", plugin_info("probe")),
        );
        let providers = ChannelProviders {
            sccp: Arc::new(StaticSystemChaincodes::new(&["lscc", "qscc"], &["cscc", "vscc"])),
            deployed_cc_info: lifecycle.clone(),
            legacy_lifecycle: Arc::new(StaticLifecycle::new()),
            new_lifecycle: lifecycle,
        };

        Self {
            registry: ChannelRegistry::new(config, collaborators),
            ledgers,
            stores,
            gossip,
            transport,
            msp_registry,
            providers,
            probe: Arc::new(ConcurrencyProbe::new(Duration::from_millis(10))),
        }
    }

    pub fn plugin_mapper(&self) -> Arc<dyn PluginMapper> {
        Arc::new(
            StaticPluginMapper::new()
                .with("accept", Arc::new(AcceptPlugin))
                .with("reject", Arc::new(RejectPlugin))
                .with("probe", self.probe.clone()),
        )
    }

    pub async fn initialize(&self, workers: usize) -> ChannelResult<RecoveryReport> {
        self.initialize_with(None, workers).await
    }

    pub async fn initialize_with(
        &self,
        initializer: Option<ChannelInitializer>,
        workers: usize,
    ) -> ChannelResult<RecoveryReport> {
        self.registry
            .initialize(initializer, &self.providers, self.plugin_mapper(), workers)
            .await
    }

    /// Initialize with the pool size taken from the peer configuration.
    pub async fn initialize_from_config(&self) -> ChannelResult<RecoveryReport> {
        self.registry
            .initialize_from_config(None, &self.providers, self.plugin_mapper())
            .await
    }

    pub async fn create(&self, channel_id: &str) -> ChannelResult<()> {
        self.registry
            .create_channel(&genesis_block(channel_id), &self.providers)
            .await
    }
}

fn plugin_info(plugin: &str) -> ValidationInfo {
    ValidationInfo {
        plugin: plugin.to_string(),
        args: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_builder_is_valid() {
        let bundle = ConfigBuilder::new().bundle("ch1");
        assert_eq!(bundle.sequence(), 0);
        assert!(crate::domain::check_supported(&bundle).is_ok());
        assert!(crate::domain::log_sanity_checks(&bundle).is_empty());
    }

    #[test]
    fn test_genesis_block_shape() {
        let block = genesis_block("ch1");
        assert!(block.is_config_block());
        assert_eq!(block.channel_id().unwrap(), "ch1");
        assert_eq!(block.last_config_index().unwrap(), 0);
    }
}
