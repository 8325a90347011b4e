//! # Channel State
//!
//! Everything the peer holds for one joined channel: the ledger, the
//! transient store, the bundle source with its live configuration, and the
//! committer and validator that reach back to the channel through a `Weak`.
//!
//! Configuration is never edited in place. [`ChannelState::apply`] builds a
//! new bundle, checks it against the current one and publishes it through
//! the bundle source, which runs the subscriber chain.

use std::sync::Arc;

use arc_swap::ArcSwap;
use shared_types::{ApplicationGroup, Envelope};
use tracing::info;

use crate::application::committer::LedgerCommitter;
use crate::application::deliver::LedgerBlockReader;
use crate::application::validator::TxValidator;
use crate::domain::{
    check_next_sequence, check_supported, log_sanity_checks, validate_new_bundle, BundleSource,
    ChannelResult, ConfigBundle, PolicyManager,
};
use crate::ports::outbound::{PeerLedger, TransientStore};

pub struct ChannelState {
    channel_id: String,
    ledger: Arc<dyn PeerLedger>,
    store: Arc<dyn TransientStore>,
    resources: Arc<ArcSwap<ConfigBundle>>,
    bundle_source: BundleSource,
    committer: Arc<LedgerCommitter>,
    validator: Arc<TxValidator>,
}

impl ChannelState {
    pub(crate) fn new(
        channel_id: &str,
        ledger: Arc<dyn PeerLedger>,
        store: Arc<dyn TransientStore>,
        resources: Arc<ArcSwap<ConfigBundle>>,
        bundle_source: BundleSource,
        committer: Arc<LedgerCommitter>,
        validator: Arc<TxValidator>,
    ) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            ledger,
            store,
            resources,
            bundle_source,
            committer,
            validator,
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn ledger(&self) -> Arc<dyn PeerLedger> {
        Arc::clone(&self.ledger)
    }

    pub fn store(&self) -> Arc<dyn TransientStore> {
        Arc::clone(&self.store)
    }

    /// The bundle source's current bundle.
    pub fn bundle(&self) -> Arc<ConfigBundle> {
        self.bundle_source.current()
    }

    /// The bundle the resource-swap subscriber last installed.
    pub fn resources(&self) -> Arc<ConfigBundle> {
        self.resources.load_full()
    }

    pub fn bundle_source(&self) -> &BundleSource {
        &self.bundle_source
    }

    pub fn committer(&self) -> Arc<LedgerCommitter> {
        Arc::clone(&self.committer)
    }

    pub fn validator(&self) -> Arc<TxValidator> {
        Arc::clone(&self.validator)
    }

    pub fn sequence(&self) -> u64 {
        self.bundle().sequence()
    }

    pub fn policy_manager(&self) -> Arc<PolicyManager> {
        self.resources().policy_manager()
    }

    pub fn application_config(&self) -> Option<ApplicationGroup> {
        self.resources().application_config().cloned()
    }

    pub fn msp_ids(&self) -> Vec<String> {
        self.resources().application_msp_ids()
    }

    /// Block reader for the deliver service.
    pub fn reader(&self) -> LedgerBlockReader {
        LedgerBlockReader::new(&self.channel_id, self.ledger())
    }

    /// Build the bundle a config envelope would install, without installing
    /// it.
    pub fn check_config_update(&self, envelope: &Envelope) -> ChannelResult<Arc<ConfigBundle>> {
        let current = self.bundle();
        let next = ConfigBundle::from_envelope(envelope)?;

        validate_new_bundle(&current, &next)?;
        check_next_sequence(&current, &next)?;
        check_supported(&next)?;
        Ok(Arc::new(next))
    }

    /// Install the configuration carried by a committed config envelope.
    pub fn apply(&self, envelope: &Envelope) -> ChannelResult<()> {
        let next = self.check_config_update(envelope)?;
        self.install(next);
        Ok(())
    }

    /// Publish a bundle already accepted by `check_config_update`.
    pub(crate) fn install(&self, next: Arc<ConfigBundle>) {
        log_sanity_checks(&next);
        let sequence = next.sequence();
        self.bundle_source.update(next);
        info!("[{}] applied config sequence {}", self.channel_id, sequence);
    }
}

impl std::fmt::Debug for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelState")
            .field("channel_id", &self.channel_id)
            .field("bundle_source", &self.bundle_source)
            .finish_non_exhaustive()
    }
}
