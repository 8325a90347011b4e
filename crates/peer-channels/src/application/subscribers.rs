//! The fixed subscriber chain every channel's bundle source notifies.
//!
//! Order matters: gossip learns about membership first, then the transport
//! trust roots, then the process-wide MSP registry, and last the channel's
//! own resource handle.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::application::trust_roots::TrustRootAggregator;
use crate::domain::{BundleSubscriber, ChannelResult, ConfigBundle};
use crate::ports::outbound::{ConfigEventer, ConfigUpdateView, GossipService, MspManagerRegistry};

/// Forwards the new configuration to gossip, then asks gossip to re-check
/// every known peer identity since memberships may have been revoked.
pub struct GossipConfigNotifier {
    eventer: Box<dyn ConfigEventer>,
    gossip: Arc<dyn GossipService>,
}

impl GossipConfigNotifier {
    pub fn new(gossip: Arc<dyn GossipService>) -> Self {
        Self {
            eventer: gossip.new_config_eventer(),
            gossip,
        }
    }
}

impl BundleSubscriber for GossipConfigNotifier {
    fn name(&self) -> &'static str {
        "gossip"
    }

    fn on_update(&self, bundle: &Arc<ConfigBundle>) -> ChannelResult<()> {
        self.eventer
            .process_config_update(&ConfigUpdateView::from(bundle.as_ref()));
        self.gossip.suspect_peers(&|_identity: &[u8]| true);
        Ok(())
    }
}

/// Recomputes the transport's client trust roots.
pub struct TrustRootSubscriber {
    aggregator: Arc<TrustRootAggregator>,
}

impl TrustRootSubscriber {
    pub fn new(aggregator: Arc<TrustRootAggregator>) -> Self {
        Self { aggregator }
    }
}

impl BundleSubscriber for TrustRootSubscriber {
    fn name(&self) -> &'static str {
        "trust-roots"
    }

    fn on_update(&self, bundle: &Arc<ConfigBundle>) -> ChannelResult<()> {
        self.aggregator.update_trusted_roots(bundle)
    }
}

/// Publishes the bundle's MSP manager process-wide.
pub struct MspRegistrar {
    registry: Arc<dyn MspManagerRegistry>,
}

impl MspRegistrar {
    pub fn new(registry: Arc<dyn MspManagerRegistry>) -> Self {
        Self { registry }
    }
}

impl BundleSubscriber for MspRegistrar {
    fn name(&self) -> &'static str {
        "msp"
    }

    fn on_update(&self, bundle: &Arc<ConfigBundle>) -> ChannelResult<()> {
        self.registry
            .set_manager_for_chain(bundle.channel_id(), bundle.msp_manager());
        Ok(())
    }
}

/// Swaps the channel's resource handle to the new bundle.
pub struct ResourceSwap {
    resources: Arc<ArcSwap<ConfigBundle>>,
}

impl ResourceSwap {
    pub fn new(resources: Arc<ArcSwap<ConfigBundle>>) -> Self {
        Self { resources }
    }
}

impl BundleSubscriber for ResourceSwap {
    fn name(&self) -> &'static str {
        "resources"
    }

    fn on_update(&self, bundle: &Arc<ConfigBundle>) -> ChannelResult<()> {
        self.resources.store(Arc::clone(bundle));
        Ok(())
    }
}
