//! # Trust Root Aggregation
//!
//! The transport server authenticates clients against one flat CA list. That
//! list is the union of the TLS roots of every application organization on
//! every channel this peer has joined, plus the statically configured client
//! and server roots. Each configuration update of any channel rebuilds that
//! channel's share and pushes the whole union again.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use shared_types::{MspType, OrganizationConfig};
use tracing::debug;

use crate::config::TlsConfig;
use crate::domain::{ChannelError, ChannelResult, ConfigBundle};
use crate::ports::outbound::TransportServer;

/// Per-channel CA material derived from configuration.
#[derive(Debug, Default)]
pub struct CredentialSupport {
    app_root_cas: RwLock<BTreeMap<String, Vec<Vec<u8>>>>,
    orderer_root_cas: RwLock<HashMap<String, HashMap<String, Vec<Vec<u8>>>>>,
}

impl CredentialSupport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the CA entries of `bundle`'s channel.
    pub fn build_trusted_roots_for_chain(&self, bundle: &ConfigBundle) {
        let app_roots: Vec<Vec<u8>> = bundle
            .application_config()
            .map(|app| {
                app.organizations
                    .iter()
                    .filter(|org| org.msp_type == MspType::X509)
                    .flat_map(tls_material)
                    .collect()
            })
            .unwrap_or_default();

        let orderer_roots: HashMap<String, Vec<Vec<u8>>> = bundle
            .orderer_config()
            .map(|orderer| {
                orderer
                    .organizations
                    .iter()
                    .filter(|org| org.msp_type == MspType::X509)
                    .map(|org| (org.msp_id.clone(), tls_material(org).collect()))
                    .collect()
            })
            .unwrap_or_default();

        let channel = bundle.channel_id().to_string();
        self.app_root_cas.write().insert(channel.clone(), app_roots);
        self.orderer_root_cas.write().insert(channel, orderer_roots);
    }

    /// Application root CAs by channel, ordered by channel id.
    pub fn app_root_cas_by_chain(&self) -> BTreeMap<String, Vec<Vec<u8>>> {
        self.app_root_cas.read().clone()
    }

    /// Orderer root CAs of one channel, by orderer organization.
    pub fn orderer_root_cas(&self, channel_id: &str) -> HashMap<String, Vec<Vec<u8>>> {
        self.orderer_root_cas
            .read()
            .get(channel_id)
            .cloned()
            .unwrap_or_default()
    }
}

fn tls_material(org: &OrganizationConfig) -> impl Iterator<Item = Vec<u8>> + '_ {
    org.tls_root_certs
        .iter()
        .chain(org.tls_intermediate_certs.iter())
        .cloned()
}

/// Pushes the union of all channels' client roots to the transport server.
pub struct TrustRootAggregator {
    tls: TlsConfig,
    transport: Arc<dyn TransportServer>,
    credentials: CredentialSupport,
    push: Mutex<()>,
}

impl TrustRootAggregator {
    pub fn new(tls: TlsConfig, transport: Arc<dyn TransportServer>) -> Self {
        Self {
            tls,
            transport,
            credentials: CredentialSupport::new(),
            push: Mutex::new(()),
        }
    }

    pub fn credentials(&self) -> &CredentialSupport {
        &self.credentials
    }

    /// Rebuild `bundle`'s channel entry and push the full set.
    ///
    /// Does nothing when TLS is disabled.
    pub fn update_trusted_roots(&self, bundle: &ConfigBundle) -> ChannelResult<()> {
        if !self.tls.enabled {
            return Ok(());
        }

        // Rebuild and push as one step so concurrent updates of different
        // channels cannot push an older union last.
        let _push = self.push.lock();
        debug!(
            "[{}] updating trusted root authorities",
            bundle.channel_id()
        );
        self.credentials.build_trusted_roots_for_chain(bundle);

        self.transport
            .set_client_root_cas(self.trusted_roots())
            .map_err(|e| ChannelError::TrustRootUpdate {
                channel: bundle.channel_id().to_string(),
                reason: e.to_string(),
            })
    }

    /// The set that would be pushed now: channel roots in channel order,
    /// then static client roots, then static server roots, without
    /// duplicates.
    pub fn trusted_roots(&self) -> Vec<Vec<u8>> {
        let mut seen = BTreeSet::new();
        let by_chain = self.credentials.app_root_cas_by_chain();
        by_chain
            .into_values()
            .flatten()
            .chain(self.tls.client_root_cas.iter().cloned())
            .chain(self.tls.server_root_cas.iter().cloned())
            .filter(|root| seen.insert(root.clone()))
            .collect()
    }
}
