//! # Membership Service Providers
//!
//! The MSP manager of a bundle: one entry per organization defined in the
//! channel configuration. Certificate parsing is out of scope; the manager
//! only knows which MSPs exist and which trust material they carry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shared_types::{MspType, OrganizationConfig};

use super::errors::MspError;

/// Trust material of one organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Msp {
    pub msp_id: String,
    pub msp_type: MspType,
    pub root_certs: Vec<Vec<u8>>,
    pub intermediate_certs: Vec<Vec<u8>>,
    pub tls_root_certs: Vec<Vec<u8>>,
    pub tls_intermediate_certs: Vec<Vec<u8>>,
}

impl From<&OrganizationConfig> for Msp {
    fn from(org: &OrganizationConfig) -> Self {
        Self {
            msp_id: org.msp_id.clone(),
            msp_type: org.msp_type,
            root_certs: org.root_certs.clone(),
            intermediate_certs: org.intermediate_certs.clone(),
            tls_root_certs: org.tls_root_certs.clone(),
            tls_intermediate_certs: org.tls_intermediate_certs.clone(),
        }
    }
}

/// Identity as carried in transaction headers and gossip messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedIdentity {
    pub msp_id: String,
    pub id_bytes: Vec<u8>,
}

/// An identity resolved against a channel's MSPs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub msp_id: String,
    pub id_bytes: Vec<u8>,
}

/// Resolves serialized identities for one channel.
pub trait IdentityDeserializer: Send + Sync {
    fn deserialize_identity(&self, serialized: &[u8]) -> Result<Identity, MspError>;
}

/// All MSPs of one channel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MspManager {
    msps: BTreeMap<String, Msp>,
}

impl MspManager {
    pub fn new<'a>(orgs: impl IntoIterator<Item = &'a OrganizationConfig>) -> Self {
        let msps = orgs
            .into_iter()
            .map(|org| (org.msp_id.clone(), Msp::from(org)))
            .collect();
        Self { msps }
    }

    pub fn msp(&self, msp_id: &str) -> Option<&Msp> {
        self.msps.get(msp_id)
    }

    pub fn msps(&self) -> impl Iterator<Item = &Msp> {
        self.msps.values()
    }

    pub fn msp_ids(&self) -> Vec<String> {
        self.msps.keys().cloned().collect()
    }
}

impl IdentityDeserializer for MspManager {
    fn deserialize_identity(&self, serialized: &[u8]) -> Result<Identity, MspError> {
        let sid: SerializedIdentity =
            shared_types::decode(serialized).map_err(|e| MspError::Decode(e.to_string()))?;
        if !self.msps.contains_key(&sid.msp_id) {
            return Err(MspError::UnknownMsp(sid.msp_id));
        }
        Ok(Identity {
            msp_id: sid.msp_id,
            id_bytes: sid.id_bytes,
        })
    }
}
