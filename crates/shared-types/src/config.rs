//! # Channel Configuration Tree
//!
//! The raw configuration of a channel as carried in config blocks and as
//! persisted in the ledger's state database. The peer never edits these
//! values; it parses them into an immutable bundle.
//!
//! ```text
//! ChannelConfig
//! ├── channel       orderer addresses, capabilities, hashing
//! ├── application   application orgs (MSPs, anchor peers), capabilities, ACLs
//! ├── orderer       orderer orgs, consensus type, capabilities
//! └── policies      full path ("/Channel/Application/Readers") -> policy
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Namespace of the persisted channel configuration in the state database.
pub const CHANNEL_CONFIG_NAMESPACE: &str = "";

/// State key under which the committed channel configuration is persisted.
pub const CHANNEL_CONFIG_KEY: &str = "resourcesconfigtx.CHANNEL_CONFIG_KEY";

/// Complete configuration of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChannelConfig {
    /// Incremented by one on every committed configuration transaction.
    pub sequence: u64,
    pub channel: ChannelGroup,
    pub application: Option<ApplicationGroup>,
    pub orderer: Option<OrdererGroup>,
    /// Policies keyed by their full path.
    pub policies: BTreeMap<String, Policy>,
}

/// Channel-level values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChannelGroup {
    /// `host:port` endpoints of the ordering service.
    pub orderer_addresses: Vec<String>,
    pub capabilities: BTreeSet<String>,
    pub hashing_algorithm: String,
}

/// Application group: the organizations that run peers on the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ApplicationGroup {
    pub organizations: Vec<OrganizationConfig>,
    pub capabilities: BTreeSet<String>,
    /// Resource name -> policy path.
    pub acls: BTreeMap<String, String>,
}

/// Orderer group: the organizations that run the ordering service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OrdererGroup {
    pub organizations: Vec<OrganizationConfig>,
    pub consensus_type: String,
    pub capabilities: BTreeSet<String>,
}

/// Membership service provider flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MspType {
    /// X.509 certificate based MSP.
    #[default]
    X509,
    /// Anonymous-credential MSP; carries no TLS material.
    Idemix,
}

/// One organization's MSP definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OrganizationConfig {
    pub name: String,
    pub msp_id: String,
    pub msp_type: MspType,
    pub root_certs: Vec<Vec<u8>>,
    pub intermediate_certs: Vec<Vec<u8>>,
    pub tls_root_certs: Vec<Vec<u8>>,
    pub tls_intermediate_certs: Vec<Vec<u8>>,
    pub anchor_peers: Vec<AnchorPeer>,
}

/// Peer endpoint advertised for cross-organization gossip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorPeer {
    pub host: String,
    pub port: u16,
}

/// A policy definition. Evaluation belongs to the policy engine; the peer
/// only carries definitions around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Policy {
    /// Signature policy expression, e.g. `OR('Org1MSP.member')`.
    Signature(String),
    /// Aggregation over the same-named sub-policies of child groups.
    ImplicitMeta {
        rule: ImplicitMetaRule,
        sub_policy: String,
    },
}

/// Aggregation rule of an implicit meta policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImplicitMetaRule {
    Any,
    All,
    Majority,
}

impl ChannelConfig {
    /// Iterate over every organization, application orgs first.
    pub fn organizations(&self) -> impl Iterator<Item = &OrganizationConfig> {
        let app = self
            .application
            .iter()
            .flat_map(|group| group.organizations.iter());
        let ord = self
            .orderer
            .iter()
            .flat_map(|group| group.organizations.iter());
        app.chain(ord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_organizations_iterates_both_groups() {
        let config = ChannelConfig {
            application: Some(ApplicationGroup {
                organizations: vec![OrganizationConfig {
                    msp_id: "Org1MSP".into(),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            orderer: Some(OrdererGroup {
                organizations: vec![OrganizationConfig {
                    msp_id: "OrdererMSP".into(),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        };
        let ids: Vec<_> = config.organizations().map(|o| o.msp_id.as_str()).collect();
        assert_eq!(ids, vec!["Org1MSP", "OrdererMSP"]);
    }

    #[test]
    fn test_persisted_config_roundtrip() {
        let mut config = ChannelConfig::default();
        config.sequence = 9;
        config.policies.insert(
            "/Channel/Readers".into(),
            Policy::ImplicitMeta {
                rule: ImplicitMetaRule::Any,
                sub_policy: "Readers".into(),
            },
        );
        let bytes = crate::encode(&config).unwrap();
        let decoded: ChannelConfig = crate::decode(&bytes).unwrap();
        assert_eq!(decoded, config);
    }
}
