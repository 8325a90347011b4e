//! # Configuration Bundle
//!
//! An immutable, validated snapshot of one channel's configuration. A
//! configuration change never edits a bundle; it builds a new one and
//! publishes it through the channel's [`BundleSource`](super::BundleSource).
//!
//! ## Structural validation
//!
//! | Check | Failure |
//! |-------|---------|
//! | Channel id is 1-249 chars of `[a-z0-9.-]`, starting with a letter | `InvalidConfig` |
//! | Every organization has an MSP id and at least one root cert | `InvalidConfig` |
//! | No MSP id appears twice | `InvalidConfig` |
//! | Signature policies are non-empty | `InvalidConfig` |

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use shared_types::{ApplicationGroup, ChannelConfig, Envelope, OrdererGroup, Policy};

use super::errors::{ChannelError, ChannelResult};
use super::msp::MspManager;
use super::policy::PolicyManager;

const MAX_CHANNEL_ID_LEN: usize = 249;

/// Immutable snapshot of a channel configuration.
#[derive(Debug, Clone)]
pub struct ConfigBundle {
    channel_id: String,
    config: ChannelConfig,
    policy_manager: Arc<PolicyManager>,
    msp_manager: Arc<MspManager>,
}

impl ConfigBundle {
    /// Validate `config` and build a bundle for `channel_id`.
    pub fn new(channel_id: &str, config: ChannelConfig) -> ChannelResult<Self> {
        validate_channel_id(channel_id)?;
        validate_organizations(channel_id, &config)?;
        validate_policies(channel_id, &config)?;

        let policy_manager = Arc::new(PolicyManager::new(channel_id, config.policies.clone()));
        let msp_manager = Arc::new(MspManager::new(config.organizations()));

        Ok(Self {
            channel_id: channel_id.to_string(),
            config,
            policy_manager,
            msp_manager,
        })
    }

    /// Build a bundle from a `Config` envelope; the channel id comes from
    /// the envelope header.
    pub fn from_envelope(envelope: &Envelope) -> ChannelResult<Self> {
        let channel_id = envelope.header.channel_id.as_str();
        let config_envelope =
            envelope
                .config_envelope()
                .map_err(|source| ChannelError::ConfigDecode {
                    channel: channel_id.to_string(),
                    source,
                })?;
        Self::new(channel_id, config_envelope.config)
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn sequence(&self) -> u64 {
        self.config.sequence
    }

    /// The raw configuration this bundle was built from.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn application_config(&self) -> Option<&ApplicationGroup> {
        self.config.application.as_ref()
    }

    pub fn orderer_config(&self) -> Option<&OrdererGroup> {
        self.config.orderer.as_ref()
    }

    pub fn orderer_addresses(&self) -> &[String] {
        &self.config.channel.orderer_addresses
    }

    pub fn channel_capabilities(&self) -> &BTreeSet<String> {
        &self.config.channel.capabilities
    }

    pub fn policy_manager(&self) -> Arc<PolicyManager> {
        Arc::clone(&self.policy_manager)
    }

    pub fn msp_manager(&self) -> Arc<MspManager> {
        Arc::clone(&self.msp_manager)
    }

    /// MSP ids of the application organizations.
    pub fn application_msp_ids(&self) -> Vec<String> {
        self.application_config()
            .map(|app| app.organizations.iter().map(|o| o.msp_id.clone()).collect())
            .unwrap_or_default()
    }
}

fn validate_channel_id(channel_id: &str) -> ChannelResult<()> {
    let invalid = |reason: &str| ChannelError::InvalidConfig {
        channel: channel_id.to_string(),
        reason: reason.to_string(),
    };

    if channel_id.is_empty() {
        return Err(invalid("channel id is empty"));
    }
    if channel_id.len() > MAX_CHANNEL_ID_LEN {
        return Err(invalid("channel id is longer than 249 characters"));
    }
    if !channel_id.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(invalid("channel id must start with a lowercase letter"));
    }
    let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-';
    if !channel_id.chars().all(allowed) {
        return Err(invalid("channel id contains characters outside [a-z0-9.-]"));
    }
    Ok(())
}

fn validate_organizations(channel_id: &str, config: &ChannelConfig) -> ChannelResult<()> {
    let mut seen = HashSet::new();
    for org in config.organizations() {
        let reason = if org.msp_id.is_empty() {
            Some(format!("organization {} has no MSP id", org.name))
        } else if org.root_certs.is_empty() {
            Some(format!("MSP {} has no root certificates", org.msp_id))
        } else if !seen.insert(org.msp_id.as_str()) {
            Some(format!("MSP {} is defined more than once", org.msp_id))
        } else {
            None
        };

        if let Some(reason) = reason {
            return Err(ChannelError::InvalidConfig {
                channel: channel_id.to_string(),
                reason,
            });
        }
    }
    Ok(())
}

fn validate_policies(channel_id: &str, config: &ChannelConfig) -> ChannelResult<()> {
    for (path, policy) in &config.policies {
        let empty = match policy {
            Policy::Signature(expr) => expr.trim().is_empty(),
            Policy::ImplicitMeta { sub_policy, .. } => sub_policy.is_empty(),
        };
        if empty {
            return Err(ChannelError::InvalidConfig {
                channel: channel_id.to_string(),
                reason: format!("policy {path} has an empty rule"),
            });
        }
    }
    Ok(())
}
