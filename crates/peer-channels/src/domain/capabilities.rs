//! Capability support of this peer.
//!
//! A channel whose configuration requires a capability the peer does not
//! implement is never admitted: processing it could fork the peer's state
//! from the rest of the network.

use std::collections::BTreeSet;

use super::bundle::ConfigBundle;
use super::errors::{ChannelError, ChannelResult};

/// Channel-group capabilities this peer implements.
pub const SUPPORTED_CHANNEL_CAPABILITIES: &[&str] = &["V1_3", "V1_4_2", "V1_4_3", "V2_0"];

/// Application-group capabilities this peer implements.
pub const SUPPORTED_APPLICATION_CAPABILITIES: &[&str] =
    &["V1_1", "V1_2", "V1_3", "V1_4_2", "V2_0"];

/// Fail unless every channel and application capability is supported and
/// the bundle has an application group at all.
pub fn check_supported(bundle: &ConfigBundle) -> ChannelResult<()> {
    let channel = bundle.channel_id();

    let app = bundle
        .application_config()
        .ok_or_else(|| ChannelError::InvalidConfig {
            channel: channel.to_string(),
            reason: "does not have application config so is incompatible".to_string(),
        })?;

    first_unsupported(&app.capabilities, SUPPORTED_APPLICATION_CAPABILITIES)
        .map_or(Ok(()), |capability| {
            Err(ChannelError::UnsupportedCapability {
                channel: channel.to_string(),
                group: "application",
                capability,
            })
        })?;

    first_unsupported(bundle.channel_capabilities(), SUPPORTED_CHANNEL_CAPABILITIES)
        .map_or(Ok(()), |capability| {
            Err(ChannelError::UnsupportedCapability {
                channel: channel.to_string(),
                group: "channel",
                capability,
            })
        })
}

fn first_unsupported(required: &BTreeSet<String>, supported: &[&str]) -> Option<String> {
    required
        .iter()
        .find(|cap| !supported.contains(&cap.as_str()))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{ApplicationGroup, ChannelConfig};

    fn bundle(app_caps: &[&str], channel_caps: &[&str], with_app: bool) -> ConfigBundle {
        let mut config = ChannelConfig::default();
        config.channel.capabilities = channel_caps.iter().map(|c| c.to_string()).collect();
        if with_app {
            config.application = Some(ApplicationGroup {
                capabilities: app_caps.iter().map(|c| c.to_string()).collect(),
                ..Default::default()
            });
        }
        ConfigBundle::new("ch1", config).unwrap()
    }

    #[test]
    fn test_supported_capabilities_pass() {
        assert!(check_supported(&bundle(&["V2_0"], &["V2_0"], true)).is_ok());
    }

    #[test]
    fn test_unsupported_application_capability() {
        let err = check_supported(&bundle(&["V9_9"], &["V2_0"], true)).unwrap_err();
        assert!(matches!(
            err,
            ChannelError::UnsupportedCapability { group: "application", ref capability, .. }
                if capability == "V9_9"
        ));
    }

    #[test]
    fn test_unsupported_channel_capability() {
        let err = check_supported(&bundle(&[], &["V3_0"], true)).unwrap_err();
        assert!(matches!(
            err,
            ChannelError::UnsupportedCapability { group: "channel", .. }
        ));
    }

    #[test]
    fn test_missing_application_group() {
        let err = check_supported(&bundle(&[], &[], false)).unwrap_err();
        assert!(err.to_string().contains("does not have application config"));
    }
}
