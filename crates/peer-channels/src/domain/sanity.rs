//! Sanity checks run against every bundle before it goes live.

use tracing::{debug, warn};

use super::bundle::ConfigBundle;
use super::errors::{ChannelError, ChannelResult};
use super::policy::{
    BLOCK_VALIDATION, CHANNEL_APPLICATION_ADMINS, CHANNEL_APPLICATION_READERS,
    CHANNEL_APPLICATION_WRITERS, CHANNEL_READERS, CHANNEL_WRITERS,
};

/// Warn about conventional policies missing from the bundle. Missing
/// policies are legal but usually break clients in production.
///
/// Returns the paths that were missing.
pub fn log_sanity_checks(bundle: &ConfigBundle) -> Vec<&'static str> {
    let mut expected = vec![CHANNEL_READERS, CHANNEL_WRITERS];
    if bundle.application_config().is_some() {
        expected.extend([
            CHANNEL_APPLICATION_READERS,
            CHANNEL_APPLICATION_WRITERS,
            CHANNEL_APPLICATION_ADMINS,
        ]);
    }
    if bundle.orderer_config().is_some() {
        expected.push(BLOCK_VALIDATION);
    }

    let pm = bundle.policy_manager();
    let mut missing = Vec::new();
    for path in expected {
        if pm.get_policy(path).is_some() {
            debug!("[{}] found expected policy {}", bundle.channel_id(), path);
        } else {
            warn!(
                channel = %bundle.channel_id(),
                "Current configuration has no policy '{}', this will likely cause problems in production systems",
                path
            );
            missing.push(path);
        }
    }
    missing
}

/// Check that `next` may replace `current`.
pub fn validate_new_bundle(current: &ConfigBundle, next: &ConfigBundle) -> ChannelResult<()> {
    if current.channel_id() != next.channel_id() {
        return Err(ChannelError::InvalidConfig {
            channel: current.channel_id().to_string(),
            reason: format!(
                "configuration for channel {} cannot replace this channel's configuration",
                next.channel_id()
            ),
        });
    }

    if let (Some(old), Some(new)) = (current.orderer_config(), next.orderer_config()) {
        if old.consensus_type != new.consensus_type {
            return Err(ChannelError::InvalidConfig {
                channel: current.channel_id().to_string(),
                reason: format!(
                    "attempted to change consensus type from {} to {}",
                    old.consensus_type, new.consensus_type
                ),
            });
        }
    }
    Ok(())
}

/// Check that `next` carries the sequence directly after `current`.
pub fn check_next_sequence(current: &ConfigBundle, next: &ConfigBundle) -> ChannelResult<()> {
    let channel = current.channel_id().to_string();
    let Some(expected) = current.sequence().checked_add(1) else {
        return Err(ChannelError::InvalidConfig {
            channel,
            reason: format!("config sequence {} cannot be advanced", current.sequence()),
        });
    };
    if next.sequence() != expected {
        return Err(ChannelError::SequenceMismatch {
            channel,
            expected,
            actual: next.sequence(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{ApplicationGroup, ChannelConfig, OrdererGroup, Policy};

    fn bundle(channel: &str, consensus: Option<&str>) -> ConfigBundle {
        bundle_at(channel, consensus, 0)
    }

    fn bundle_at(channel: &str, consensus: Option<&str>, sequence: u64) -> ConfigBundle {
        let mut config = ChannelConfig {
            application: Some(ApplicationGroup::default()),
            orderer: consensus.map(|c| OrdererGroup {
                consensus_type: c.to_string(),
                ..Default::default()
            }),
            sequence,
            ..Default::default()
        };
        config
            .policies
            .insert(CHANNEL_READERS.into(), Policy::Signature("OR('A.member')".into()));
        ConfigBundle::new(channel, config).unwrap()
    }

    #[test]
    fn test_reports_missing_policies() {
        let missing = log_sanity_checks(&bundle("ch1", Some("etcdraft")));
        assert!(!missing.contains(&CHANNEL_READERS));
        assert!(missing.contains(&CHANNEL_WRITERS));
        assert!(missing.contains(&CHANNEL_APPLICATION_ADMINS));
        assert!(missing.contains(&BLOCK_VALIDATION));
    }

    #[test]
    fn test_no_orderer_policy_expected_without_orderer_group() {
        let missing = log_sanity_checks(&bundle("ch1", None));
        assert!(!missing.contains(&BLOCK_VALIDATION));
    }

    #[test]
    fn test_consensus_type_change_rejected() {
        let err = validate_new_bundle(&bundle("ch1", Some("etcdraft")), &bundle("ch1", Some("solo")))
            .unwrap_err();
        assert!(err.to_string().contains("consensus type"));
    }

    #[test]
    fn test_channel_mismatch_rejected() {
        assert!(validate_new_bundle(&bundle("ch1", None), &bundle("ch2", None)).is_err());
        assert!(validate_new_bundle(&bundle("ch1", None), &bundle("ch1", None)).is_ok());
    }

    #[test]
    fn test_sequence_must_advance_by_one() {
        let current = bundle_at("ch1", None, 3);
        assert!(check_next_sequence(&current, &bundle_at("ch1", None, 4)).is_ok());
        assert!(matches!(
            check_next_sequence(&current, &bundle_at("ch1", None, 3)),
            Err(ChannelError::SequenceMismatch { expected: 4, actual: 3, .. })
        ));
    }

    #[test]
    fn test_exhausted_sequence_rejected() {
        let current = bundle_at("ch1", None, u64::MAX);
        for next in [0, u64::MAX] {
            let err = check_next_sequence(&current, &bundle_at("ch1", None, next)).unwrap_err();
            assert!(matches!(err, ChannelError::InvalidConfig { .. }));
        }
    }
}
