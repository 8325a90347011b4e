//! # Transaction Validator
//!
//! Validates every transaction of a block concurrently. Each transaction
//! holds one slot of the peer-wide [`ValidationCoordinator`] while it runs,
//! so the number of transactions in flight across all channels stays within
//! the configured pool size.
//!
//! ## Per-transaction steps
//!
//! 1. Channel header must name this channel.
//! 2. Config transactions must apply on top of the current configuration.
//! 3. Endorser transactions: reject system chaincodes that cannot be invoked
//!    externally, resolve validation info (current lifecycle, then legacy),
//!    resolve the plugin and run it on a blocking thread.
//!
//! A transaction that breaks a rule is flagged. A failure to run the rules
//! at all fails the whole block so it can be retried.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures::future::join_all;
use shared_types::{Block, Envelope, HeaderType};
use tracing::{debug, warn};

use crate::application::channel::ChannelState;
use crate::application::coordinator::ValidationCoordinator;
use crate::application::shims::{CollectionInfoShim, ValidationInfoRetrieveShim};
use crate::domain::{
    ChannelError, ChannelResult, LifecycleError, PluginError, PolicyManager, TxValidationCode,
    TxValidationFlags,
};
use crate::ports::inbound::BlockValidator;
use crate::ports::outbound::{PluginContext, PluginMapper, SystemChaincodeProvider};

/// Live lookup of a channel's current policy manager.
pub trait PolicyManagerGetter: Send + Sync {
    fn policy_manager(&self, channel_id: &str) -> Option<Arc<PolicyManager>>;
}

impl<F> PolicyManagerGetter for F
where
    F: Fn(&str) -> Option<Arc<PolicyManager>> + Send + Sync,
{
    fn policy_manager(&self, channel_id: &str) -> Option<Arc<PolicyManager>> {
        self(channel_id)
    }
}

/// Block validator of one channel.
pub struct TxValidator {
    channel_id: String,
    coordinator: ValidationCoordinator,
    channel: Weak<ChannelState>,
    validation_info: ValidationInfoRetrieveShim,
    collections: Arc<CollectionInfoShim>,
    sccp: Arc<dyn SystemChaincodeProvider>,
    plugins: Arc<dyn PluginMapper>,
    policy_managers: Arc<dyn PolicyManagerGetter>,
}

impl TxValidator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        channel_id: &str,
        coordinator: ValidationCoordinator,
        channel: Weak<ChannelState>,
        validation_info: ValidationInfoRetrieveShim,
        collections: Arc<CollectionInfoShim>,
        sccp: Arc<dyn SystemChaincodeProvider>,
        plugins: Arc<dyn PluginMapper>,
        policy_managers: Arc<dyn PolicyManagerGetter>,
    ) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            coordinator,
            channel,
            validation_info,
            collections,
            sccp,
            plugins,
            policy_managers,
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    async fn validate_tx(
        &self,
        block_number: u64,
        tx_index: usize,
        envelope: &Envelope,
    ) -> ChannelResult<TxValidationCode> {
        let _permit = self.coordinator.acquire().await?;

        if envelope.header.channel_id != self.channel_id {
            debug!(
                "[{}] tx {} of block {} names channel {}",
                self.channel_id, tx_index, block_number, envelope.header.channel_id
            );
            return Ok(TxValidationCode::BadChannelHeader);
        }

        match envelope.header.header_type {
            HeaderType::Config => self.validate_config_tx(block_number, tx_index, envelope),
            HeaderType::EndorserTransaction => {
                self.validate_endorser_tx(block_number, tx_index, envelope)
                    .await
            }
            HeaderType::ConfigUpdate | HeaderType::Message => {
                Ok(TxValidationCode::UnsupportedTxPayload)
            }
        }
    }

    fn validate_config_tx(
        &self,
        block_number: u64,
        tx_index: usize,
        envelope: &Envelope,
    ) -> ChannelResult<TxValidationCode> {
        let channel = self
            .channel
            .upgrade()
            .ok_or_else(|| ChannelError::UnknownChannel(self.channel_id.clone()))?;

        match channel.check_config_update(envelope) {
            Ok(_) => Ok(TxValidationCode::Valid),
            Err(e) => {
                warn!(
                    channel = %self.channel_id,
                    block = block_number,
                    tx = tx_index,
                    "Config transaction rejected: {}",
                    e
                );
                Ok(TxValidationCode::InvalidConfigTransaction)
            }
        }
    }

    async fn validate_endorser_tx(
        &self,
        block_number: u64,
        tx_index: usize,
        envelope: &Envelope,
    ) -> ChannelResult<TxValidationCode> {
        let execution_failure = |reason: String| ChannelError::Validation {
            channel: self.channel_id.clone(),
            block: block_number,
            reason,
        };

        let Some(chaincode) = envelope.header.chaincode.as_deref() else {
            return Ok(TxValidationCode::InvalidChaincode);
        };

        if self.sccp.is_sys_cc_and_not_invokable_external(chaincode) {
            return Ok(TxValidationCode::IllegalSystemChaincode);
        }

        let info = match self.validation_info.validation_info(&self.channel_id, chaincode) {
            Ok(Some(info)) => info,
            Ok(None) => {
                debug!(
                    "[{}] no definition for chaincode {} in tx {}",
                    self.channel_id, chaincode, tx_index
                );
                return Ok(TxValidationCode::InvalidChaincode);
            }
            Err(LifecycleError::Invalid(reason)) => {
                debug!("[{}] chaincode {}: {}", self.channel_id, chaincode, reason);
                return Ok(TxValidationCode::InvalidChaincode);
            }
            Err(e @ LifecycleError::Unexpected(_)) => return Err(execution_failure(e.to_string())),
        };

        let plugin = self
            .plugins
            .plugin(&info.plugin)
            .ok_or_else(|| execution_failure(format!("plugin {} not found", info.plugin)))?;

        let policy_manager = self
            .policy_managers
            .policy_manager(&self.channel_id)
            .ok_or_else(|| ChannelError::UnknownChannel(self.channel_id.clone()))?;

        let ctx = PluginContext {
            channel_id: self.channel_id.clone(),
            block_number,
            tx_index,
            envelope: envelope.clone(),
            args: info.args,
            policy_manager,
            collections: self.collections.clone(),
        };

        let outcome = tokio::task::spawn_blocking(move || plugin.validate(&ctx))
            .await
            .map_err(|e| execution_failure(format!("plugin task failed: {e}")))?;

        match outcome {
            Ok(()) => Ok(TxValidationCode::Valid),
            Err(PluginError::Invalid(reason)) => {
                debug!(
                    "[{}] tx {} of block {} rejected by {}: {}",
                    self.channel_id, tx_index, block_number, info.plugin, reason
                );
                Ok(TxValidationCode::EndorsementPolicyFailure)
            }
            Err(e @ PluginError::Execution(_)) => Err(execution_failure(e.to_string())),
        }
    }
}

#[async_trait]
impl BlockValidator for TxValidator {
    async fn validate(&self, block: &Block) -> ChannelResult<TxValidationFlags> {
        let number = block.number();
        let results = join_all(
            block
                .data
                .envelopes
                .iter()
                .enumerate()
                .map(|(index, envelope)| self.validate_tx(number, index, envelope)),
        )
        .await;

        let flags = results.into_iter().collect::<ChannelResult<TxValidationFlags>>()?;
        debug!(
            "[{}] validated block {}: {} of {} transactions invalid",
            self.channel_id,
            number,
            flags.invalid_count(),
            flags.len()
        );
        Ok(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        AcceptPlugin, ConfigBuilder, RejectPlugin, StaticLifecycle, StaticPluginMapper,
        StaticSystemChaincodes,
    };
    use crate::ports::outbound::ValidationInfo;
    use shared_types::ChannelHeader;

    fn validator_with(lifecycle: StaticLifecycle, workers: usize) -> TxValidator {
        let lifecycle = Arc::new(lifecycle);
        let bundle = ConfigBuilder::new().bundle("ch1");
        let pm = bundle.policy_manager();
        let plugins = StaticPluginMapper::new()
            .with("accept", Arc::new(AcceptPlugin))
            .with("reject", Arc::new(RejectPlugin));
        TxValidator::new(
            "ch1",
            ValidationCoordinator::new(workers),
            Weak::new(),
            ValidationInfoRetrieveShim::new(lifecycle.clone(), Arc::new(StaticLifecycle::new())),
            Arc::new(CollectionInfoShim::new(lifecycle, "ch1")),
            Arc::new(StaticSystemChaincodes::new(&["lscc"], &["cscc"])),
            Arc::new(plugins),
            Arc::new(move |_: &str| Some(pm.clone())),
        )
    }

    fn lifecycle() -> StaticLifecycle {
        StaticLifecycle::new()
            .with_info(
                "good",
                ValidationInfo {
                    plugin: "accept".into(),
                    args: vec![],
                },
            )
            .with_info(
                "bad",
                ValidationInfo {
                    plugin: "reject".into(),
                    args: vec![],
                },
            )
            .with_info(
                "lost",
                ValidationInfo {
                    plugin: "missing".into(),
                    args: vec![],
                },
            )
    }

    fn tx(channel: &str, chaincode: &str) -> Envelope {
        Envelope::endorser_transaction(channel, "tx", chaincode, vec![])
    }

    #[tokio::test]
    async fn test_flags_per_transaction() {
        let validator = validator_with(lifecycle(), 2);
        let message = Envelope {
            header: ChannelHeader {
                channel_id: "ch1".into(),
                tx_id: "m".into(),
                header_type: HeaderType::Message,
                chaincode: None,
            },
            payload: vec![],
        };
        let block = Block::new(
            3,
            [0; 32],
            vec![
                tx("ch1", "good"),
                tx("ch1", "bad"),
                tx("other", "good"),
                tx("ch1", "undefined"),
                tx("ch1", "cscc"),
                message,
            ],
        );

        let flags = validator.validate(&block).await.unwrap();

        assert_eq!(
            flags.iter().collect::<Vec<_>>(),
            vec![
                TxValidationCode::Valid,
                TxValidationCode::EndorsementPolicyFailure,
                TxValidationCode::BadChannelHeader,
                TxValidationCode::InvalidChaincode,
                TxValidationCode::IllegalSystemChaincode,
                TxValidationCode::UnsupportedTxPayload,
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_plugin_fails_block() {
        let validator = validator_with(lifecycle(), 1);
        let block = Block::new(1, [0; 32], vec![tx("ch1", "good"), tx("ch1", "lost")]);

        let err = validator.validate(&block).await.unwrap_err();

        assert!(matches!(err, ChannelError::Validation { block: 1, .. }));
    }

    #[tokio::test]
    async fn test_unexpected_lifecycle_error_fails_block() {
        let lifecycle = StaticLifecycle::new()
            .with_error("flaky", LifecycleError::Unexpected("db down".into()));
        let validator = validator_with(lifecycle, 1);
        let block = Block::new(1, [0; 32], vec![tx("ch1", "flaky")]);

        assert!(validator.validate(&block).await.is_err());
    }

    #[tokio::test]
    async fn test_config_tx_without_channel_fails_block() {
        let validator = validator_with(lifecycle(), 1);
        let config = ConfigBuilder::new().sequence(1).build();
        let block = Block::new(1, [0; 32], vec![Envelope::config("ch1", config).unwrap()]);

        assert!(matches!(
            validator.validate(&block).await,
            Err(ChannelError::UnknownChannel(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_permits_returned_after_block() {
        let validator = validator_with(lifecycle(), 2);
        let block = Block::new(1, [0; 32], (0..10).map(|_| tx("ch1", "good")).collect());

        let flags = validator.validate(&block).await.unwrap();

        assert_eq!(flags.invalid_count(), 0);
        assert_eq!(validator.coordinator.available(), 2);
    }
}
