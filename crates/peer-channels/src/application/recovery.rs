//! # Startup Recovery
//!
//! Locating the configuration a persisted channel should be rebuilt from.
//! The last block's metadata points at the most recent config block.

use shared_types::Block;
use tracing::debug;

use crate::domain::{ChannelError, ChannelResult, LedgerError};
use crate::ports::outbound::PeerLedger;

/// Outcome of rebuilding persisted channels at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Channels rebuilt and registered, in ledger order.
    pub recovered: Vec<String>,
    /// Channels skipped, with the reason.
    pub skipped: Vec<(String, String)>,
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// The most recent config block of `ledger`.
pub async fn config_block_from_ledger(
    channel_id: &str,
    ledger: &dyn PeerLedger,
) -> ChannelResult<Block> {
    let ledger_error = |source: LedgerError| ChannelError::Ledger {
        channel: channel_id.to_string(),
        source,
    };

    let info = ledger.blockchain_info().await.map_err(ledger_error)?;
    let last = info
        .height
        .checked_sub(1)
        .ok_or(LedgerError::BlockNotFound(0))
        .map_err(ledger_error)?;

    let tip = ledger.block_by_number(last).await.map_err(ledger_error)?;
    let index = tip.last_config_index()?;
    debug!(
        "[{}] last config block is {} (ledger height {})",
        channel_id, index, info.height
    );

    ledger.block_by_number(index).await.map_err(ledger_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryLedgerProvider;
    use crate::test_utils::{genesis_block, genesis_block_with, ConfigBuilder};
    use shared_types::Envelope;

    #[tokio::test]
    async fn test_follows_last_config_pointer() {
        let ledgers = InMemoryLedgerProvider::new();
        let update = ConfigBuilder::new().sequence(1).build();
        let ledger = ledgers.seed(
            "ch1",
            vec![
                genesis_block("ch1"),
                Block::new(1, [0; 32], vec![Envelope::config("ch1", update).unwrap()])
                    .with_last_config_index(1),
                Block::new(2, [0; 32], vec![]).with_last_config_index(1),
            ],
        );

        let block = config_block_from_ledger("ch1", ledger.as_ref()).await.unwrap();

        assert_eq!(block.number(), 1);
        assert!(block.is_config_block());
    }

    #[tokio::test]
    async fn test_missing_pointer_fails() {
        let ledgers = InMemoryLedgerProvider::new();
        let ledger = ledgers.seed(
            "ch1",
            vec![genesis_block_with("ch1", ConfigBuilder::new()), Block::new(1, [0; 32], vec![])],
        );

        let err = config_block_from_ledger("ch1", ledger.as_ref()).await.unwrap_err();

        assert!(matches!(err, ChannelError::InvalidBlock(_)));
    }

    #[tokio::test]
    async fn test_empty_ledger_fails() {
        let ledgers = InMemoryLedgerProvider::new();
        let ledger = ledgers.seed("ch1", vec![]);

        assert!(matches!(
            config_block_from_ledger("ch1", ledger.as_ref()).await,
            Err(ChannelError::Ledger { .. })
        ));
    }

    #[test]
    fn test_report_clean() {
        let mut report = RecoveryReport::default();
        assert!(report.is_clean());
        report.skipped.push(("ch1".into(), "boom".into()));
        assert!(!report.is_clean());
    }
}
