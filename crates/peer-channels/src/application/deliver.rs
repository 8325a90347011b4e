//! Deliver service support: channel lookup and block reading.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::application::channel::ChannelState;
use crate::domain::{ChannelError, ChannelResult, LedgerError};
use crate::ports::outbound::{BlockIterator, PeerLedger};

pub(crate) type ChannelMap = Arc<RwLock<HashMap<String, Arc<ChannelState>>>>;

/// Resolves deliver requests to channels.
#[derive(Clone)]
pub struct DeliverChainManager {
    channels: ChannelMap,
}

impl DeliverChainManager {
    pub(crate) fn new(channels: ChannelMap) -> Self {
        Self { channels }
    }

    /// The channel, if this peer has joined it.
    pub fn chain(&self, channel_id: &str) -> Option<Arc<ChannelState>> {
        self.channels.read().get(channel_id).cloned()
    }
}

/// Read-only block access over a channel ledger.
#[derive(Clone)]
pub struct LedgerBlockReader {
    channel_id: String,
    ledger: Arc<dyn PeerLedger>,
}

impl LedgerBlockReader {
    pub fn new(channel_id: &str, ledger: Arc<dyn PeerLedger>) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            ledger,
        }
    }

    fn ledger_error(&self, source: LedgerError) -> ChannelError {
        ChannelError::Ledger {
            channel: self.channel_id.clone(),
            source,
        }
    }

    pub async fn height(&self) -> ChannelResult<u64> {
        self.ledger
            .blockchain_info()
            .await
            .map(|info| info.height)
            .map_err(|e| self.ledger_error(e))
    }

    /// Blocks from `start` up to the current height.
    pub fn iterator(&self, start: u64) -> ChannelResult<Box<dyn BlockIterator>> {
        self.ledger
            .blocks_iterator(start)
            .map_err(|e| self.ledger_error(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryLedgerProvider;
    use crate::test_utils::genesis_block;
    use shared_types::Block;

    #[tokio::test]
    async fn test_reader_iterates_ledger() {
        let ledgers = InMemoryLedgerProvider::new();
        let ledger = ledgers.seed(
            "ch1",
            vec![genesis_block("ch1"), Block::new(1, [0; 32], vec![])],
        );
        let reader = LedgerBlockReader::new("ch1", ledger);

        assert_eq!(reader.height().await.unwrap(), 2);
        let mut it = reader.iterator(0).unwrap();
        assert_eq!(it.next_block().unwrap().unwrap().number(), 0);
        assert_eq!(it.next_block().unwrap().unwrap().number(), 1);
        assert!(it.next_block().unwrap().is_none());
    }

    #[test]
    fn test_unknown_chain() {
        let manager = DeliverChainManager::new(ChannelMap::default());
        assert!(manager.chain("nope").is_none());
    }
}
