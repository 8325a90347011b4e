//! In-memory ledger.
//!
//! Keeps every block and a flat key-value state. Committing a config block
//! also records the channel configuration under the well-known state key,
//! which is where channel construction looks first.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{
    Block, BlockchainInfo, ChannelConfig, CHANNEL_CONFIG_KEY, CHANNEL_CONFIG_NAMESPACE,
};
use tracing::warn;

use crate::domain::LedgerError;
use crate::ports::outbound::{BlockIterator, LedgerProvider, PeerLedger, QueryExecutor};

type StateKey = (String, String);

/// Ledger provider holding every ledger in memory.
#[derive(Default)]
pub struct InMemoryLedgerProvider {
    ledgers: RwLock<BTreeMap<String, Arc<InMemoryLedger>>>,
    fail_enumeration: AtomicBool,
}

impl InMemoryLedgerProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a ledger holding `blocks` as if it had been persisted by a
    /// previous run.
    pub fn seed(&self, channel_id: &str, blocks: Vec<Block>) -> Arc<InMemoryLedger> {
        let ledger = Arc::new(InMemoryLedger::new(channel_id));
        for block in blocks {
            ledger.append(block);
        }
        self.ledgers
            .write()
            .insert(channel_id.to_string(), Arc::clone(&ledger));
        ledger
    }

    /// The concrete ledger, for inspection.
    pub fn get(&self, channel_id: &str) -> Option<Arc<InMemoryLedger>> {
        self.ledgers.read().get(channel_id).cloned()
    }

    /// Make `ledger_ids` fail.
    pub fn fail_enumeration(&self, fail: bool) {
        self.fail_enumeration.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerProvider for InMemoryLedgerProvider {
    async fn create_ledger(&self, genesis: &Block) -> Result<Arc<dyn PeerLedger>, LedgerError> {
        let channel_id = genesis
            .channel_id()
            .map_err(|e| LedgerError::Storage(e.to_string()))?
            .to_string();

        let mut ledgers = self.ledgers.write();
        if ledgers.contains_key(&channel_id) {
            return Err(LedgerError::AlreadyExists(channel_id));
        }
        let ledger = Arc::new(InMemoryLedger::new(&channel_id));
        ledger.append(genesis.clone());
        ledgers.insert(channel_id, Arc::clone(&ledger));
        Ok(ledger)
    }

    async fn open_ledger(&self, channel_id: &str) -> Result<Arc<dyn PeerLedger>, LedgerError> {
        self.get(channel_id)
            .map(|l| l as Arc<dyn PeerLedger>)
            .ok_or_else(|| LedgerError::NotFound(channel_id.to_string()))
    }

    async fn ledger_ids(&self) -> Result<Vec<String>, LedgerError> {
        if self.fail_enumeration.load(Ordering::SeqCst) {
            return Err(LedgerError::Storage("ledger index unavailable".into()));
        }
        Ok(self.ledgers.read().keys().cloned().collect())
    }
}

/// One channel's blocks and state.
pub struct InMemoryLedger {
    channel_id: String,
    blocks: RwLock<Vec<Block>>,
    state: Arc<RwLock<HashMap<StateKey, Vec<u8>>>>,
}

impl InMemoryLedger {
    fn new(channel_id: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            blocks: RwLock::new(Vec::new()),
            state: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn height(&self) -> u64 {
        self.blocks.read().len() as u64
    }

    pub fn put_state(&self, namespace: &str, key: &str, value: Vec<u8>) {
        self.state
            .write()
            .insert((namespace.to_string(), key.to_string()), value);
    }

    pub fn delete_state(&self, namespace: &str, key: &str) {
        self.state
            .write()
            .remove(&(namespace.to_string(), key.to_string()));
    }

    fn append(&self, block: Block) {
        if block.is_config_block() {
            self.record_config(&block);
        }
        self.blocks.write().push(block);
    }

    fn record_config(&self, block: &Block) {
        let encoded = block
            .extract_envelope(0)
            .and_then(|envelope| envelope.config_envelope())
            .and_then(|config_envelope| shared_types::encode::<ChannelConfig>(&config_envelope.config));
        match encoded {
            Ok(bytes) => self.put_state(CHANNEL_CONFIG_NAMESPACE, CHANNEL_CONFIG_KEY, bytes),
            Err(e) => warn!(
                "[{}] config block {} not recorded in state: {}",
                self.channel_id,
                block.number(),
                e
            ),
        }
    }
}

#[async_trait]
impl PeerLedger for InMemoryLedger {
    async fn blockchain_info(&self) -> Result<BlockchainInfo, LedgerError> {
        let blocks = self.blocks.read();
        Ok(blocks
            .last()
            .map(|tip| BlockchainInfo {
                height: blocks.len() as u64,
                current_block_hash: tip.header.hash(),
                previous_block_hash: tip.header.previous_hash,
            })
            .unwrap_or_default())
    }

    async fn block_by_number(&self, number: u64) -> Result<Block, LedgerError> {
        usize::try_from(number)
            .ok()
            .and_then(|i| self.blocks.read().get(i).cloned())
            .ok_or(LedgerError::BlockNotFound(number))
    }

    async fn commit(&self, block: Block) -> Result<(), LedgerError> {
        let mut blocks = self.blocks.write();
        let height = blocks.len() as u64;
        if block.number() != height {
            return Err(LedgerError::Storage(format!(
                "block number {} does not match ledger height {}",
                block.number(),
                height
            )));
        }
        if block.is_config_block() {
            self.record_config(&block);
        }
        blocks.push(block);
        Ok(())
    }

    fn new_query_executor(&self) -> Result<Box<dyn QueryExecutor>, LedgerError> {
        Ok(Box::new(StateSnapshot {
            state: self.state.read().clone(),
        }))
    }

    fn blocks_iterator(&self, start: u64) -> Result<Box<dyn BlockIterator>, LedgerError> {
        let blocks = self.blocks.read();
        let start = usize::try_from(start).unwrap_or(usize::MAX);
        let range = blocks.get(start..).map(<[Block]>::to_vec).unwrap_or_default();
        Ok(Box::new(VecBlockIterator {
            blocks: range.into_iter(),
        }))
    }
}

struct StateSnapshot {
    state: HashMap<StateKey, Vec<u8>>,
}

impl QueryExecutor for StateSnapshot {
    fn get_state(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self
            .state
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }
}

struct VecBlockIterator {
    blocks: std::vec::IntoIter<Block>,
}

impl BlockIterator for VecBlockIterator {
    fn next_block(&mut self) -> Result<Option<Block>, LedgerError> {
        Ok(self.blocks.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Envelope;

    fn genesis(channel: &str) -> Block {
        let config = ChannelConfig {
            sequence: 0,
            ..Default::default()
        };
        Block::new(0, [0; 32], vec![Envelope::config(channel, config).unwrap()])
            .with_last_config_index(0)
    }

    #[tokio::test]
    async fn test_create_records_config_state() {
        let provider = InMemoryLedgerProvider::new();
        let ledger = provider.create_ledger(&genesis("ch1")).await.unwrap();

        let qe = ledger.new_query_executor().unwrap();
        let bytes = qe
            .get_state(CHANNEL_CONFIG_NAMESPACE, CHANNEL_CONFIG_KEY)
            .unwrap()
            .unwrap();
        let config: ChannelConfig = shared_types::decode(&bytes).unwrap();
        assert_eq!(config.sequence, 0);
        assert_eq!(ledger.blockchain_info().await.unwrap().height, 1);
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let provider = InMemoryLedgerProvider::new();
        provider.create_ledger(&genesis("ch1")).await.unwrap();
        assert!(matches!(
            provider.create_ledger(&genesis("ch1")).await,
            Err(LedgerError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_commit_checks_height() {
        let provider = InMemoryLedgerProvider::new();
        let ledger = provider.create_ledger(&genesis("ch1")).await.unwrap();
        let out_of_order = Block::new(5, [0; 32], vec![]);
        assert!(ledger.commit(out_of_order).await.is_err());

        let next = Block::new(1, [0; 32], vec![]);
        ledger.commit(next).await.unwrap();
        assert_eq!(ledger.block_by_number(1).await.unwrap().number(), 1);
        assert!(matches!(
            ledger.block_by_number(2).await,
            Err(LedgerError::BlockNotFound(2))
        ));
    }

    #[tokio::test]
    async fn test_iterator_from_start() {
        let provider = InMemoryLedgerProvider::new();
        provider.seed(
            "ch1",
            vec![genesis("ch1"), Block::new(1, [0; 32], vec![]), Block::new(2, [0; 32], vec![])],
        );
        let ledger = provider.open_ledger("ch1").await.unwrap();

        let mut it = ledger.blocks_iterator(1).unwrap();
        assert_eq!(it.next_block().unwrap().unwrap().number(), 1);
        assert_eq!(it.next_block().unwrap().unwrap().number(), 2);
        assert!(it.next_block().unwrap().is_none());
        assert!(ledger.blocks_iterator(9).unwrap().next_block().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_enumeration_failure() {
        let provider = InMemoryLedgerProvider::new();
        provider.fail_enumeration(true);
        assert!(provider.ledger_ids().await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_commits_at_same_height_accept_one() {
        let provider = InMemoryLedgerProvider::new();
        let ledger = provider.seed("ch1", vec![genesis("ch1")]);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move { ledger.commit(Block::new(1, [0; 32], vec![])).await })
            })
            .collect();
        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 1);
        assert_eq!(ledger.height(), 2);
    }
}
