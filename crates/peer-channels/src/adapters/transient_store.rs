//! In-memory transient store.
//!
//! Private data keyed by transaction id, tagged with the block height at
//! which it was received so it can be purged once too old.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::domain::StoreError;
use crate::ports::outbound::{TransientStore, TransientStoreProvider};

/// Hands out one [`InMemoryTransientStore`] per channel.
#[derive(Default)]
pub struct InMemoryTransientStoreProvider {
    stores: Mutex<HashMap<String, Arc<InMemoryTransientStore>>>,
}

impl InMemoryTransientStoreProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct stores opened so far.
    pub fn open_count(&self) -> usize {
        self.stores.lock().len()
    }
}

#[async_trait]
impl TransientStoreProvider for InMemoryTransientStoreProvider {
    async fn open_store(&self, channel_id: &str) -> Result<Arc<dyn TransientStore>, StoreError> {
        let store = Arc::clone(
            self.stores
                .lock()
                .entry(channel_id.to_string())
                .or_insert_with(|| Arc::new(InMemoryTransientStore::default())),
        );
        Ok(store)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    block_height: u64,
    data: Vec<u8>,
}

/// Transient store backed by a hash map.
#[derive(Default)]
pub struct InMemoryTransientStore {
    entries: RwLock<HashMap<String, Vec<Entry>>>,
}

impl TransientStore for InMemoryTransientStore {
    fn persist(&self, tx_id: &str, block_height: u64, data: Vec<u8>) -> Result<(), StoreError> {
        if tx_id.is_empty() {
            return Err(StoreError("empty transaction id".into()));
        }
        self.entries
            .write()
            .entry(tx_id.to_string())
            .or_default()
            .push(Entry { block_height, data });
        Ok(())
    }

    fn get_tx_private_data(&self, tx_id: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        Ok(self
            .entries
            .read()
            .get(tx_id)
            .map(|entries| entries.iter().map(|e| e.data.clone()).collect())
            .unwrap_or_default())
    }

    fn purge_by_tx_ids(&self, tx_ids: &[String]) -> Result<(), StoreError> {
        let mut entries = self.entries.write();
        for tx_id in tx_ids {
            entries.remove(tx_id);
        }
        Ok(())
    }

    fn purge_below_height(&self, height: u64) -> Result<(), StoreError> {
        let mut entries = self.entries.write();
        entries.retain(|_, list| {
            list.retain(|e| e.block_height >= height);
            !list.is_empty()
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let provider = InMemoryTransientStoreProvider::new();
        let a = provider.open_store("ch1").await.unwrap();
        let b = provider.open_store("ch1").await.unwrap();
        a.persist("tx1", 1, b"pvt".to_vec()).unwrap();
        assert_eq!(b.get_tx_private_data("tx1").unwrap(), vec![b"pvt".to_vec()]);
        assert_eq!(provider.open_count(), 1);
    }

    #[test]
    fn test_purge_below_height() {
        let store = InMemoryTransientStore::default();
        store.persist("tx1", 1, vec![1]).unwrap();
        store.persist("tx1", 5, vec![5]).unwrap();
        store.persist("tx2", 2, vec![2]).unwrap();

        store.purge_below_height(3).unwrap();

        assert_eq!(store.get_tx_private_data("tx1").unwrap(), vec![vec![5]]);
        assert!(store.get_tx_private_data("tx2").unwrap().is_empty());
    }

    #[test]
    fn test_purge_by_tx_ids() {
        let store = InMemoryTransientStore::default();
        store.persist("tx1", 1, vec![1]).unwrap();
        store.purge_by_tx_ids(&["tx1".to_string()]).unwrap();
        assert!(store.get_tx_private_data("tx1").unwrap().is_empty());
        assert!(store.persist("", 1, vec![]).is_err());
    }
}
