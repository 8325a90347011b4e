//! Collection store of one channel, backed by deployed chaincode info.

use std::sync::Arc;

use crate::domain::LifecycleError;
use crate::ports::inbound::CollectionStore;
use crate::ports::outbound::{DeployedChaincodeInfoProvider, StaticCollectionConfig};

pub struct SimpleCollectionStore {
    channel_id: String,
    info_provider: Arc<dyn DeployedChaincodeInfoProvider>,
}

impl SimpleCollectionStore {
    pub fn new(channel_id: &str, info_provider: Arc<dyn DeployedChaincodeInfoProvider>) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            info_provider,
        }
    }
}

impl CollectionStore for SimpleCollectionStore {
    fn retrieve_collection_config(
        &self,
        chaincode: &str,
        collection: &str,
    ) -> Result<Option<StaticCollectionConfig>, LifecycleError> {
        self.info_provider
            .collection_info(&self.channel_id, chaincode, collection)
    }

    fn is_member(&self, chaincode: &str, collection: &str, msp_id: &str) -> Result<bool, LifecycleError> {
        Ok(self
            .retrieve_collection_config(chaincode, collection)?
            .is_some_and(|config| config.member_orgs.iter().any(|org| org == msp_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StaticLifecycle;

    #[test]
    fn test_membership() {
        let provider = StaticLifecycle::new().with_static_collection(
            "ch1",
            "mycc",
            StaticCollectionConfig {
                name: "coll".into(),
                member_orgs: vec!["Org1MSP".into()],
                ..Default::default()
            },
        );
        let store = SimpleCollectionStore::new("ch1", Arc::new(provider));

        assert!(store.is_member("mycc", "coll", "Org1MSP").unwrap());
        assert!(!store.is_member("mycc", "coll", "Org2MSP").unwrap());
        assert!(!store.is_member("mycc", "missing", "Org1MSP").unwrap());
        assert!(store.retrieve_collection_config("other", "coll").unwrap().is_none());
    }
}
