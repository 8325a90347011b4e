//! Adapters between the validator and the two chaincode lifecycles.

use std::sync::Arc;

use crate::domain::LifecycleError;
use crate::ports::outbound::{
    ChannelCollectionInfo, CollectionAndLifecycleResources, LifecycleResources, ValidationInfo,
};

/// Looks up validation info in the current lifecycle and falls back to the
/// legacy one only when the current lifecycle returned neither an error nor
/// any info.
#[derive(Clone)]
pub struct ValidationInfoRetrieveShim {
    new: Arc<dyn CollectionAndLifecycleResources>,
    legacy: Arc<dyn LifecycleResources>,
}

impl ValidationInfoRetrieveShim {
    pub fn new(
        new: Arc<dyn CollectionAndLifecycleResources>,
        legacy: Arc<dyn LifecycleResources>,
    ) -> Self {
        Self { new, legacy }
    }

    pub fn validation_info(
        &self,
        channel_id: &str,
        chaincode: &str,
    ) -> Result<Option<ValidationInfo>, LifecycleError> {
        match self.new.validation_info(channel_id, chaincode)? {
            Some(info) => Ok(Some(info)),
            None => self.legacy.validation_info(channel_id, chaincode),
        }
    }
}

/// Collection validation lookups with the channel id filled in.
#[derive(Clone)]
pub struct CollectionInfoShim {
    resources: Arc<dyn CollectionAndLifecycleResources>,
    channel_id: String,
}

impl CollectionInfoShim {
    pub fn new(resources: Arc<dyn CollectionAndLifecycleResources>, channel_id: &str) -> Self {
        Self {
            resources,
            channel_id: channel_id.to_string(),
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }
}

impl ChannelCollectionInfo for CollectionInfoShim {
    fn collection_validation_info(
        &self,
        chaincode: &str,
        collection: &str,
    ) -> Result<Option<Vec<u8>>, LifecycleError> {
        self.resources
            .collection_validation_info(&self.channel_id, chaincode, collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StaticLifecycle;

    fn info(plugin: &str) -> ValidationInfo {
        ValidationInfo {
            plugin: plugin.to_string(),
            args: vec![],
        }
    }

    #[test]
    fn test_new_lifecycle_wins() {
        let new = Arc::new(StaticLifecycle::new().with_info("mycc", info("new")));
        let legacy = Arc::new(StaticLifecycle::new().with_info("mycc", info("legacy")));
        let shim = ValidationInfoRetrieveShim::new(new, legacy);

        assert_eq!(shim.validation_info("ch1", "mycc").unwrap().unwrap().plugin, "new");
    }

    #[test]
    fn test_falls_back_when_new_has_nothing() {
        let new = Arc::new(StaticLifecycle::new());
        let legacy = Arc::new(StaticLifecycle::new().with_info("mycc", info("legacy")));
        let shim = ValidationInfoRetrieveShim::new(new, legacy);

        assert_eq!(
            shim.validation_info("ch1", "mycc").unwrap().unwrap().plugin,
            "legacy"
        );
    }

    #[test]
    fn test_no_fallback_on_error() {
        let new = Arc::new(
            StaticLifecycle::new().with_error("mycc", LifecycleError::Invalid("bad".into())),
        );
        let legacy = Arc::new(StaticLifecycle::new().with_info("mycc", info("legacy")));
        let shim = ValidationInfoRetrieveShim::new(new, legacy);

        assert!(matches!(
            shim.validation_info("ch1", "mycc"),
            Err(LifecycleError::Invalid(_))
        ));
    }

    #[test]
    fn test_collection_shim_binds_channel() {
        let lifecycle = Arc::new(
            StaticLifecycle::new().with_collection("ch1", "mycc", "coll", b"policy".to_vec()),
        );
        let shim = CollectionInfoShim::new(lifecycle, "ch1");

        assert_eq!(
            shim.collection_validation_info("mycc", "coll").unwrap(),
            Some(b"policy".to_vec())
        );
        assert_eq!(shim.collection_validation_info("mycc", "other").unwrap(), None);
    }
}
