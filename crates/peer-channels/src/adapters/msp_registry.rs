//! Process-wide MSP manager registry and the identity deserializer factory
//! gossip uses on top of it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::{IdentityDeserializer, MspManager};
use crate::ports::outbound::{IdentityDeserializerFactory, MspManagerRegistry};

/// MSP managers by channel id.
#[derive(Default)]
pub struct InMemoryMspRegistry {
    managers: RwLock<HashMap<String, Arc<MspManager>>>,
}

impl InMemoryMspRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MspManagerRegistry for InMemoryMspRegistry {
    fn set_manager_for_chain(&self, channel_id: &str, manager: Arc<MspManager>) {
        self.managers.write().insert(channel_id.to_string(), manager);
    }

    fn manager_for_chain(&self, channel_id: &str) -> Option<Arc<MspManager>> {
        self.managers.read().get(channel_id).cloned()
    }
}

/// Resolves deserializers through an [`MspManagerRegistry`] at call time,
/// so gossip always sees the channel's latest MSPs.
pub struct RegistryDeserializerFactory {
    registry: Arc<dyn MspManagerRegistry>,
}

impl RegistryDeserializerFactory {
    pub fn new(registry: Arc<dyn MspManagerRegistry>) -> Self {
        Self { registry }
    }
}

impl IdentityDeserializerFactory for RegistryDeserializerFactory {
    fn identity_deserializer(&self, channel_id: &str) -> Option<Arc<dyn IdentityDeserializer>> {
        self.registry
            .manager_for_chain(channel_id)
            .map(|m| m as Arc<dyn IdentityDeserializer>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SerializedIdentity;
    use shared_types::OrganizationConfig;

    #[test]
    fn test_factory_follows_registry() {
        let registry = Arc::new(InMemoryMspRegistry::new());
        let factory = RegistryDeserializerFactory::new(registry.clone());
        assert!(factory.identity_deserializer("ch1").is_none());

        let org = OrganizationConfig {
            msp_id: "Org1MSP".into(),
            root_certs: vec![b"root".to_vec()],
            ..Default::default()
        };
        registry.set_manager_for_chain("ch1", Arc::new(MspManager::new([&org])));

        let deserializer = factory.identity_deserializer("ch1").unwrap();
        let bytes = shared_types::encode(&SerializedIdentity {
            msp_id: "Org1MSP".into(),
            id_bytes: vec![1],
        })
        .unwrap();
        assert_eq!(deserializer.deserialize_identity(&bytes).unwrap().msp_id, "Org1MSP");
    }
}
