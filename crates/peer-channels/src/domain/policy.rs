//! Policy manager snapshot.
//!
//! Holds the policy definitions of one bundle. Evaluation is the policy
//! engine's job; the peer only resolves paths to definitions.

use std::collections::BTreeMap;

use shared_types::Policy;

/// `/Channel/Readers`
pub const CHANNEL_READERS: &str = "/Channel/Readers";
/// `/Channel/Writers`
pub const CHANNEL_WRITERS: &str = "/Channel/Writers";
/// `/Channel/Application/Readers`
pub const CHANNEL_APPLICATION_READERS: &str = "/Channel/Application/Readers";
/// `/Channel/Application/Writers`
pub const CHANNEL_APPLICATION_WRITERS: &str = "/Channel/Application/Writers";
/// `/Channel/Application/Admins`
pub const CHANNEL_APPLICATION_ADMINS: &str = "/Channel/Application/Admins";
/// `/Channel/Orderer/BlockValidation`
pub const BLOCK_VALIDATION: &str = "/Channel/Orderer/BlockValidation";

const ROOT_PREFIX: &str = "/Channel/";

/// Policies of one channel configuration, keyed by full path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyManager {
    channel_id: String,
    policies: BTreeMap<String, Policy>,
}

impl PolicyManager {
    pub fn new(channel_id: &str, policies: BTreeMap<String, Policy>) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            policies,
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Resolve a policy. Relative paths are taken relative to `/Channel/`.
    pub fn get_policy(&self, path: &str) -> Option<&Policy> {
        if path.starts_with('/') {
            self.policies.get(path)
        } else {
            self.policies.get(&format!("{ROOT_PREFIX}{path}"))
        }
    }

    /// All policy paths, sorted.
    pub fn policy_names(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> PolicyManager {
        let mut policies = BTreeMap::new();
        policies.insert(
            CHANNEL_READERS.to_string(),
            Policy::Signature("OR('Org1MSP.member')".into()),
        );
        policies.insert(
            CHANNEL_APPLICATION_ADMINS.to_string(),
            Policy::Signature("OR('Org1MSP.admin')".into()),
        );
        PolicyManager::new("ch1", policies)
    }

    #[test]
    fn test_absolute_lookup() {
        assert!(manager().get_policy(CHANNEL_READERS).is_some());
        assert!(manager().get_policy(CHANNEL_WRITERS).is_none());
    }

    #[test]
    fn test_relative_lookup() {
        let pm = manager();
        assert_eq!(pm.get_policy("Readers"), pm.get_policy(CHANNEL_READERS));
        assert!(pm.get_policy("Application/Admins").is_some());
    }

    #[test]
    fn test_policy_names_sorted() {
        let names: Vec<_> = manager().policy_names().map(str::to_string).collect();
        assert_eq!(names, vec![CHANNEL_APPLICATION_ADMINS, CHANNEL_READERS]);
    }
}
