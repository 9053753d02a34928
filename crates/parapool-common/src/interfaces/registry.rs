//! Policy ownership registry

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{PolicyError, PoolError, Result};
use crate::types::{AccountId, PolicyId};

/// Maps each policy id to its current holder; payouts go to the holder
pub trait PolicyRegistry: Send + Sync {
    fn mint(&self, policy: PolicyId, owner: &AccountId) -> Result<()>;

    fn owner_of(&self, policy: PolicyId) -> Option<AccountId>;

    fn transfer(&self, policy: PolicyId, from: &AccountId, to: &AccountId) -> Result<()>;
}

/// In-memory registry
#[derive(Debug, Default)]
pub struct InMemoryPolicyRegistry {
    owners: RwLock<HashMap<PolicyId, AccountId>>,
}

impl InMemoryPolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PolicyRegistry for InMemoryPolicyRegistry {
    fn mint(&self, policy: PolicyId, owner: &AccountId) -> Result<()> {
        let mut owners = self.owners.write();
        if owners.contains_key(&policy) {
            return Err(PolicyError::DuplicatePolicyId(policy).into());
        }
        owners.insert(policy, owner.clone());
        Ok(())
    }

    fn owner_of(&self, policy: PolicyId) -> Option<AccountId> {
        self.owners.read().get(&policy).cloned()
    }

    fn transfer(&self, policy: PolicyId, from: &AccountId, to: &AccountId) -> Result<()> {
        let mut owners = self.owners.write();
        match owners.get_mut(&policy) {
            Some(owner) if owner == from => {
                *owner = to.clone();
                Ok(())
            }
            Some(_) => Err(PoolError::validation(format!("{from} does not own policy {policy}"))),
            None => Err(PoolError::NotFound(format!("policy {policy}"))),
        }
    }
}
