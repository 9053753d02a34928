//! Capability checks

use std::collections::HashSet;

use parking_lot::RwLock;

use crate::error::{PoolError, Result};
use crate::types::{AccountId, Role};

/// Role-based authorization
pub trait AccessControl: Send + Sync {
    fn has_role(&self, role: &Role, caller: &AccountId) -> bool;

    /// Fail with [`PoolError::Unauthorized`] unless `caller` holds `role`
    fn require_role(&self, role: &Role, caller: &AccountId) -> Result<()> {
        if self.has_role(role, caller) {
            Ok(())
        } else {
            Err(PoolError::unauthorized(caller, role.clone()))
        }
    }
}

/// In-memory role assignments
#[derive(Debug, Default)]
pub struct RoleRegistry {
    grants: RwLock<HashSet<(Role, AccountId)>>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant_role(&self, role: Role, account: &AccountId) {
        self.grants.write().insert((role, account.clone()));
    }

    pub fn revoke_role(&self, role: &Role, account: &AccountId) {
        self.grants.write().remove(&(role.clone(), account.clone()));
    }
}

impl AccessControl for RoleRegistry {
    fn has_role(&self, role: &Role, caller: &AccountId) -> bool {
        self.grants.read().contains(&(role.clone(), caller.clone()))
    }
}
