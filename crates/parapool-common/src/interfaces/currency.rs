//! Transferable balance with approve/transfer_from semantics

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::CurrencyError;
use crate::math::Wad;
use crate::types::AccountId;

/// Fungible currency backing every cash movement of the pool
pub trait Currency: Send + Sync {
    fn balance_of(&self, account: &AccountId) -> Wad;

    fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Wad;

    fn approve(&self, owner: &AccountId, spender: &AccountId, amount: Wad);

    fn transfer(&self, from: &AccountId, to: &AccountId, amount: Wad) -> Result<(), CurrencyError>;

    /// Move `amount` from `from` to `to` spending `spender`'s allowance
    fn transfer_from(
        &self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Wad,
    ) -> Result<(), CurrencyError>;

    /// Check that `spender` could pull `amount` from `owner` right now
    fn check_pull(&self, owner: &AccountId, spender: &AccountId, amount: Wad) -> Result<(), CurrencyError> {
        let approved = self.allowance(owner, spender);
        if approved < amount {
            return Err(CurrencyError::InsufficientAllowance {
                owner: owner.to_string(),
                spender: spender.to_string(),
                required: amount,
                approved,
            });
        }
        let available = self.balance_of(owner);
        if available < amount {
            return Err(CurrencyError::InsufficientBalance {
                account: owner.to_string(),
                required: amount,
                available,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Ledger {
    balances: HashMap<AccountId, Wad>,
    allowances: HashMap<(AccountId, AccountId), Wad>,
}

/// In-memory currency
#[derive(Debug, Default)]
pub struct InMemoryCurrency {
    inner: RwLock<Ledger>,
}

impl InMemoryCurrency {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create currency out of thin air
    pub fn mint(&self, to: &AccountId, amount: Wad) {
        let mut ledger = self.inner.write();
        *ledger.balances.entry(to.clone()).or_default() += amount;
    }

    /// Sum of every balance
    pub fn total_supply(&self) -> Wad {
        self.inner.read().balances.values().sum()
    }
}

impl Ledger {
    fn move_funds(&mut self, from: &AccountId, to: &AccountId, amount: Wad) -> Result<(), CurrencyError> {
        if amount.is_negative() {
            return Err(CurrencyError::InvalidAmount);
        }
        let available = self.balances.get(from).copied().unwrap_or_default();
        if available < amount {
            return Err(CurrencyError::InsufficientBalance {
                account: from.to_string(),
                required: amount,
                available,
            });
        }
        self.balances.insert(from.clone(), available - amount);
        *self.balances.entry(to.clone()).or_default() += amount;
        Ok(())
    }
}

impl Currency for InMemoryCurrency {
    fn balance_of(&self, account: &AccountId) -> Wad {
        self.inner.read().balances.get(account).copied().unwrap_or_default()
    }

    fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Wad {
        self.inner
            .read()
            .allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or_default()
    }

    fn approve(&self, owner: &AccountId, spender: &AccountId, amount: Wad) {
        self.inner
            .write()
            .allowances
            .insert((owner.clone(), spender.clone()), amount.max_zero());
    }

    fn transfer(&self, from: &AccountId, to: &AccountId, amount: Wad) -> Result<(), CurrencyError> {
        self.inner.write().move_funds(from, to, amount)?;
        debug!(%from, %to, %amount, "Currency transfer");
        Ok(())
    }

    fn transfer_from(
        &self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Wad,
    ) -> Result<(), CurrencyError> {
        let mut ledger = self.inner.write();
        let key = (from.clone(), spender.clone());
        let approved = ledger.allowances.get(&key).copied().unwrap_or_default();
        if approved < amount {
            return Err(CurrencyError::InsufficientAllowance {
                owner: from.to_string(),
                spender: spender.to_string(),
                required: amount,
                approved,
            });
        }
        ledger.move_funds(from, to, amount)?;
        ledger.allowances.insert(key, approved - amount);
        Ok(())
    }
}
