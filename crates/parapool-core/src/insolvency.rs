//! Insolvency hooks
//!
//! Consulted exactly when a settlement or a realized investment loss would
//! drive a tranche's ocean negative. A hook either returns a [`Remedy`] that
//! fully covers the shortfall or fails; the pool then aborts the whole
//! operation with `InsolvencyUnresolved`.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use tracing::warn;

use parapool_common::{AccountId, PoolError, Ray, Result, TrancheId, Wad};

/// How a shortfall gets covered. The pool executes the remedy.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Remedy {
    /// `granter` pays `amount` to the pool; the tranche is forgiven that much
    /// of its debt and receives no capital
    Absorbed { granter: AccountId, amount: Wad },
    /// `provider` deposits `amount` into `tranche` as a liquidity provider
    Deposited {
        provider: AccountId,
        tranche: TrancheId,
        amount: Wad,
    },
}

impl Remedy {
    /// Cash the remedy brings into the pool
    pub fn amount(&self) -> Wad {
        match self {
            Remedy::Absorbed { amount, .. } | Remedy::Deposited { amount, .. } => *amount,
        }
    }

    /// Account the cash is pulled from
    pub fn payer(&self) -> &AccountId {
        match self {
            Remedy::Absorbed { granter, .. } => granter,
            Remedy::Deposited { provider, .. } => provider,
        }
    }
}

/// Pluggable remediation strategy
pub trait InsolvencyHook: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Cover `shortfall` in `tranche` or fail
    fn cover_shortfall(&self, tranche: TrancheId, shortfall: Wad) -> Result<Remedy>;
}

/// Treat shortfalls as externally forgiven, funded by a granter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantInsolvencyHook {
    pub granter: AccountId,
}

impl GrantInsolvencyHook {
    pub fn new(granter: AccountId) -> Self {
        Self { granter }
    }
}

impl InsolvencyHook for GrantInsolvencyHook {
    fn name(&self) -> &str {
        "grant"
    }

    fn cover_shortfall(&self, tranche: TrancheId, shortfall: Wad) -> Result<Remedy> {
        warn!(%tranche, %shortfall, granter = %self.granter, "Absorbing shortfall with a grant");
        Ok(Remedy::Absorbed {
            granter: self.granter.clone(),
            amount: shortfall,
        })
    }
}

/// Deposit compensating capital as a liquidity provider, optionally
/// over-depositing by `cover_ratio`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LpInsolvencyHook {
    pub provider: AccountId,
    /// Multiple of the shortfall deposited, at least one
    pub cover_ratio: Ray,
    /// Only shortfalls of this tranche are covered; any tranche when unset
    pub tranche: Option<TrancheId>,
}

impl LpInsolvencyHook {
    pub fn new(provider: AccountId, cover_ratio: Ray, tranche: Option<TrancheId>) -> Result<Self> {
        if cover_ratio < Ray::ONE {
            return Err(PoolError::validation("cover_ratio must be at least 1"));
        }
        Ok(Self {
            provider,
            cover_ratio,
            tranche,
        })
    }
}

impl InsolvencyHook for LpInsolvencyHook {
    fn name(&self) -> &str {
        "liquidity_provider"
    }

    fn cover_shortfall(&self, tranche: TrancheId, shortfall: Wad) -> Result<Remedy> {
        if let Some(designated) = self.tranche {
            if designated != tranche {
                return Err(PoolError::InsolvencyUnresolved { tranche, shortfall });
            }
        }
        let amount = shortfall.mul_ray(self.cover_ratio).max(shortfall);
        warn!(%tranche, %shortfall, %amount, provider = %self.provider, "Covering shortfall with a deposit");
        Ok(Remedy::Deposited {
            provider: self.provider.clone(),
            tranche,
            amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_grant_covers_exact_shortfall() {
        let hook = GrantInsolvencyHook::new(AccountId::from("DAO"));
        let remedy = hook.cover_shortfall(TrancheId(0), Wad::from_units(250)).unwrap();
        assert_eq!(remedy.amount(), Wad::from_units(250));
        assert_eq!(remedy.payer(), &AccountId::from("DAO"));
    }

    #[test]
    fn test_lp_hook_over_deposits() {
        let hook =
            LpInsolvencyHook::new(AccountId::from("BACKSTOP"), Ray::new(dec!(1.5)), None).unwrap();
        let remedy = hook.cover_shortfall(TrancheId(2), Wad::from_units(100)).unwrap();
        assert_eq!(
            remedy,
            Remedy::Deposited {
                provider: AccountId::from("BACKSTOP"),
                tranche: TrancheId(2),
                amount: Wad::from_units(150),
            }
        );
    }

    #[test]
    fn test_lp_hook_only_covers_designated_tranche() {
        let hook =
            LpInsolvencyHook::new(AccountId::from("BACKSTOP"), Ray::ONE, Some(TrancheId(0))).unwrap();
        assert!(hook.cover_shortfall(TrancheId(0), Wad::from_units(1)).is_ok());
        assert!(matches!(
            hook.cover_shortfall(TrancheId(1), Wad::from_units(1)),
            Err(PoolError::InsolvencyUnresolved { .. })
        ));
    }

    #[test]
    fn test_cover_ratio_below_one_rejected() {
        let result = LpInsolvencyHook::new(AccountId::from("BACKSTOP"), Ray::new(dec!(0.9)), None);
        assert!(result.is_err());
    }
}
