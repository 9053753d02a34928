//! Policy - immutable record of a priced insurance policy
//!
//! Premium split (all amounts in currency):
//! - `pure_premium`: expected loss, held by the pool until resolution
//! - `premium_for_lps`: interest paid to the tranches backing the scr
//! - `premium_for_ensuro`: protocol fee, paid to the treasury
//! - `premium_for_rm` + `rm_shared_premium`: paid to the risk module wallet

use serde::{Deserialize, Serialize};

use parapool_common::{simple_interest, AccountId, PolicyId, Ray, RiskModuleId, Timestamp, Wad};

/// Caller-supplied terms of a new policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRequest {
    pub payout: Wad,
    pub premium: Wad,
    pub loss_prob: Ray,
    pub expiration: Timestamp,
    pub customer: AccountId,
    pub internal_id: u128,
}

/// A priced policy. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub risk_module: RiskModuleId,
    pub payout: Wad,
    pub premium: Wad,
    pub loss_prob: Ray,
    pub pure_premium: Wad,
    /// Collateral locked in tranches
    pub scr: Wad,
    /// Part of the payout funded directly by the risk module
    pub rm_coverage: Wad,
    /// Annual rate paid on `scr`
    pub interest_rate: Ray,
    pub start: Timestamp,
    pub expiration: Timestamp,
    pub premium_for_lps: Wad,
    pub premium_for_rm: Wad,
    pub premium_for_ensuro: Wad,
    pub rm_shared_premium: Wad,
}

impl Policy {
    /// Interest earned by the backing tranches between `start` and `now`
    pub fn accrued_interest(&self, now: Timestamp) -> Wad {
        simple_interest(self.scr, self.interest_rate, now - self.start)
    }

    /// Seconds left until expiration (negative once expired)
    #[inline]
    pub fn horizon(&self, now: Timestamp) -> i64 {
        self.expiration - now
    }

    #[inline]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expiration
    }

    /// Total paid to the risk module wallet at creation
    pub fn rm_income(&self) -> Wad {
        self.premium_for_rm + self.rm_shared_premium
    }

    /// Part of the premium kept by the pool
    pub fn retained_premium(&self) -> Wad {
        self.pure_premium + self.premium_for_lps
    }
}
