//! Pool-wide premium ledger
//!
//! Cash the pool itself holds, apart from tranche capital:
//! `pure_premiums - borrowed_active_pp + won_pure_premiums`.
//! Claims spend the pool's own money before touching tranche capital.

use serde::Serialize;

use parapool_common::Wad;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PremiumLedger {
    /// Gross pure premium of every active policy
    pure_premiums: Wad,
    /// Part of `pure_premiums` already spent on other policies' claims
    borrowed_active_pp: Wad,
    /// Realized, withdrawable premium
    won_pure_premiums: Wad,
    /// Shared coverage funded by risk modules for active policies
    rm_coverage_held: Wad,
}

impl PremiumLedger {
    pub fn pure_premiums(&self) -> Wad {
        self.pure_premiums
    }

    pub fn borrowed_active_pp(&self) -> Wad {
        self.borrowed_active_pp
    }

    pub fn won_pure_premiums(&self) -> Wad {
        self.won_pure_premiums
    }

    pub fn rm_coverage_held(&self) -> Wad {
        self.rm_coverage_held
    }

    /// Cash owned by the pool and available for investment
    pub fn investable(&self) -> Wad {
        self.pure_premiums - self.borrowed_active_pp + self.won_pure_premiums
    }

    pub(crate) fn commit(&mut self, pure_premium: Wad, rm_coverage: Wad) {
        self.pure_premiums += pure_premium;
        self.rm_coverage_held += rm_coverage;
    }

    /// Remove a resolved policy's premium from the active pool.
    ///
    /// Returns how much of it is still unspent.
    pub(crate) fn release(&mut self, pure_premium: Wad, rm_coverage: Wad) -> Wad {
        self.rm_coverage_held = (self.rm_coverage_held - rm_coverage).max_zero();
        self.pure_premiums -= pure_premium;
        if self.borrowed_active_pp > self.pure_premiums {
            let spent = self.borrowed_active_pp - self.pure_premiums;
            self.borrowed_active_pp = self.pure_premiums;
            pure_premium - spent
        } else {
            pure_premium
        }
    }

    /// Pay `amount` from won premiums, then from other policies' active
    /// premiums. Returns what is left to borrow from tranches.
    pub(crate) fn cover(&mut self, amount: Wad) -> Wad {
        let from_won = self.won_pure_premiums.min(amount);
        self.won_pure_premiums -= from_won;
        let rest = amount - from_won;

        let unspent = self.pure_premiums - self.borrowed_active_pp;
        let from_active = unspent.min(rest);
        self.borrowed_active_pp += from_active;
        rest - from_active
    }

    /// Put surplus back into borrowed active premiums. Returns the remainder.
    pub(crate) fn refill_borrowed(&mut self, amount: Wad) -> Wad {
        let refill = self.borrowed_active_pp.min(amount);
        self.borrowed_active_pp -= refill;
        amount - refill
    }

    pub(crate) fn add_won(&mut self, amount: Wad) {
        self.won_pure_premiums += amount;
    }

    /// Take up to `amount` from won premiums; returns the amount taken
    pub(crate) fn take_won(&mut self, amount: Wad) -> Wad {
        let taken = self.won_pure_premiums.min(amount);
        self.won_pure_premiums -= taken;
        taken
    }

    /// Book an investment loss against the pool's own cash. Returns the
    /// part the pool could not cover.
    pub(crate) fn absorb_loss(&mut self, loss: Wad) -> Wad {
        let rest = loss - self.take_won(loss);
        let unspent = (self.pure_premiums - self.borrowed_active_pp).max_zero();
        let from_active = unspent.min(rest);
        self.borrowed_active_pp += from_active;
        rest - from_active
    }
}
