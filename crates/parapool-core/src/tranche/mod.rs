//! Capital Tranche - share-accounted, interest-accruing capital pool
//!
//! Key characteristics:
//! - Holders own shares; a balance is always `shares * scale`
//! - `total_supply` is the tranche's capital, `scr` the part locked by policies
//! - `ocean = total_supply - scr` is what can be withdrawn or locked
//! - Interest on locked capital accrues lazily: each mutating call first
//!   compounds `scale` by the interest earned since the last checkpoint
//! - The pool may borrow from the tranche (`pool_loan`), which accrues at
//!   `pool_loan_interest_rate` and counts as investable capital

pub mod acceptance;

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use parapool_common::{
    simple_interest, AccountId, LedgerError, Ray, Result, RiskModuleId, Timestamp, TrancheId, Wad,
};

pub use acceptance::{AcceptancePolicy, Eligibility};

/// Scales outside `[MIN_SCALE, MAX_SCALE]` are folded into the holders' shares
const MIN_SCALE: Decimal = Decimal::from_parts(1, 0, 0, false, 9);
const MAX_SCALE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Static tranche configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrancheParams {
    pub name: String,
    /// Longest remaining policy horizon accepted, in seconds
    pub expiration_period: i64,
    #[serde(default)]
    pub pool_loan_interest_rate: Ray,
    #[serde(default = "default_true")]
    pub accept_all_rms: bool,
    #[serde(default)]
    pub exceptions: Vec<RiskModuleId>,
    /// Only holders of `LiquidityProvider` may deposit
    #[serde(default)]
    pub whitelist_only: bool,
    #[serde(default = "default_true")]
    pub deposits_enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Serializable view of a tranche
#[derive(Debug, Clone, Serialize)]
pub struct TrancheSnapshot {
    pub id: TrancheId,
    pub name: String,
    pub total_supply: Wad,
    pub scr: Wad,
    pub ocean: Wad,
    pub pool_loan: Wad,
    pub scale: Ray,
    pub token_interest_rate: Ray,
    pub holders: BTreeMap<AccountId, Wad>,
}

/// A capital tranche
#[derive(Debug, Clone)]
pub struct CapitalTranche {
    id: TrancheId,
    name: String,
    /// Capital of all holders, including accrued interest
    total_supply: Wad,
    /// Balance of one share
    scale: Ray,
    shares: BTreeMap<AccountId, Wad>,
    total_shares: Wad,
    /// owner -> spender -> allowance in balance units
    allowances: HashMap<AccountId, HashMap<AccountId, Wad>>,
    /// Locked collateral
    scr: Wad,
    /// Sum over locked slices of `amount * interest_rate`
    scr_rate_sum: Wad,
    last_accrual: Timestamp,
    pool_loan: Wad,
    pool_loan_interest_rate: Ray,
    last_loan_accrual: Timestamp,
    acceptance: AcceptancePolicy,
    whitelist_only: bool,
    deposits_enabled: bool,
}

impl CapitalTranche {
    pub fn new(id: TrancheId, params: &TrancheParams, now: Timestamp) -> Self {
        let mut acceptance = AcceptancePolicy::new(params.accept_all_rms, params.expiration_period);
        for rm in &params.exceptions {
            acceptance.set_exception(*rm, true);
        }
        Self {
            id,
            name: params.name.clone(),
            total_supply: Wad::ZERO,
            scale: Ray::ONE,
            shares: BTreeMap::new(),
            total_shares: Wad::ZERO,
            allowances: HashMap::new(),
            scr: Wad::ZERO,
            scr_rate_sum: Wad::ZERO,
            last_accrual: now,
            pool_loan: Wad::ZERO,
            pool_loan_interest_rate: params.pool_loan_interest_rate,
            last_loan_accrual: now,
            acceptance,
            whitelist_only: params.whitelist_only,
            deposits_enabled: params.deposits_enabled,
        }
    }

    // ---------- Views (as of the last checkpoint) ----------

    #[inline]
    pub fn id(&self) -> TrancheId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn total_supply(&self) -> Wad {
        self.total_supply
    }

    #[inline]
    pub fn scr(&self) -> Wad {
        self.scr
    }

    #[inline]
    pub fn scale(&self) -> Ray {
        self.scale
    }

    /// Unlocked capital; negative only transiently during settlement
    #[inline]
    pub fn ocean(&self) -> Wad {
        self.total_supply - self.scr
    }

    #[inline]
    pub fn pool_loan(&self) -> Wad {
        self.pool_loan
    }

    pub fn pool_loan_interest_rate(&self) -> Ray {
        self.pool_loan_interest_rate
    }

    /// Capital the tranche has put to work: ocean plus what the pool owes it
    pub fn get_investable(&self) -> Wad {
        (self.ocean() + self.pool_loan).max_zero()
    }

    /// Weighted average interest rate of the locked collateral
    pub fn token_interest_rate(&self) -> Ray {
        if self.scr.is_zero() {
            Ray::ZERO
        } else {
            self.scr_rate_sum.ratio(self.scr)
        }
    }

    pub fn shares_of(&self, holder: &AccountId) -> Wad {
        self.shares.get(holder).copied().unwrap_or_default()
    }

    pub fn balance_of(&self, holder: &AccountId) -> Wad {
        self.shares_of(holder).mul_ray(self.scale)
    }

    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Wad {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn acceptance(&self) -> &AcceptancePolicy {
        &self.acceptance
    }

    pub fn eligibility(&self, rm: RiskModuleId, horizon: i64) -> Eligibility {
        self.acceptance.eligibility(rm, horizon)
    }

    pub fn whitelist_only(&self) -> bool {
        self.whitelist_only
    }

    pub fn deposits_enabled(&self) -> bool {
        self.deposits_enabled
    }

    // ---------- Projected views ----------

    /// Interest that would accrue to holders between the last checkpoint and `now`
    pub fn pending_interest(&self, now: Timestamp) -> Wad {
        simple_interest(self.scr_rate_sum, Ray::ONE, now - self.last_accrual)
    }

    pub fn total_supply_at(&self, now: Timestamp) -> Wad {
        self.total_supply + self.pending_interest(now)
    }

    pub fn ocean_at(&self, now: Timestamp) -> Wad {
        self.total_supply_at(now) - self.scr
    }

    pub fn pool_loan_at(&self, now: Timestamp) -> Wad {
        self.pool_loan
            + simple_interest(self.pool_loan, self.pool_loan_interest_rate, now - self.last_loan_accrual)
    }

    pub fn balance_of_at(&self, holder: &AccountId, now: Timestamp) -> Wad {
        let mut projected = self.clone();
        match projected.touch(now) {
            Ok(()) => projected.balance_of(holder),
            Err(_) => self.balance_of(holder),
        }
    }

    pub fn snapshot(&self) -> TrancheSnapshot {
        TrancheSnapshot {
            id: self.id,
            name: self.name.clone(),
            total_supply: self.total_supply,
            scr: self.scr,
            ocean: self.ocean(),
            pool_loan: self.pool_loan,
            scale: self.scale,
            token_interest_rate: self.token_interest_rate(),
            holders: self
                .shares
                .keys()
                .map(|holder| (holder.clone(), self.balance_of(holder)))
                .collect(),
        }
    }

    // ---------- Accrual ----------

    /// Settle interest and pool-loan accrual up to `now`
    pub fn touch(&mut self, now: Timestamp) -> Result<()> {
        let interest = self.pending_interest(now);
        if interest.is_positive() {
            self.discrete_change(interest)?;
            debug!(tranche = %self.id, %interest, scale = %self.scale, "Accrued interest");
        }
        self.last_accrual = self.last_accrual.max(now);

        self.pool_loan = self.pool_loan_at(now);
        self.last_loan_accrual = self.last_loan_accrual.max(now);
        Ok(())
    }

    /// Add `delta` to the capital of every holder pro rata
    fn discrete_change(&mut self, delta: Wad) -> Result<()> {
        let new_supply = self.total_supply + delta;
        if new_supply.is_negative() {
            return Err(LedgerError::NegativeSupply(self.id).into());
        }
        if self.total_shares.is_zero() || self.total_supply.is_zero() {
            self.total_supply = new_supply;
            return Ok(());
        }
        if new_supply.is_zero() {
            // Every holder was wiped out; restart share accounting
            self.shares.clear();
            self.total_shares = Wad::ZERO;
            self.scale = Ray::ONE;
            self.total_supply = Wad::ZERO;
            return Ok(());
        }
        let scale = self
            .scale
            .raw()
            .checked_mul(new_supply.raw())
            .and_then(|v| v.checked_div(self.total_supply.raw()))
            .ok_or(LedgerError::ArithmeticOverflow(self.id))?;
        self.scale = Ray::new(scale);
        self.total_supply = new_supply;
        if self.scale.raw() < MIN_SCALE || self.scale.raw() > MAX_SCALE {
            self.rebase();
        }
        Ok(())
    }

    /// Convert every holding to shares at a scale of one. Holdings that
    /// round to nothing are dropped.
    fn rebase(&mut self) {
        let scale = self.scale;
        self.shares = std::mem::take(&mut self.shares)
            .into_iter()
            .map(|(holder, shares)| (holder, shares.mul_ray(scale)))
            .filter(|(_, balance)| balance.is_positive())
            .collect();
        self.total_shares = self.shares.values().copied().sum();
        self.scale = Ray::ONE;
        debug!(tranche = %self.id, %scale, holders = self.shares.len(), "Rebased shares");
    }

    // ---------- Holder operations ----------

    /// Credit `amount` of capital to `holder`. Authorization is checked by the pool.
    pub fn deposit(&mut self, holder: &AccountId, amount: Wad, now: Timestamp) -> Result<Wad> {
        if !self.deposits_enabled {
            return Err(LedgerError::DepositsDisabled(self.id).into());
        }
        self.credit(holder, amount, now)
    }

    /// Deposit that ignores the enabled flag, used by insolvency remedies
    pub(crate) fn credit(&mut self, holder: &AccountId, amount: Wad, now: Timestamp) -> Result<Wad> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount.into());
        }
        self.touch(now)?;
        let minted = amount
            .checked_div_ray(self.scale)
            .ok_or(LedgerError::ArithmeticOverflow(self.id))?;
        if minted.is_zero() {
            return Err(LedgerError::InvalidAmount.into());
        }
        *self.shares.entry(holder.clone()).or_default() += minted;
        self.total_shares += minted;
        self.total_supply += amount;
        debug!(tranche = %self.id, %holder, %amount, "Deposit");
        Ok(amount)
    }

    /// Withdraw `amount`, or with `None` the largest withdrawable amount
    /// `min(balance, ocean)`. Returns the amount withdrawn.
    pub fn withdraw(&mut self, holder: &AccountId, amount: Option<Wad>, now: Timestamp) -> Result<Wad> {
        self.touch(now)?;
        let balance = self.balance_of(holder);
        let ocean = self.ocean().max_zero();
        let amount = match amount {
            None => balance.min(ocean),
            Some(a) if !a.is_positive() => return Err(LedgerError::InvalidAmount.into()),
            Some(a) if a > balance => {
                return Err(LedgerError::InsufficientBalance {
                    required: a,
                    available: balance,
                }
                .into())
            }
            Some(a) if a > ocean => {
                return Err(LedgerError::InsufficientOcean {
                    required: a,
                    ocean,
                }
                .into())
            }
            Some(a) => a,
        };
        if amount.is_zero() {
            return Ok(Wad::ZERO);
        }
        let burned = self.shares_for(holder, amount, balance)?;
        self.burn(holder, burned);
        self.total_supply -= amount;
        debug!(tranche = %self.id, %holder, %amount, "Withdraw");
        Ok(amount)
    }

    pub fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: Wad, now: Timestamp) -> Result<()> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount.into());
        }
        self.touch(now)?;
        let balance = self.balance_of(from);
        if amount > balance {
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available: balance,
            }
            .into());
        }
        let moved = self.shares_for(from, amount, balance)?;
        self.burn(from, moved);
        *self.shares.entry(to.clone()).or_default() += moved;
        self.total_shares += moved;
        Ok(())
    }

    pub fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: Wad) {
        self.allowances
            .entry(owner.clone())
            .or_default()
            .insert(spender.clone(), amount.max_zero());
    }

    pub fn transfer_from(
        &mut self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Wad,
        now: Timestamp,
    ) -> Result<()> {
        let approved = self.allowance(from, spender);
        if approved < amount {
            return Err(LedgerError::InsufficientAllowance {
                required: amount,
                approved,
            }
            .into());
        }
        self.transfer(from, to, amount, now)?;
        self.approve(from, spender, approved - amount);
        Ok(())
    }

    /// Shares backing `amount` of `holder`'s `balance`. The full balance
    /// always maps to every share the holder owns.
    fn shares_for(&self, holder: &AccountId, amount: Wad, balance: Wad) -> Result<Wad> {
        let owned = self.shares_of(holder);
        if amount == balance {
            return Ok(owned);
        }
        let shares = amount
            .checked_div_ray(self.scale)
            .ok_or(LedgerError::ArithmeticOverflow(self.id))?;
        Ok(shares.min(owned))
    }

    fn burn(&mut self, holder: &AccountId, shares: Wad) {
        if let Some(owned) = self.shares.get_mut(holder) {
            *owned -= shares;
            if owned.is_zero() {
                self.shares.remove(holder);
            }
        }
        self.total_shares -= shares;
    }

    // ---------- Pool-only operations ----------

    /// Lock `amount` of ocean as collateral for a policy of `rm` expiring at `expiration`
    pub(crate) fn lock_scr(
        &mut self,
        rm: RiskModuleId,
        expiration: Timestamp,
        amount: Wad,
        interest_rate: Ray,
        now: Timestamp,
    ) -> Result<()> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount.into());
        }
        match self.eligibility(rm, expiration - now) {
            Eligibility::Eligible => {}
            Eligibility::RiskModuleRejected => {
                return Err(LedgerError::RiskModuleNotAccepted(self.id).into())
            }
            Eligibility::HorizonExceeded => {
                return Err(LedgerError::HorizonExceeded {
                    tranche: self.id,
                    horizon: expiration - now,
                    limit: self.acceptance.expiration_period,
                }
                .into())
            }
        }
        self.touch(now)?;
        let ocean = self.ocean();
        if amount > ocean {
            return Err(LedgerError::InsufficientOcean {
                required: amount,
                ocean,
            }
            .into());
        }
        self.scr += amount;
        self.scr_rate_sum += amount.mul_ray(interest_rate);
        debug!(tranche = %self.id, %amount, scr = %self.scr, "Locked scr");
        Ok(())
    }

    /// Release `amount` of collateral and apply the signed `adjustment`
    /// realized on that slice
    pub(crate) fn unlock_scr(
        &mut self,
        amount: Wad,
        interest_rate: Ray,
        adjustment: Wad,
        now: Timestamp,
    ) -> Result<()> {
        self.touch(now)?;
        if amount > self.scr {
            return Err(LedgerError::UnlockExceedsScr {
                amount,
                scr: self.scr,
            }
            .into());
        }
        self.scr -= amount;
        if self.scr.is_zero() {
            self.scr_rate_sum = Wad::ZERO;
        } else {
            self.scr_rate_sum = (self.scr_rate_sum - amount.mul_ray(interest_rate)).max_zero();
        }
        self.discrete_change(adjustment)?;
        debug!(tranche = %self.id, %amount, %adjustment, scr = %self.scr, "Unlocked scr");
        Ok(())
    }

    /// Lend capital to the pool: holders' capital shrinks, the debt grows
    pub(crate) fn lend_from_pool(&mut self, amount: Wad, now: Timestamp) -> Result<()> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount.into());
        }
        self.touch(now)?;
        self.discrete_change(-amount)?;
        self.pool_loan += amount;
        debug!(tranche = %self.id, %amount, pool_loan = %self.pool_loan, "Lent to pool");
        Ok(())
    }

    pub(crate) fn repay_pool_loan(&mut self, amount: Wad, now: Timestamp) -> Result<()> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount.into());
        }
        self.touch(now)?;
        if amount > self.pool_loan {
            return Err(LedgerError::RepayExceedsLoan {
                amount,
                loan: self.pool_loan,
            }
            .into());
        }
        self.pool_loan -= amount;
        self.discrete_change(amount)?;
        debug!(tranche = %self.id, %amount, pool_loan = %self.pool_loan, "Pool loan repaid");
        Ok(())
    }

    /// Credit (or debit) external yield to holders
    pub(crate) fn apply_earnings(&mut self, delta: Wad, now: Timestamp) -> Result<()> {
        self.touch(now)?;
        self.discrete_change(delta)
    }

    // ---------- Administration ----------

    pub(crate) fn set_deposits_enabled(&mut self, enabled: bool) {
        self.deposits_enabled = enabled;
    }

    pub(crate) fn acceptance_mut(&mut self) -> &mut AcceptancePolicy {
        &mut self.acceptance
    }
}
