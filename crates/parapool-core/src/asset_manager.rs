//! Asset Manager - moves pool float between idle cash and a yield source
//!
//! `checkpoint` is the single synchronization point:
//! - idle above `liquidity_max`: invest `idle - liquidity_middle`
//! - idle below `liquidity_min`: deinvest `liquidity_middle - idle`, capped
//!   at the investment value
//! - otherwise nothing moves
//!
//! Earnings are tracked as the change in investment value since the last
//! distribution, net of cash moved in or out.

use std::fmt::Debug;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use parapool_common::{AccountId, Currency, PoolError, Ray, Result, Timestamp, Wad, SECONDS_PER_YEAR};

/// Idle cash band kept in the pool
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidityThresholds {
    pub liquidity_min: Wad,
    pub liquidity_middle: Wad,
    pub liquidity_max: Wad,
}

impl LiquidityThresholds {
    pub fn new(liquidity_min: Wad, liquidity_middle: Wad, liquidity_max: Wad) -> Result<Self> {
        let thresholds = Self {
            liquidity_min,
            liquidity_middle,
            liquidity_max,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<()> {
        if self.liquidity_min.is_negative()
            || self.liquidity_min > self.liquidity_middle
            || self.liquidity_middle > self.liquidity_max
        {
            return Err(PoolError::validation(
                "liquidity thresholds must satisfy 0 <= min <= middle <= max",
            ));
        }
        Ok(())
    }
}

/// Decision taken at a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rebalance {
    Invest(Wad),
    Deinvest(Wad),
    Hold,
}

/// Strategy for investing pool float
pub trait AssetManager: Send + Sync + Debug {
    fn thresholds(&self) -> &LiquidityThresholds;

    /// Mark-to-model value of the current investment
    fn investment_value(&self, now: Timestamp) -> Wad;

    /// Move `amount` from the pool's idle cash into the yield source
    fn invest(&mut self, currency: &dyn Currency, pool: &AccountId, amount: Wad, now: Timestamp) -> Result<()>;

    /// Move up to `amount` back to the pool. Returns the amount moved.
    fn deinvest(&mut self, currency: &dyn Currency, pool: &AccountId, amount: Wad, now: Timestamp) -> Result<Wad>;

    /// Earnings (or losses) not yet distributed
    fn pending_earnings(&self, now: Timestamp) -> Wad;

    /// Record that everything pending at `now` has been distributed
    fn mark_distributed(&mut self, now: Timestamp);

    /// What a checkpoint with `idle` cash should do
    fn plan(&self, idle: Wad, now: Timestamp) -> Rebalance {
        let t = self.thresholds();
        if idle > t.liquidity_max {
            Rebalance::Invest(idle - t.liquidity_middle)
        } else if idle < t.liquidity_min {
            let wanted = (t.liquidity_middle - idle).min(self.investment_value(now));
            if wanted.is_positive() {
                Rebalance::Deinvest(wanted)
            } else {
                Rebalance::Hold
            }
        } else {
            Rebalance::Hold
        }
    }

    /// Bring every invested unit back to idle cash
    fn deinvest_all(&mut self, currency: &dyn Currency, pool: &AccountId, now: Timestamp) -> Result<Wad> {
        let value = self.investment_value(now);
        if value.is_positive() {
            self.deinvest(currency, pool, value, now)
        } else {
            Ok(Wad::ZERO)
        }
    }
}

/// Yield source growing at a fixed annual rate, compounded continuously
/// over fractional years. Negative rates model a depreciating investment.
///
/// Cash sits in `vault`, which must hold enough to pay out accrued yield.
#[derive(Debug, Clone)]
pub struct FixedRateAssetManager {
    thresholds: LiquidityThresholds,
    annual_rate: Ray,
    vault: AccountId,
    /// Value at `since`
    principal: Wad,
    since: Timestamp,
    /// Value already accounted for in the pool
    distributed_value: Wad,
}

impl FixedRateAssetManager {
    pub fn new(thresholds: LiquidityThresholds, annual_rate: Ray, vault: AccountId, now: Timestamp) -> Result<Self> {
        thresholds.validate()?;
        if annual_rate <= -Ray::ONE {
            return Err(PoolError::validation("annual_rate must be above -100%"));
        }
        Ok(Self {
            thresholds,
            annual_rate,
            vault,
            principal: Wad::ZERO,
            since: now,
            distributed_value: Wad::ZERO,
        })
    }

    pub fn vault(&self) -> &AccountId {
        &self.vault
    }

    fn roll_forward(&mut self, now: Timestamp) {
        self.principal = self.investment_value(now);
        self.since = self.since.max(now);
    }
}

impl AssetManager for FixedRateAssetManager {
    fn thresholds(&self) -> &LiquidityThresholds {
        &self.thresholds
    }

    fn investment_value(&self, now: Timestamp) -> Wad {
        let elapsed = now - self.since;
        if elapsed <= 0 || self.principal.is_zero() || self.annual_rate.is_zero() {
            return self.principal;
        }
        let years = Decimal::from(elapsed) / Decimal::from(SECONDS_PER_YEAR);
        let growth = (Ray::ONE + self.annual_rate).powd(years);
        self.principal.mul_ray(growth)
    }

    fn invest(&mut self, currency: &dyn Currency, pool: &AccountId, amount: Wad, now: Timestamp) -> Result<()> {
        if !amount.is_positive() {
            return Ok(());
        }
        currency.transfer(pool, &self.vault, amount)?;
        self.roll_forward(now);
        self.principal += amount;
        self.distributed_value += amount;
        info!(%amount, value = %self.principal, "Invested idle cash");
        Ok(())
    }

    fn deinvest(&mut self, currency: &dyn Currency, pool: &AccountId, amount: Wad, now: Timestamp) -> Result<Wad> {
        self.roll_forward(now);
        let amount = amount.min(self.principal);
        if !amount.is_positive() {
            return Ok(Wad::ZERO);
        }
        currency.transfer(&self.vault, pool, amount)?;
        self.principal -= amount;
        self.distributed_value -= amount;
        info!(%amount, value = %self.principal, "Deinvested to idle cash");
        Ok(amount)
    }

    fn pending_earnings(&self, now: Timestamp) -> Wad {
        self.investment_value(now) - self.distributed_value
    }

    fn mark_distributed(&mut self, now: Timestamp) {
        self.distributed_value = self.investment_value(now);
    }
}
