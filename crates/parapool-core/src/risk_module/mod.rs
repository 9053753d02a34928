//! Risk Module - policy factory and parameter holder
//!
//! A risk module prices policies from caller-supplied loss probabilities:
//!
//! ```text
//! pure_premium       = payout * loss_prob * moc
//! rm_coverage        = payout * shared_coverage_min_percentage
//! scr                = payout * scr_percentage - pure_premium - rm_coverage
//! premium_for_lps    = scr * scr_interest_rate * duration / YEAR
//! premium_for_ensuro = (pure_premium + premium_for_lps) * ensuro_fee
//! rm_shared_premium  = premium * shared_coverage_min_percentage
//! premium_for_rm     = premium - pure_premium - premium_for_lps
//!                      - premium_for_ensuro - rm_shared_premium
//! ```
//!
//! Locking, cash collection and lifecycle bookkeeping are driven by the pool.

pub mod governance;

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use parapool_common::{
    simple_interest, AccountId, Parameter, PolicyError, PolicyId, PoolError, Ray, Result,
    RiskModuleId, Timestamp, Wad,
};

use crate::policy::{Policy, PolicyRequest};

pub use governance::{apply_tweak, Tier, TweakContext, TweakRule, RULES};

fn default_moc() -> Ray {
    Ray::ONE
}

/// Tunable parameters of a risk module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskModuleParams {
    /// Share of the payout backed by collateral
    pub scr_percentage: Ray,
    /// Protocol fee over pure premium and lp interest
    pub ensuro_fee: Ray,
    /// Annual rate paid on locked collateral
    pub scr_interest_rate: Ray,
    /// Margin of conservativism applied to the pure premium
    #[serde(default = "default_moc")]
    pub moc: Ray,
    pub max_scr_per_policy: Wad,
    /// Cap on the scr of all active policies of the module
    pub scr_limit: Wad,
    /// Receives the risk module's premium share and funds its coverage
    pub wallet: AccountId,
    #[serde(default)]
    pub shared_coverage_min_percentage: Ray,
}

/// New value for one parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "parameter", content = "value")]
pub enum ParameterValue {
    ScrPercentage(Ray),
    EnsuroFee(Ray),
    ScrInterestRate(Ray),
    Moc(Ray),
    MaxScrPerPolicy(Wad),
    ScrLimit(Wad),
    SharedCoverageMinPercentage(Ray),
    Wallet(AccountId),
}

impl ParameterValue {
    pub fn parameter(&self) -> Parameter {
        match self {
            ParameterValue::ScrPercentage(_) => Parameter::ScrPercentage,
            ParameterValue::EnsuroFee(_) => Parameter::EnsuroFee,
            ParameterValue::ScrInterestRate(_) => Parameter::ScrInterestRate,
            ParameterValue::Moc(_) => Parameter::Moc,
            ParameterValue::MaxScrPerPolicy(_) => Parameter::MaxScrPerPolicy,
            ParameterValue::ScrLimit(_) => Parameter::ScrLimit,
            ParameterValue::SharedCoverageMinPercentage(_) => Parameter::SharedCoverageMinPercentage,
            ParameterValue::Wallet(_) => Parameter::Wallet,
        }
    }

    /// Numeric value, `None` for the wallet
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            ParameterValue::ScrPercentage(r)
            | ParameterValue::EnsuroFee(r)
            | ParameterValue::ScrInterestRate(r)
            | ParameterValue::Moc(r)
            | ParameterValue::SharedCoverageMinPercentage(r) => Some(r.raw()),
            ParameterValue::MaxScrPerPolicy(w) | ParameterValue::ScrLimit(w) => Some(w.raw()),
            ParameterValue::Wallet(_) => None,
        }
    }
}

impl RiskModuleParams {
    pub fn get(&self, parameter: Parameter) -> Option<Decimal> {
        match parameter {
            Parameter::ScrPercentage => Some(self.scr_percentage.raw()),
            Parameter::EnsuroFee => Some(self.ensuro_fee.raw()),
            Parameter::ScrInterestRate => Some(self.scr_interest_rate.raw()),
            Parameter::Moc => Some(self.moc.raw()),
            Parameter::MaxScrPerPolicy => Some(self.max_scr_per_policy.raw()),
            Parameter::ScrLimit => Some(self.scr_limit.raw()),
            Parameter::SharedCoverageMinPercentage => Some(self.shared_coverage_min_percentage.raw()),
            Parameter::Wallet => None,
        }
    }

    pub fn set(&mut self, value: &ParameterValue) -> Result<()> {
        match value {
            ParameterValue::ScrPercentage(r) => self.scr_percentage = *r,
            ParameterValue::EnsuroFee(r) => self.ensuro_fee = *r,
            ParameterValue::ScrInterestRate(r) => self.scr_interest_rate = *r,
            ParameterValue::Moc(r) => self.moc = *r,
            ParameterValue::MaxScrPerPolicy(w) => self.max_scr_per_policy = *w,
            ParameterValue::ScrLimit(w) => self.scr_limit = *w,
            ParameterValue::SharedCoverageMinPercentage(r) => self.shared_coverage_min_percentage = *r,
            ParameterValue::Wallet(wallet) => {
                if wallet.as_str().is_empty() {
                    return Err(PoolError::validation("wallet cannot be empty"));
                }
                self.wallet = wallet.clone();
            }
        }
        Ok(())
    }

    /// Check every parameter against its sanity range
    pub fn validate(&self) -> Result<()> {
        for rule in RULES.iter() {
            if let Some(value) = self.get(rule.parameter) {
                rule.check_range(value)?;
            }
        }
        if self.wallet.as_str().is_empty() {
            return Err(PoolError::validation("wallet cannot be empty"));
        }
        Ok(())
    }
}

/// Premium breakdown of a prospective policy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PremiumSplit {
    pub pure_premium: Wad,
    pub scr: Wad,
    pub rm_coverage: Wad,
    pub premium_for_lps: Wad,
    pub premium_for_ensuro: Wad,
    pub rm_shared_premium: Wad,
    /// Negative when the premium does not cover the other parts
    pub premium_for_rm: Wad,
}

/// A risk module
#[derive(Debug, Clone)]
pub struct RiskModule {
    id: RiskModuleId,
    name: String,
    params: RiskModuleParams,
    /// Scr of every active policy of the module
    total_scr: Wad,
    /// Last `Level3` change per parameter
    last_tweaks: HashMap<Parameter, Timestamp>,
}

impl RiskModule {
    pub fn new(id: RiskModuleId, name: impl Into<String>, params: RiskModuleParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            id,
            name: name.into(),
            params,
            total_scr: Wad::ZERO,
            last_tweaks: HashMap::new(),
        })
    }

    #[inline]
    pub fn id(&self) -> RiskModuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &RiskModuleParams {
        &self.params
    }

    pub(crate) fn params_mut(&mut self) -> &mut RiskModuleParams {
        &mut self.params
    }

    pub fn wallet(&self) -> &AccountId {
        &self.params.wallet
    }

    pub fn total_scr(&self) -> Wad {
        self.total_scr
    }

    pub fn last_tweak(&self, parameter: Parameter) -> Option<Timestamp> {
        self.last_tweaks.get(&parameter).copied()
    }

    pub(crate) fn record_tweak(&mut self, parameter: Parameter, now: Timestamp) {
        self.last_tweaks.insert(parameter, now);
    }

    /// Deterministic policy id for `internal_id`
    pub fn make_policy_id(&self, internal_id: u128) -> Result<PolicyId> {
        PolicyId::new(self.id, internal_id)
    }

    /// Premium split for the given terms, without any capacity checks
    pub fn premium_split(
        &self,
        payout: Wad,
        premium: Wad,
        loss_prob: Ray,
        expiration: Timestamp,
        now: Timestamp,
    ) -> PremiumSplit {
        let p = &self.params;
        let pure_premium = payout.mul_ray(loss_prob).mul_ray(p.moc);
        let rm_coverage = payout.mul_ray(p.shared_coverage_min_percentage);
        let scr = payout.mul_ray(p.scr_percentage) - pure_premium - rm_coverage;
        let premium_for_lps = simple_interest(scr.max_zero(), p.scr_interest_rate, expiration - now);
        let premium_for_ensuro = (pure_premium + premium_for_lps).mul_ray(p.ensuro_fee);
        let rm_shared_premium = premium.mul_ray(p.shared_coverage_min_percentage);
        let premium_for_rm =
            premium - pure_premium - premium_for_lps - premium_for_ensuro - rm_shared_premium;
        PremiumSplit {
            pure_premium,
            scr,
            rm_coverage,
            premium_for_lps,
            premium_for_ensuro,
            rm_shared_premium,
            premium_for_rm,
        }
    }

    /// Smallest premium leaving a non-negative share for the risk module:
    /// `(pure_premium + premium_for_lps) * (1 + ensuro_fee) / (1 - shared_coverage)`
    pub fn minimum_premium(
        &self,
        payout: Wad,
        loss_prob: Ray,
        expiration: Timestamp,
        now: Timestamp,
    ) -> Wad {
        let split = self.premium_split(payout, Wad::ZERO, loss_prob, expiration, now);
        let required = split.pure_premium + split.premium_for_lps + split.premium_for_ensuro;
        let keep = Ray::ONE - self.params.shared_coverage_min_percentage;
        required.div_ray(keep)
    }

    /// Price a policy and check it against the module's capacity.
    ///
    /// Nothing is mutated; the pool commits the result.
    pub fn price_policy(&self, request: &PolicyRequest, now: Timestamp) -> Result<Policy> {
        if !request.payout.is_positive() {
            return Err(PoolError::validation("payout must be positive"));
        }
        if request.premium.is_negative() || request.premium > request.payout {
            return Err(PoolError::validation("premium must be within [0, payout]"));
        }
        if request.loss_prob.is_negative() || request.loss_prob > Ray::ONE {
            return Err(PoolError::validation("loss_prob must be within [0, 1]"));
        }
        if request.expiration <= now {
            return Err(PoolError::validation("expiration must be in the future"));
        }
        let id = self.make_policy_id(request.internal_id)?;

        let split = self.premium_split(
            request.payout,
            request.premium,
            request.loss_prob,
            request.expiration,
            now,
        );
        if !split.scr.is_positive() {
            return Err(PoolError::validation(format!(
                "policy requires no collateral (scr = {})",
                split.scr
            )));
        }
        if split.premium_for_rm.is_negative() {
            return Err(PolicyError::InsufficientPremium {
                offered: request.premium,
                minimum: self.minimum_premium(
                    request.payout,
                    request.loss_prob,
                    request.expiration,
                    now,
                ),
            }
            .into());
        }
        if split.scr > self.params.max_scr_per_policy {
            return Err(PolicyError::CapacityExceeded(format!(
                "scr {} above max_scr_per_policy {}",
                split.scr, self.params.max_scr_per_policy
            ))
            .into());
        }
        if self.total_scr + split.scr > self.params.scr_limit {
            return Err(PolicyError::CapacityExceeded(format!(
                "scr {} would push {} above scr_limit {}",
                split.scr, self.name, self.params.scr_limit
            ))
            .into());
        }

        debug!(rm = %self.id, policy = %id, scr = %split.scr, "Priced policy");
        Ok(Policy {
            id,
            risk_module: self.id,
            payout: request.payout,
            premium: request.premium,
            loss_prob: request.loss_prob,
            pure_premium: split.pure_premium,
            scr: split.scr,
            rm_coverage: split.rm_coverage,
            interest_rate: self.params.scr_interest_rate,
            start: now,
            expiration: request.expiration,
            premium_for_lps: split.premium_for_lps,
            premium_for_rm: split.premium_for_rm,
            premium_for_ensuro: split.premium_for_ensuro,
            rm_shared_premium: split.rm_shared_premium,
        })
    }

    pub(crate) fn add_scr(&mut self, scr: Wad) {
        self.total_scr += scr;
    }

    pub(crate) fn release_scr(&mut self, scr: Wad) {
        self.total_scr = (self.total_scr - scr).max_zero();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parapool_common::{SECONDS_PER_YEAR, WEEK};
    use rust_decimal_macros::dec;

    const NOW: Timestamp = 1_700_000_000;

    fn params() -> RiskModuleParams {
        RiskModuleParams {
            scr_percentage: Ray::ONE,
            ensuro_fee: Ray::ZERO,
            scr_interest_rate: Ray::ZERO,
            moc: Ray::ONE,
            max_scr_per_policy: Wad::from_units(10_000),
            scr_limit: Wad::from_units(100_000),
            wallet: AccountId::from("RM"),
            shared_coverage_min_percentage: Ray::ZERO,
        }
    }

    fn request(payout: i64, premium: Wad, loss_prob: Ray, expiration: Timestamp) -> PolicyRequest {
        PolicyRequest {
            payout: Wad::from_units(payout),
            premium,
            loss_prob,
            expiration,
            customer: AccountId::from("CUST1"),
            internal_id: 1,
        }
    }

    #[test]
    fn test_roulette_pricing() {
        let rm = RiskModule::new(RiskModuleId(1), "Roulette", params()).unwrap();
        let req = request(36, Wad::from_units(1), Ray::from_ratio(dec!(1), dec!(37)), NOW + WEEK);
        let policy = rm.price_policy(&req, NOW).unwrap();

        assert_eq!(policy.pure_premium.raw(), dec!(0.972972972972972973));
        assert_eq!(policy.scr.raw(), dec!(35.027027027027027027));
        assert_eq!(policy.pure_premium + policy.scr, policy.payout);
        assert_eq!(
            policy.premium_for_rm,
            Wad::from_units(1) - policy.pure_premium
        );
    }

    #[test]
    fn test_split_sums_to_premium() {
        let mut p = params();
        p.ensuro_fee = Ray::new(dec!(0.03));
        p.scr_interest_rate = Ray::new(dec!(0.075));
        p.shared_coverage_min_percentage = Ray::new(dec!(0.25));
        p.scr_percentage = Ray::new(dec!(0.8));
        let rm = RiskModule::new(RiskModuleId(1), "Shared", p).unwrap();

        let req = request(5100, Wad::from_units(200), Ray::from_ratio(dec!(1), dec!(60)), NOW + WEEK);
        let policy = rm.price_policy(&req, NOW).unwrap();

        assert_eq!(policy.rm_coverage, Wad::from_units(1275));
        assert_eq!(policy.rm_shared_premium, Wad::from_units(50));
        assert!(policy.premium_for_rm.is_positive());
        assert_eq!(
            policy.pure_premium
                + policy.premium_for_lps
                + policy.premium_for_ensuro
                + policy.premium_for_rm
                + policy.rm_shared_premium,
            policy.premium
        );
        assert_eq!(
            policy.scr,
            Wad::from_units(4080) - policy.pure_premium - policy.rm_coverage
        );
    }

    #[test]
    fn test_insufficient_premium() {
        let mut p = params();
        p.scr_interest_rate = Ray::new(dec!(0.1));
        p.ensuro_fee = Ray::new(dec!(0.02));
        let rm = RiskModule::new(RiskModuleId(1), "Tight", p).unwrap();

        let loss_prob = Ray::new(dec!(0.01));
        let expiration = NOW + SECONDS_PER_YEAR;
        let minimum = rm.minimum_premium(Wad::from_units(1000), loss_prob, expiration, NOW);
        // pure 10, scr 990, lps 99, fee 2.18
        assert_eq!(minimum, Wad::new(dec!(111.18)));

        let short = request(1000, Wad::new(dec!(111.17)), loss_prob, expiration);
        assert!(matches!(
            rm.price_policy(&short, NOW),
            Err(PoolError::Policy(PolicyError::InsufficientPremium { .. }))
        ));

        let exact = request(1000, minimum, loss_prob, expiration);
        let policy = rm.price_policy(&exact, NOW).unwrap();
        assert_eq!(policy.premium_for_rm, Wad::ZERO);
    }

    #[test]
    fn test_capacity_limits() {
        let mut p = params();
        p.max_scr_per_policy = Wad::from_units(500);
        p.scr_limit = Wad::from_units(800);
        let mut rm = RiskModule::new(RiskModuleId(1), "Small", p).unwrap();

        let too_big = request(600, Wad::from_units(10), Ray::ZERO, NOW + WEEK);
        assert!(matches!(
            rm.price_policy(&too_big, NOW),
            Err(PoolError::Policy(PolicyError::CapacityExceeded(_)))
        ));

        rm.add_scr(Wad::from_units(400));
        let over_limit = request(450, Wad::from_units(10), Ray::ZERO, NOW + WEEK);
        assert!(matches!(
            rm.price_policy(&over_limit, NOW),
            Err(PoolError::Policy(PolicyError::CapacityExceeded(_)))
        ));

        rm.release_scr(Wad::from_units(400));
        assert!(rm.price_policy(&over_limit, NOW).is_ok());
    }

    #[test]
    fn test_rejects_bad_terms() {
        let rm = RiskModule::new(RiskModuleId(1), "Roulette", params()).unwrap();
        let expired = request(100, Wad::from_units(1), Ray::ZERO, NOW);
        assert!(matches!(rm.price_policy(&expired, NOW), Err(PoolError::Validation(_))));

        let certain = request(100, Wad::from_units(100), Ray::ONE, NOW + WEEK);
        assert!(matches!(rm.price_policy(&certain, NOW), Err(PoolError::Validation(_))));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let mut p = params();
        p.moc = Ray::new(dec!(3));
        assert!(RiskModule::new(RiskModuleId(1), "Bad", p).is_err());
    }

    #[test]
    fn test_policy_id_embeds_module() {
        let rm = RiskModule::new(RiskModuleId(9), "Roulette", params()).unwrap();
        let id = rm.make_policy_id(77).unwrap();
        assert_eq!(id.risk_module(), RiskModuleId(9));
        assert_eq!(id.internal_id(), 77);
    }
}
