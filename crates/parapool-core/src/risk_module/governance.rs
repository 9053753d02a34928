//! Tiered parameter governance
//!
//! Every tunable parameter has one row in [`RULES`]. A single routine,
//! [`apply_tweak`], consults the row for:
//! - the sanity range, enforced for every tier
//! - the relative step allowed at `Level3`, plus a cooldown between tweaks
//! - whether increases are capped by pool liquidity unless the caller is `Level1`

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use parapool_common::{
    AccessControl, AccountId, GovernanceError, Parameter, PoolError, Result, Role, Timestamp,
};

use super::{ParameterValue, RiskModule};

/// 10%
const TENTH: Decimal = Decimal::from_parts(1, 0, 0, false, 1);
/// 30%
const THIRTY_PCT: Decimal = Decimal::from_parts(3, 0, 0, false, 1);
const HALF: Decimal = Decimal::from_parts(5, 0, 0, false, 1);
const TWO: Decimal = Decimal::from_parts(2, 0, 0, false, 0);

/// Share of total tranche liquidity an scr limit may reach without `Level1`
pub const LIQUIDITY_FRACTION: Decimal = TENTH;

/// Governance tier of a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Level1,
    Level2,
    Level3,
}

impl Tier {
    /// Highest tier held by `caller`
    pub fn of(access: &dyn AccessControl, caller: &AccountId) -> Option<Tier> {
        [Tier::Level1, Tier::Level2, Tier::Level3]
            .into_iter()
            .find(|tier| access.has_role(&tier.role(), caller))
    }

    pub fn role(self) -> Role {
        match self {
            Tier::Level1 => Role::Level1,
            Tier::Level2 => Role::Level2,
            Tier::Level3 => Role::Level3,
        }
    }
}

/// One side of a sanity range
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Inclusive(Decimal),
    Exclusive(Decimal),
    Unbounded,
}

/// Governance row of a numeric parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TweakRule {
    pub parameter: Parameter,
    pub lower: Bound,
    pub upper: Bound,
    /// Largest relative change allowed at `Level3`
    pub max_tweak: Decimal,
    /// Increases above [`LIQUIDITY_FRACTION`] of total liquidity need `Level1`
    pub liquidity_bound: bool,
}

pub const RULES: [TweakRule; 7] = [
    TweakRule {
        parameter: Parameter::ScrPercentage,
        lower: Bound::Exclusive(Decimal::ZERO),
        upper: Bound::Inclusive(Decimal::ONE),
        max_tweak: TENTH,
        liquidity_bound: false,
    },
    TweakRule {
        parameter: Parameter::EnsuroFee,
        lower: Bound::Inclusive(Decimal::ZERO),
        upper: Bound::Inclusive(Decimal::ONE),
        max_tweak: THIRTY_PCT,
        liquidity_bound: false,
    },
    TweakRule {
        parameter: Parameter::ScrInterestRate,
        lower: Bound::Inclusive(Decimal::ZERO),
        upper: Bound::Inclusive(Decimal::ONE),
        max_tweak: THIRTY_PCT,
        liquidity_bound: false,
    },
    TweakRule {
        parameter: Parameter::Moc,
        lower: Bound::Inclusive(HALF),
        upper: Bound::Inclusive(TWO),
        max_tweak: TENTH,
        liquidity_bound: false,
    },
    TweakRule {
        parameter: Parameter::MaxScrPerPolicy,
        lower: Bound::Exclusive(Decimal::ZERO),
        upper: Bound::Unbounded,
        max_tweak: THIRTY_PCT,
        liquidity_bound: false,
    },
    TweakRule {
        parameter: Parameter::ScrLimit,
        lower: Bound::Exclusive(Decimal::ZERO),
        upper: Bound::Unbounded,
        max_tweak: TENTH,
        liquidity_bound: true,
    },
    TweakRule {
        parameter: Parameter::SharedCoverageMinPercentage,
        lower: Bound::Inclusive(Decimal::ZERO),
        upper: Bound::Exclusive(Decimal::ONE),
        max_tweak: TENTH,
        liquidity_bound: false,
    },
];

pub fn rule_for(parameter: Parameter) -> Option<&'static TweakRule> {
    RULES.iter().find(|rule| rule.parameter == parameter)
}

impl TweakRule {
    /// Enforce the sanity range
    pub fn check_range(&self, value: Decimal) -> Result<()> {
        let lower_ok = match self.lower {
            Bound::Inclusive(b) => value >= b,
            Bound::Exclusive(b) => value > b,
            Bound::Unbounded => true,
        };
        let upper_ok = match self.upper {
            Bound::Inclusive(b) => value <= b,
            Bound::Exclusive(b) => value < b,
            Bound::Unbounded => true,
        };
        if lower_ok && upper_ok {
            Ok(())
        } else {
            Err(GovernanceError::OutOfRange {
                parameter: self.parameter.to_string(),
                range: self.describe_range(),
            }
            .into())
        }
    }

    fn describe_range(&self) -> String {
        let lower = match self.lower {
            Bound::Inclusive(b) => format!("[{b}"),
            Bound::Exclusive(b) => format!("({b}"),
            Bound::Unbounded => "(-inf".to_string(),
        };
        let upper = match self.upper {
            Bound::Inclusive(b) => format!("{b}]"),
            Bound::Exclusive(b) => format!("{b})"),
            Bound::Unbounded => "inf)".to_string(),
        };
        format!("{lower}, {upper}")
    }
}

/// Pool-wide facts a tweak is judged against
#[derive(Debug, Clone, Copy)]
pub struct TweakContext {
    pub now: Timestamp,
    /// Total supply across every tranche
    pub total_liquidity: Decimal,
    /// Minimum seconds between two `Level3` tweaks of the same parameter
    pub cooldown: i64,
}

/// Apply `value` to `rm` on behalf of a caller of `tier`.
///
/// Nothing is mutated unless every check passes.
pub fn apply_tweak(
    rm: &mut RiskModule,
    tier: Tier,
    value: &ParameterValue,
    ctx: &TweakContext,
) -> Result<()> {
    let parameter = value.parameter();
    let rule = rule_for(parameter).ok_or_else(|| {
        PoolError::validation(format!("{parameter} is not governed by tiers"))
    })?;
    let new = value
        .as_decimal()
        .ok_or_else(|| PoolError::validation(format!("{parameter} is not numeric")))?;
    rule.check_range(new)?;

    let old = rm.params().get(parameter).unwrap_or_default();

    if tier == Tier::Level3 {
        let within_step = if old.is_zero() {
            new.is_zero()
        } else {
            ((new - old) / old).abs() <= rule.max_tweak
        };
        if !within_step {
            return Err(GovernanceError::TweakBoundExceeded {
                parameter: parameter.to_string(),
                max_change: rule.max_tweak.to_string(),
            }
            .into());
        }
        if let Some(last) = rm.last_tweak(parameter) {
            let next_allowed = last + ctx.cooldown;
            if ctx.now < next_allowed {
                return Err(GovernanceError::TweakCooldownViolation {
                    parameter: parameter.to_string(),
                    next_allowed,
                }
                .into());
            }
        }
    }

    if rule.liquidity_bound
        && tier != Tier::Level1
        && new > old
        && ctx.total_liquidity > Decimal::ZERO
        && new > ctx.total_liquidity * LIQUIDITY_FRACTION
    {
        return Err(GovernanceError::RequiresTier {
            parameter: parameter.to_string(),
            role: Role::Level1,
        }
        .into());
    }

    rm.params_mut().set(value)?;
    if tier == Tier::Level3 {
        rm.record_tweak(parameter, ctx.now);
    }
    info!(rm = %rm.id(), %parameter, ?tier, value = %new, "Parameter changed");
    Ok(())
}
