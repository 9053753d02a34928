//! Identifiers and capabilities shared across the pool

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, Result};

/// Unix timestamp in seconds
pub type Timestamp = i64;

/// Bits reserved for the risk-module-local part of a policy id
pub const INTERNAL_ID_BITS: u32 = 96;

/// Opaque account identifier (holder, wallet, treasury, pool)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        AccountId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        AccountId(id.to_string())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Index of a tranche in the pool's tranche arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrancheId(pub u32);

impl fmt::Display for TrancheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Risk module identifier, the high bits of every policy id it issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskModuleId(pub u32);

impl fmt::Display for RiskModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rm{}", self.0)
    }
}

/// Policy identifier: `(risk_module << 96) | internal_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyId(pub u128);

impl PolicyId {
    /// Derive the id of a policy from its risk module and caller-supplied internal id
    pub fn new(risk_module: RiskModuleId, internal_id: u128) -> Result<Self> {
        if internal_id >> INTERNAL_ID_BITS != 0 {
            return Err(PoolError::validation(format!(
                "internal id {internal_id} does not fit in {INTERNAL_ID_BITS} bits"
            )));
        }
        Ok(PolicyId(((risk_module.0 as u128) << INTERNAL_ID_BITS) | internal_id))
    }

    pub fn risk_module(self) -> RiskModuleId {
        RiskModuleId((self.0 >> INTERNAL_ID_BITS) as u32)
    }

    pub fn internal_id(self) -> u128 {
        self.0 & ((1u128 << INTERNAL_ID_BITS) - 1)
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capabilities checked through [`crate::AccessControl`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Top governance tier, unrestricted within sanity ranges
    Level1,
    /// Mid governance tier
    Level2,
    /// Lowest governance tier, bounded self-service tweaks
    Level3,
    /// May issue policies through a risk module
    Pricer(RiskModuleId),
    /// May resolve policies of a risk module
    Resolver(RiskModuleId),
    /// Owner of a risk module, may move its wallet
    RmProvider(RiskModuleId),
    /// May rebalance policy allocations
    Rebalancer,
    /// May deposit into whitelisted tranches
    LiquidityProvider,
    /// May withdraw won premiums and repay tranche loans
    Treasurer,
    /// May attach and detach the asset manager and insolvency hook
    Guardian,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Level1 => f.write_str("LEVEL1"),
            Role::Level2 => f.write_str("LEVEL2"),
            Role::Level3 => f.write_str("LEVEL3"),
            Role::Pricer(rm) => write!(f, "PRICER({rm})"),
            Role::Resolver(rm) => write!(f, "RESOLVER({rm})"),
            Role::RmProvider(rm) => write!(f, "RM_PROVIDER({rm})"),
            Role::Rebalancer => f.write_str("REBALANCER"),
            Role::LiquidityProvider => f.write_str("LIQUIDITY_PROVIDER"),
            Role::Treasurer => f.write_str("TREASURER"),
            Role::Guardian => f.write_str("GUARDIAN"),
        }
    }
}

/// Tunable risk module parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    ScrPercentage,
    EnsuroFee,
    ScrInterestRate,
    Moc,
    MaxScrPerPolicy,
    ScrLimit,
    SharedCoverageMinPercentage,
    Wallet,
}

impl Parameter {
    pub fn name(self) -> &'static str {
        match self {
            Parameter::ScrPercentage => "scr_percentage",
            Parameter::EnsuroFee => "ensuro_fee",
            Parameter::ScrInterestRate => "scr_interest_rate",
            Parameter::Moc => "moc",
            Parameter::MaxScrPerPolicy => "max_scr_per_policy",
            Parameter::ScrLimit => "scr_limit",
            Parameter::SharedCoverageMinPercentage => "shared_coverage_min_percentage",
            Parameter::Wallet => "wallet",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
