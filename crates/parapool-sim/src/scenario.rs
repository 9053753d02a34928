//! Scenario files
//!
//! A scenario is a pool configuration, the roles and balances to seed, and
//! an ordered list of steps:
//!
//! ```toml
//! start = 1700000000
//!
//! [pool]
//! pool_account = "POOL"
//! treasury = "TREASURY"
//!
//! [[roles]]
//! account = "OPS"
//! role = { pricer = 1 }
//!
//! [[steps]]
//! action = "deposit"
//! tranche = 0
//! lp = "LP1"
//! amount = "1000"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use parapool_common::{AccountId, Ray, RiskModuleId, Role, TrancheId, Wad};
use parapool_core::config::ENV_PREFIX;
use parapool_core::PoolSetup;

/// 2023-11-14T22:13:20Z
pub const DEFAULT_START: i64 = 1_700_000_000;

fn default_start() -> i64 {
    DEFAULT_START
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Clock value before the first step
    #[serde(default = "default_start")]
    pub start: i64,
    pub pool: PoolSetup,
    #[serde(default)]
    pub roles: Vec<RoleGrant>,
    #[serde(default)]
    pub funding: Vec<Funding>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleGrant {
    pub account: AccountId,
    pub role: Role,
}

/// Cash minted to `account` before the first step. The pool may pull all of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Funding {
    pub account: AccountId,
    pub amount: Wad,
}

/// One action against the pool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Deposit {
        tranche: TrancheId,
        lp: AccountId,
        amount: Wad,
    },
    /// Withdraw `amount`, or everything withdrawable when unset
    Withdraw {
        tranche: TrancheId,
        lp: AccountId,
        #[serde(default)]
        amount: Option<Wad>,
    },
    NewPolicy {
        rm: RiskModuleId,
        caller: AccountId,
        customer: AccountId,
        internal_id: u64,
        payout: Wad,
        premium: Wad,
        loss_prob: Ray,
        /// Seconds from the current clock
        duration: i64,
    },
    Resolve {
        rm: RiskModuleId,
        internal_id: u64,
        caller: AccountId,
        payout: Wad,
    },
    Expire {
        rm: RiskModuleId,
        internal_id: u64,
    },
    Rebalance {
        rm: RiskModuleId,
        internal_id: u64,
        caller: AccountId,
    },
    Advance {
        seconds: i64,
    },
    Checkpoint,
    Grant {
        from: AccountId,
        amount: Wad,
    },
    RepayLoan {
        tranche: TrancheId,
    },
    /// Log a snapshot of the pool
    Snapshot,
}

impl Scenario {
    /// Load from `path`, with `PARAPOOL__*` environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("reading scenario {}", path.display()))?;
        let scenario: Scenario = settings
            .try_deserialize()
            .with_context(|| format!("parsing scenario {}", path.display()))?;
        scenario.pool.validate()?;
        Ok(scenario)
    }

    /// Parse a TOML document, without environment overrides
    pub fn from_toml(document: &str) -> Result<Self> {
        let scenario: Scenario = config::Config::builder()
            .add_source(config::File::from_str(document, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        scenario.pool.validate()?;
        Ok(scenario)
    }
}
