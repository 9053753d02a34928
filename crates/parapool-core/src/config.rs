//! Pool configuration
//!
//! A [`PoolSetup`] is read from a TOML, YAML or JSON file and overlaid with
//! `PARAPOOL__*` environment variables (`PARAPOOL__TREASURY=...`).

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use parapool_common::{AccountId, PoolError, Ray, Result, TrancheId, Wad, WEEK};

use crate::asset_manager::{FixedRateAssetManager, LiquidityThresholds};
use crate::insolvency::{GrantInsolvencyHook, InsolvencyHook, LpInsolvencyHook};
use crate::pool::{Collaborators, PolicyPool};
use crate::risk_module::RiskModuleParams;
use crate::tranche::TrancheParams;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "PARAPOOL";

fn default_tweak_cooldown() -> i64 {
    WEEK
}

fn default_cover_ratio() -> Ray {
    Ray::ONE
}

/// Complete description of a pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSetup {
    /// Account holding the pool's cash
    pub pool_account: AccountId,
    /// Receives protocol fees and withdrawn won premiums
    pub treasury: AccountId,
    /// Seconds between two `Level3` tweaks of one parameter
    #[serde(default = "default_tweak_cooldown")]
    pub tweak_cooldown: i64,
    #[serde(default)]
    pub tranches: Vec<TrancheParams>,
    #[serde(default)]
    pub risk_modules: Vec<RiskModuleSetup>,
    #[serde(default)]
    pub asset_manager: Option<AssetManagerSetup>,
    #[serde(default)]
    pub insolvency_hook: Option<HookSetup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskModuleSetup {
    pub name: String,
    pub params: RiskModuleParams,
}

/// Fixed-rate asset manager settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetManagerSetup {
    pub liquidity_min: Wad,
    pub liquidity_middle: Wad,
    pub liquidity_max: Wad,
    pub annual_rate: Ray,
    pub vault_account: AccountId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HookSetup {
    Grant {
        granter: AccountId,
    },
    LiquidityProvider {
        provider: AccountId,
        #[serde(default = "default_cover_ratio")]
        cover_ratio: Ray,
        #[serde(default)]
        tranche: Option<TrancheId>,
    },
}

impl PoolSetup {
    /// Load from `path`, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();

        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .map_err(|e| PoolError::Config(e.to_string()))?;
        Self::from_settings(settings)
    }

    /// Parse a TOML document, without environment overrides
    pub fn from_toml(document: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(document, config::FileFormat::Toml))
            .build()
            .map_err(|e| PoolError::Config(e.to_string()))?;
        Self::from_settings(settings)
    }

    fn from_settings(settings: config::Config) -> Result<Self> {
        let setup: PoolSetup = settings
            .try_deserialize()
            .map_err(|e| PoolError::Config(e.to_string()))?;
        setup.validate()?;
        Ok(setup)
    }

    /// Check the whole configuration surface
    pub fn validate(&self) -> Result<()> {
        if self.pool_account.as_str().is_empty() || self.treasury.as_str().is_empty() {
            return Err(PoolError::Config("pool_account and treasury are required".into()));
        }
        if self.tweak_cooldown < 0 {
            return Err(PoolError::Config("tweak_cooldown cannot be negative".into()));
        }
        for tranche in &self.tranches {
            if tranche.expiration_period <= 0 {
                return Err(PoolError::Config(format!(
                    "tranche {}: expiration_period must be positive",
                    tranche.name
                )));
            }
            if tranche.pool_loan_interest_rate.is_negative() {
                return Err(PoolError::Config(format!(
                    "tranche {}: pool_loan_interest_rate cannot be negative",
                    tranche.name
                )));
            }
        }
        for rm in &self.risk_modules {
            rm.params
                .validate()
                .map_err(|e| PoolError::Config(format!("risk module {}: {e}", rm.name)))?;
        }
        if let Some(am) = &self.asset_manager {
            LiquidityThresholds::new(am.liquidity_min, am.liquidity_middle, am.liquidity_max)
                .map_err(|e| PoolError::Config(e.to_string()))?;
            if am.annual_rate <= -Ray::ONE {
                return Err(PoolError::Config("annual_rate must be above -100%".into()));
            }
        }
        if let Some(HookSetup::LiquidityProvider {
            cover_ratio,
            tranche,
            ..
        }) = &self.insolvency_hook
        {
            if *cover_ratio < Ray::ONE {
                return Err(PoolError::Config("cover_ratio must be at least 1".into()));
            }
            if let Some(id) = tranche {
                if id.0 as usize >= self.tranches.len() {
                    return Err(PoolError::Config(format!("unknown tranche {id}")));
                }
            }
        }
        Ok(())
    }

    /// Construct the pool
    pub fn build(&self, collaborators: Collaborators) -> Result<PolicyPool> {
        self.validate()?;
        let now = collaborators.clock.now();
        let mut pool = PolicyPool::new(self.pool_account.clone(), self.treasury.clone(), collaborators)
            .with_tweak_cooldown(self.tweak_cooldown);

        for tranche in &self.tranches {
            pool.add_tranche(tranche)?;
        }
        for rm in &self.risk_modules {
            pool.add_risk_module(&rm.name, rm.params.clone())?;
        }
        if let Some(am) = &self.asset_manager {
            let thresholds = LiquidityThresholds::new(am.liquidity_min, am.liquidity_middle, am.liquidity_max)?;
            let manager = FixedRateAssetManager::new(thresholds, am.annual_rate, am.vault_account.clone(), now)?;
            pool = pool.with_asset_manager(Box::new(manager));
        }
        if let Some(hook) = &self.insolvency_hook {
            let hook: Arc<dyn InsolvencyHook> = match hook {
                HookSetup::Grant { granter } => Arc::new(GrantInsolvencyHook::new(granter.clone())),
                HookSetup::LiquidityProvider {
                    provider,
                    cover_ratio,
                    tranche,
                } => Arc::new(LpInsolvencyHook::new(provider.clone(), *cover_ratio, *tranche)?),
            };
            pool = pool.with_insolvency_hook(hook);
        }

        info!(
            tranches = self.tranches.len(),
            risk_modules = self.risk_modules.len(),
            "Pool built"
        );
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parapool_common::{
        InMemoryCurrency, InMemoryPolicyRegistry, ManualClock, RoleRegistry, SECONDS_PER_YEAR,
    };
    use rust_decimal_macros::dec;

    const DOCUMENT: &str = r#"
pool_account = "POOL"
treasury = "TREASURY"

[[tranches]]
name = "senior"
expiration_period = 31536000
pool_loan_interest_rate = "0.05"

[[tranches]]
name = "junior"
expiration_period = 604800
accept_all_rms = false
exceptions = [1]

[[risk_modules]]
name = "roulette"

[risk_modules.params]
scr_percentage = "1"
ensuro_fee = "0.03"
scr_interest_rate = "0.02"
max_scr_per_policy = "1000"
scr_limit = "1000000"
wallet = "RM_WALLET"

[asset_manager]
liquidity_min = "100"
liquidity_middle = "200"
liquidity_max = "300"
annual_rate = "0.04"
vault_account = "VAULT"

[insolvency_hook]
kind = "liquidity_provider"
provider = "BACKSTOP"
cover_ratio = "1.5"
tranche = 0
"#;

    fn collaborators() -> Collaborators {
        Collaborators {
            currency: Arc::new(InMemoryCurrency::new()),
            access: Arc::new(RoleRegistry::new()),
            registry: Arc::new(InMemoryPolicyRegistry::new()),
            clock: Arc::new(ManualClock::new(1_700_000_000)),
        }
    }

    #[test]
    fn test_parse_full_document() {
        let setup = PoolSetup::from_toml(DOCUMENT).unwrap();
        assert_eq!(setup.tweak_cooldown, WEEK);
        assert_eq!(setup.tranches.len(), 2);
        assert_eq!(setup.tranches[0].expiration_period, SECONDS_PER_YEAR);
        assert_eq!(setup.tranches[0].pool_loan_interest_rate, Ray::new(dec!(0.05)));
        assert!(setup.tranches[0].accept_all_rms);
        assert!(!setup.tranches[1].accept_all_rms);
        assert_eq!(setup.risk_modules[0].params.moc, Ray::ONE);
        assert!(matches!(
            setup.insolvency_hook,
            Some(HookSetup::LiquidityProvider { tranche: Some(TrancheId(0)), .. })
        ));
    }

    #[test]
    fn test_build_pool() {
        let setup = PoolSetup::from_toml(DOCUMENT).unwrap();
        let pool = setup.build(collaborators()).unwrap();
        assert_eq!(pool.tranches().len(), 2);
        assert!(pool.asset_manager().is_some());
        assert_eq!(pool.risk_module(parapool_common::RiskModuleId(1)).unwrap().name(), "roulette");
    }

    #[test]
    fn test_rejects_bad_thresholds() {
        let document = DOCUMENT.replace("liquidity_min = \"100\"", "liquidity_min = \"500\"");
        assert!(matches!(PoolSetup::from_toml(&document), Err(PoolError::Config(_))));
    }

    #[test]
    fn test_rejects_moc_out_of_range() {
        let document = DOCUMENT.replace("scr_percentage = \"1\"", "scr_percentage = \"1\"\nmoc = \"3\"");
        assert!(matches!(PoolSetup::from_toml(&document), Err(PoolError::Config(_))));
    }
}
