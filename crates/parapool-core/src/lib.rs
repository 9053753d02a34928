//! # Parapool Core
//!
//! Accounting and risk allocation for a parametric-insurance capital pool.
//!
//! ## Components
//!
//! - [`tranche::CapitalTranche`]: share-accounted, interest-accruing capital
//! - [`risk_module::RiskModule`]: policy pricing and tiered parameter governance
//! - [`pool::PolicyPool`]: collateral allocation, settlement and the premium ledger
//! - [`asset_manager::AssetManager`]: invests idle float and reports earnings
//! - [`insolvency::InsolvencyHook`]: covers tranche shortfalls
//!
//! ## Ambient
//!
//! - [`config::PoolSetup`]: file + environment configuration
//! - [`metrics::PoolMetrics`]: Prometheus gauges and counters

pub mod asset_manager;
pub mod config;
pub mod insolvency;
pub mod metrics;
pub mod policy;
pub mod pool;
pub mod risk_module;
pub mod tranche;

pub use asset_manager::{AssetManager, FixedRateAssetManager, LiquidityThresholds, Rebalance};
pub use config::{AssetManagerSetup, HookSetup, PoolSetup, RiskModuleSetup};
pub use insolvency::{GrantInsolvencyHook, InsolvencyHook, LpInsolvencyHook, Remedy};
pub use metrics::PoolMetrics;
pub use policy::{Policy, PolicyRequest};
pub use pool::{
    ActivePolicy, Allocation, Collaborators, PolicyPool, PoolSnapshot, PremiumLedger, Settlement,
    SharedPolicyPool,
};
pub use risk_module::{ParameterValue, PremiumSplit, RiskModule, RiskModuleParams, Tier};
pub use tranche::{AcceptancePolicy, CapitalTranche, Eligibility, TrancheParams, TrancheSnapshot};
