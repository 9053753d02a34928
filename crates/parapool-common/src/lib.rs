//! # Parapool Common
//!
//! Shared building blocks for the parametric-insurance capital pool.
//!
//! ## Core Types
//!
//! - [`Wad`]/[`Ray`]: fixed-point amounts (18 decimals) and rates (27 decimals)
//! - [`PolicyId`], [`TrancheId`], [`RiskModuleId`], [`AccountId`]: identifiers
//! - [`Role`]: capabilities checked through [`AccessControl`]
//! - [`PoolError`]: unified error taxonomy
//!
//! ## Collaborators
//!
//! - [`interfaces::Clock`]: monotonic time source
//! - [`interfaces::Currency`]: transferable balance with allowances
//! - [`interfaces::AccessControl`]: role checks
//! - [`interfaces::PolicyRegistry`]: policy ownership

pub mod error;
pub mod interfaces;
pub mod math;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{CurrencyError, GovernanceError, LedgerError, PolicyError, PoolError, Result};
pub use interfaces::{
    access::{AccessControl, RoleRegistry},
    clock::{Clock, ManualClock, SystemClock},
    currency::{Currency, InMemoryCurrency},
    registry::{InMemoryPolicyRegistry, PolicyRegistry},
};
pub use math::{simple_interest, Ray, Wad, DAY, SECONDS_PER_YEAR, WEEK};
pub use types::{AccountId, Parameter, PolicyId, RiskModuleId, Role, Timestamp, TrancheId};

/// Parapool version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
