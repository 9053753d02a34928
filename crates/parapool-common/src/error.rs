//! Error types for the capital pool
//!
//! Provides a unified error type and domain-specific error variants

use thiserror::Error;

use crate::math::Wad;
use crate::types::{PolicyId, Role, TrancheId};

/// Result type alias using PoolError
pub type Result<T> = std::result::Result<T, PoolError>;

/// Unified error type for pool operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PoolError {
    // Static bound violations
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{caller} is missing role {role}")]
    Unauthorized { caller: String, role: Role },

    #[error("Not found: {0}")]
    NotFound(String),

    // Tranche ledger errors
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    // Policy lifecycle errors
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    // Parameter governance errors
    #[error("Governance error: {0}")]
    Governance(#[from] GovernanceError),

    // Currency collaborator errors
    #[error("Currency error: {0}")]
    Currency(#[from] CurrencyError),

    #[error("Insolvency unresolved in tranche {tranche}: shortfall {shortfall}")]
    InsolvencyUnresolved { tranche: TrancheId, shortfall: Wad },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PoolError {
    pub fn validation(msg: impl Into<String>) -> Self {
        PoolError::Validation(msg.into())
    }

    pub fn unauthorized(caller: impl ToString, role: Role) -> Self {
        PoolError::Unauthorized {
            caller: caller.to_string(),
            role,
        }
    }
}

/// Capital tranche ledger errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Deposits are disabled for tranche {0}")]
    DepositsDisabled(TrancheId),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Wad, available: Wad },

    #[error("Insufficient allowance: required {required}, approved {approved}")]
    InsufficientAllowance { required: Wad, approved: Wad },

    #[error("Insufficient ocean: required {required}, ocean {ocean}")]
    InsufficientOcean { required: Wad, ocean: Wad },

    #[error("Tranche {0} does not accept this risk module")]
    RiskModuleNotAccepted(TrancheId),

    #[error("Policy horizon {horizon}s exceeds tranche {tranche} limit of {limit}s")]
    HorizonExceeded {
        tranche: TrancheId,
        horizon: i64,
        limit: i64,
    },

    #[error("Unlock of {amount} exceeds locked scr {scr}")]
    UnlockExceedsScr { amount: Wad, scr: Wad },

    #[error("Repayment of {amount} exceeds pool loan {loan}")]
    RepayExceedsLoan { amount: Wad, loan: Wad },

    #[error("Operation would leave tranche {0} with negative supply")]
    NegativeSupply(TrancheId),

    #[error("Insufficient pool liquidity: required {required}, idle {idle}")]
    InsufficientLiquidity { required: Wad, idle: Wad },

    #[error("Investment loss of {0} exceeds pool and tranche capital")]
    UnabsorbedLoss(Wad),

    #[error("Share arithmetic overflowed in tranche {0}")]
    ArithmeticOverflow(TrancheId),
}

/// Policy lifecycle errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PolicyError {
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("Insufficient premium: offered {offered}, minimum {minimum}")]
    InsufficientPremium { offered: Wad, minimum: Wad },

    #[error("Policy {0} already resolved")]
    AlreadyResolved(PolicyId),

    #[error("Policy {0} has not expired yet")]
    NotExpiredYet(PolicyId),

    #[error("Policy {0} already expired, use the expire path")]
    AlreadyExpired(PolicyId),

    #[error("Duplicate policy id {0}")]
    DuplicatePolicyId(PolicyId),
}

/// Parameter governance errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GovernanceError {
    #[error("Repeated tweak of {parameter}: next allowed at {next_allowed}")]
    TweakCooldownViolation { parameter: String, next_allowed: i64 },

    #[error("Tweak exceeded: {parameter} may move at most {max_change} relative")]
    TweakBoundExceeded { parameter: String, max_change: String },

    #[error("Change of {parameter} requires {role}")]
    RequiresTier { parameter: String, role: Role },

    #[error("Validation: {parameter} out of range {range}")]
    OutOfRange { parameter: String, range: String },
}

/// Errors raised by the currency collaborator
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CurrencyError {
    #[error("Transfer amount must be positive")]
    InvalidAmount,

    #[error("{account} has insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        account: String,
        required: Wad,
        available: Wad,
    },

    #[error("{spender} has insufficient allowance from {owner}: required {required}, approved {approved}")]
    InsufficientAllowance {
        owner: String,
        spender: String,
        required: Wad,
        approved: Wad,
    },
}
