//! Tranche acceptance policy
//!
//! Effective acceptance of a risk module is `accept_all_rms XOR exception`.
//! Locking additionally requires the remaining policy horizon to fit inside
//! the tranche's `expiration_period`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use parapool_common::RiskModuleId;

/// Outcome of checking a (tranche, risk module, horizon) triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
    Eligible,
    RiskModuleRejected,
    HorizonExceeded,
}

impl Eligibility {
    #[inline]
    pub fn is_eligible(self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

/// Which risk modules a tranche backs and for how long
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptancePolicy {
    /// Default answer for every risk module
    pub accept_all_rms: bool,
    /// Risk modules for which the default is inverted
    #[serde(default)]
    pub exceptions: BTreeSet<RiskModuleId>,
    /// Longest remaining policy horizon accepted, in seconds
    pub expiration_period: i64,
}

impl AcceptancePolicy {
    pub fn new(accept_all_rms: bool, expiration_period: i64) -> Self {
        Self {
            accept_all_rms,
            exceptions: BTreeSet::new(),
            expiration_period,
        }
    }

    /// Effective acceptance of `rm`, ignoring horizon
    pub fn accepts(&self, rm: RiskModuleId) -> bool {
        self.accept_all_rms ^ self.exceptions.contains(&rm)
    }

    pub fn eligibility(&self, rm: RiskModuleId, horizon: i64) -> Eligibility {
        if !self.accepts(rm) {
            Eligibility::RiskModuleRejected
        } else if horizon > self.expiration_period {
            Eligibility::HorizonExceeded
        } else {
            Eligibility::Eligible
        }
    }

    /// Flip the default while keeping the exception list
    pub fn set_accept_all(&mut self, accept_all: bool) {
        self.accept_all_rms = accept_all;
    }

    /// Mark or unmark `rm` as an exception to the default
    pub fn set_exception(&mut self, rm: RiskModuleId, is_exception: bool) {
        if is_exception {
            self.exceptions.insert(rm);
        } else {
            self.exceptions.remove(&rm);
        }
    }
}
