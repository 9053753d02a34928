//! Parapool scenario runner
//!
//! Drives a [`parapool_core::PolicyPool`] through a scripted sequence of
//! deposits, policies, settlements and clock moves, using the in-memory
//! collaborators from `parapool-common`.

pub mod runner;
pub mod scenario;

pub use runner::{Outcome, Simulation};
pub use scenario::{Funding, RoleGrant, Scenario, Step, DEFAULT_START};
