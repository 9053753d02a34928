//! External collaborators consumed by the pool
//!
//! Each collaborator is a trait object injected at construction, with an
//! in-memory implementation for tests and simulation.

pub mod access;
pub mod clock;
pub mod currency;
pub mod registry;
