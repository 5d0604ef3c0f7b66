//! Delegation authority core for the `takeown` ownership-delegation tool.
//!
//! This crate holds every piece of logic that needs to reason about
//! privilege, paths, or the delegation table. It never prints anything and
//! never exits the process; the `takeown` binary crate is the only thing
//! that touches stdout/stderr or chooses an exit code.

pub mod engine;
pub mod error;
pub mod mounts;
pub mod nameservice;
pub mod path;
pub mod privilege;
pub mod store;
pub mod walk;

pub use error::CoreError;
pub use store::{DelegationRecord, DelegationTable};
