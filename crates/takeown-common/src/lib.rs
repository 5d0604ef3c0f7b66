//! Small shared types used by both `takeown-core` and the `takeown` binary.

pub mod exitcode;
pub mod ids;

pub use ids::{Gid, Uid};
