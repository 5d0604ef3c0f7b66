pub mod add;
pub mod list;
pub mod remove;
pub mod take_ownership;

use anyhow::Result;
use takeown_core::nameservice::SystemNameService;

/// Construct the name service shared by every subcommand. A trivial
/// function today, but it's the one seam a future config-driven mapping
/// (e.g. an LDAP-backed `NameService`) would replace.
pub fn name_service() -> SystemNameService {
    SystemNameService
}

pub type CommandResult = Result<i32>;
