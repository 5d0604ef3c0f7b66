use std::path::{Path, PathBuf};

use anyhow::Context;
use takeown_common::exitcode;
use takeown_core::DelegationTable;

use super::{name_service, CommandResult};

pub fn run(user: &str, paths: &[PathBuf]) -> CommandResult {
    if paths.is_empty() {
        anyhow::bail!("no paths given");
    }

    let mut exit_code = exitcode::SUCCESS;

    for path in paths {
        if let Err(error) = remove_one(user, path) {
            eprintln!("takeown: {error:#}");
            exit_code |= exitcode::OPERATION_ERROR;
        }
    }

    Ok(exit_code)
}

fn remove_one(user: &str, path: &Path) -> anyhow::Result<()> {
    let mut table = DelegationTable::load_for_path(path).context("loading delegation table")?;
    table
        .remove(&name_service(), user, path)
        .context("revoking delegation")?;
    table.save().context("saving delegation table")?;
    tracing::info!(%user, path = %path.display(), "revoked delegation");
    Ok(())
}
