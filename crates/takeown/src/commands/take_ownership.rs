use std::path::{Path, PathBuf};

use takeown_common::{exitcode, Uid};
use takeown_core::engine::{self, StepOutcome};
use takeown_core::privilege::PrivilegeBroker;
use takeown_core::store::DelegationTable;
use takeown_core::walk;

use super::CommandResult;

pub fn run(paths: &[PathBuf], recursive: bool, simulate: bool, verbose: bool) -> CommandResult {
    if paths.is_empty() {
        anyhow::bail!("no paths given");
    }

    let broker = PrivilegeBroker::new();
    let caller_uid = Uid(broker.real_uid().as_raw());

    let mut exit_code = exitcode::SUCCESS;

    for path in paths {
        let table = match DelegationTable::load_for_path(path) {
            Ok(t) => t,
            Err(error) => {
                eprintln!("takeown: {}: {error}", path.display());
                exit_code |= exitcode::OPERATION_ERROR;
                continue;
            }
        };

        exit_code |= apply_to_path(&broker, &table, caller_uid, path, recursive, simulate, verbose);
    }

    Ok(exit_code)
}

fn apply_to_path(
    broker: &PrivilegeBroker,
    table: &DelegationTable,
    caller_uid: Uid,
    path: &Path,
    recursive: bool,
    simulate: bool,
    verbose: bool,
) -> i32 {
    // The path named on the command line is always visible: the caller
    // could not have named it without already knowing it's there.
    let outcome = engine::take_ownership_step(broker, table, caller_uid, path, true, simulate);
    let mut code = report(path, &outcome, verbose);

    if recursive && path.is_dir() {
        for entry in walk::walk(path, table.fsid) {
            if entry.path == path {
                continue;
            }
            let visible = engine::probe_visible(broker, &entry.path);
            let outcome =
                engine::take_ownership_step(broker, table, caller_uid, &entry.path, visible, simulate);
            code |= report(&entry.path, &outcome, verbose);
        }
    }

    code
}

fn report(path: &Path, outcome: &StepOutcome, verbose: bool) -> i32 {
    match outcome {
        StepOutcome::Protected => exitcode::SUCCESS,
        StepOutcome::AlreadyOwned => {
            if verbose {
                println!("{}: already owned", path.display());
            }
            exitcode::SUCCESS
        }
        StepOutcome::WouldTakeOwnership { visible, new_uid, .. } => {
            if *visible {
                println!("would take ownership of {} (as {new_uid})", path.display());
            }
            exitcode::SUCCESS
        }
        StepOutcome::TookOwnership { new_uid, .. } => {
            if verbose {
                println!("took ownership of {} (as {new_uid})", path.display());
            }
            exitcode::SUCCESS
        }
        StepOutcome::Denied { visible, error } => {
            if !*visible {
                return exitcode::SUCCESS;
            }
            eprintln!("takeown: {error}");
            exitcode::PERMISSION_DENIED
        }
        StepOutcome::Failed { visible, error } => {
            if !*visible {
                return exitcode::SUCCESS;
            }
            eprintln!("takeown: {error}");
            exitcode::OPERATION_ERROR
        }
    }
}
