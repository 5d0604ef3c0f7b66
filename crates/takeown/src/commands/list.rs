use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Context;
use takeown_common::Uid;
use takeown_core::nameservice::NameService;
use takeown_core::DelegationTable;

use super::{name_service, CommandResult};

pub fn run(paths: &[PathBuf]) -> CommandResult {
    let targets = if paths.is_empty() {
        takeown_core::mounts::list_mountpoints().context("enumerating mount points")?
    } else {
        paths.to_vec()
    };

    let caller_uid = Uid(nix::unistd::getuid().as_raw());
    let names = name_service();
    let mut seen_volumes = HashSet::new();
    let mut exit_code = takeown_common::exitcode::SUCCESS;
    let mut any_printed = false;

    for target in &targets {
        let table = match DelegationTable::load_for_path(target) {
            Ok(t) => t,
            Err(error) => {
                eprintln!("takeown: {}: {error}", target.display());
                exit_code |= classify(&error);
                continue;
            }
        };

        if !seen_volumes.insert(table.volume.clone()) {
            continue;
        }

        for record in table.records() {
            if !caller_uid.is_root() && record.delegate != caller_uid {
                continue;
            }
            let object_path: PathBuf = table.volume.join(&record.object);
            println!("{}:\t{}", display_name(&names, record.delegate), object_path.display());
            any_printed = true;
        }
    }

    if !any_printed && exit_code == takeown_common::exitcode::SUCCESS {
        println!("no delegations recorded");
    }

    Ok(exit_code)
}

fn display_name(names: &impl NameService, uid: Uid) -> String {
    names.uid_to_name(uid).unwrap_or_else(|| uid.to_string())
}

fn classify(error: &takeown_core::CoreError) -> i32 {
    if error.is_permission() {
        takeown_common::exitcode::PERMISSION_DENIED
    } else {
        takeown_common::exitcode::OPERATION_ERROR
    }
}
