//! The authorization engine: deciding whether a caller may take ownership of
//! a path, and carrying that decision out.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use takeown_common::{Gid, Uid};

use crate::error::CoreError;
use crate::path::{self, Fsid};
use crate::privilege::{PrivilegeBroker, PrivilegeSyscalls};
use crate::store::DelegationTable;

/// A file's identity as observed without following a terminal symlink:
/// owning uid/gid come from `lstat`, while the filesystem id comes from a
/// following `stat`, matching how a symlink that points across a mount
/// boundary is detected.
#[derive(Debug, Clone)]
pub struct StatedPath {
    pub path: PathBuf,
    pub uid: Uid,
    pub gid: Gid,
    pub fsid: Fsid,
}

impl StatedPath {
    pub fn lstat(path: &Path) -> Result<Self, CoreError> {
        let meta =
            std::fs::symlink_metadata(path).map_err(|e| CoreError::from_io("lstat", path, e))?;
        let fsid = path::fsid_of(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            uid: Uid(meta.uid()),
            gid: Gid(meta.gid()),
            fsid,
        })
    }
}

/// Decide whether `caller_uid` may take ownership of `stated`, given the
/// already-loaded table `table`. Root may always proceed; everyone else
/// needs a delegation record covering the resolved path.
pub fn can_take_ownership(
    table: &DelegationTable,
    caller_uid: Uid,
    stated: &StatedPath,
) -> Result<(), CoreError> {
    let resolved = path::resolve(&stated.path)?;

    if stated.fsid != table.fsid {
        return Err(CoreError::CrossVolume {
            path: resolved,
            volume: table.volume.clone(),
        });
    }

    // Computed for its side effect: rejects a resolved path that has
    // somehow escaped the volume lexically even though the fsid check
    // above passed.
    let _ = path::relative_to_volume(&table.volume, &resolved)?;

    if caller_uid.is_root() {
        return Ok(());
    }

    if table.grants(caller_uid, &resolved) {
        return Ok(());
    }

    Err(CoreError::NotDelegated { path: resolved })
}

/// The outcome of one per-path take-ownership step. `visible` on the error
/// variants records whether a stat performed as the caller could see this
/// path at all; the CLI uses it to implement the error invisibility rule
/// (no diagnostic, no effect on exit code for a path the caller could not
/// have observed to begin with).
#[derive(Debug)]
pub enum StepOutcome {
    /// The path is the volume's own delegation table file. Never a valid
    /// chown target under any grant, including one covering the volume
    /// root; skipped outright, with no output and no effect on exit code.
    Protected,
    AlreadyOwned,
    WouldTakeOwnership { visible: bool, new_uid: Uid, new_gid: Gid },
    TookOwnership { new_uid: Uid, new_gid: Gid },
    Denied { visible: bool, error: CoreError },
    Failed { visible: bool, error: CoreError },
}

impl StepOutcome {
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            StepOutcome::Protected
                | StepOutcome::Denied { visible: false, .. }
                | StepOutcome::Failed { visible: false, .. }
        )
    }
}

/// True if `path`'s file name is the delegation table's own file name. A
/// grant covering a volume root otherwise authorizes chowning the table
/// file itself (it's lexically a child of the delegated subtree), which
/// would hand the delegate root-only write access to the authority file.
fn is_table_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name == crate::store::TABLE_FILE_NAME)
        .unwrap_or(false)
}

/// Run the full per-path decision and action: stat, compare ownership,
/// authorize (falling back to an effective `CAP_CHOWN` when the table
/// denies), then either simulate or perform the `chown`.
///
/// `visible` must already reflect whether a stat under `act_as_caller`
/// succeeded for this path; for an explicit command-line argument it is
/// always `true`, since the caller named the path themselves.
pub fn take_ownership_step<S: PrivilegeSyscalls>(
    broker: &PrivilegeBroker<S>,
    table: &DelegationTable,
    caller_uid: Uid,
    path: &Path,
    visible: bool,
    simulate: bool,
) -> StepOutcome {
    if is_table_file(path) {
        return StepOutcome::Protected;
    }

    let stated = match StatedPath::lstat(path) {
        Ok(s) => s,
        Err(error) => return StepOutcome::Failed { visible, error },
    };

    if stated.uid == caller_uid {
        return StepOutcome::AlreadyOwned;
    }

    let decision = can_take_ownership(table, caller_uid, &stated);
    let authorized = decision.is_ok() || broker.caller_can_chown(path);

    if !authorized {
        let error = decision.unwrap_err();
        return StepOutcome::Denied { visible, error };
    }

    if simulate {
        return StepOutcome::WouldTakeOwnership {
            visible,
            new_uid: caller_uid,
            new_gid: stated.gid,
        };
    }

    match lchown(path, caller_uid, stated.gid) {
        Ok(()) => StepOutcome::TookOwnership {
            new_uid: caller_uid,
            new_gid: stated.gid,
        },
        Err(error) => StepOutcome::Failed { visible, error },
    }
}

/// Probe whether `path` is visible to the caller: can they `lstat` it under
/// their own identity? Used by the recursive walker to compute `visible`
/// for each candidate before calling [`take_ownership_step`].
pub fn probe_visible<S: PrivilegeSyscalls>(broker: &PrivilegeBroker<S>, path: &Path) -> bool {
    let _guard = match broker.act_as_caller() {
        Ok(g) => g,
        Err(_) => return false,
    };
    std::fs::symlink_metadata(path).is_ok()
}

fn lchown(path: &Path, uid: Uid, gid: Gid) -> Result<(), CoreError> {
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        CoreError::from_io(
            "lchown",
            path,
            std::io::Error::from(std::io::ErrorKind::InvalidInput),
        )
    })?;
    let ret = unsafe { libc::lchown(c_path.as_ptr(), uid.0, gid.0) };
    if ret == 0 {
        Ok(())
    } else {
        Err(CoreError::from_io("lchown", path, std::io::Error::last_os_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::privilege::PrivilegeSyscalls;
    use nix::unistd::Uid as NixUid;
    use std::fs;

    struct AlwaysSelfSyscalls;
    impl PrivilegeSyscalls for AlwaysSelfSyscalls {
        fn getuid(&self) -> NixUid {
            nix::unistd::getuid()
        }
        fn seteuid(&self, _uid: NixUid) -> nix::Result<()> {
            Ok(())
        }
        fn setuid(&self, _uid: NixUid) -> nix::Result<()> {
            Ok(())
        }
        fn has_effective_cap_chown(&self) -> bool {
            false
        }
    }

    #[test]
    fn already_owned_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        fs::write(&file, b"x").unwrap();

        let volume = path::resolve(dir.path()).unwrap();
        let fsid = path::fsid_of(&volume).unwrap();
        let table = DelegationTable::new(volume, fsid);
        let broker = PrivilegeBroker::with_syscalls(AlwaysSelfSyscalls);

        let my_uid = Uid(nix::unistd::getuid().as_raw());
        let outcome = take_ownership_step(&broker, &table, my_uid, &file, true, false);
        assert!(matches!(outcome, StepOutcome::AlreadyOwned));
    }

    #[test]
    fn table_file_is_always_protected() {
        let dir = tempfile::tempdir().unwrap();
        let table_file = dir.path().join(crate::store::TABLE_FILE_NAME);
        fs::write(&table_file, b"{}").unwrap();

        let volume = path::resolve(dir.path()).unwrap();
        let fsid = path::fsid_of(&volume).unwrap();
        let mut table = DelegationTable::new(volume, fsid);
        let names = crate::nameservice::test_support::FakeNameService::new().with_user("alice", 1001);
        table.add(&names, "alice", dir.path()).unwrap();

        let broker = PrivilegeBroker::with_syscalls(AlwaysSelfSyscalls);
        let outcome = take_ownership_step(&broker, &table, Uid(1001), &table_file, true, false);
        assert!(matches!(outcome, StepOutcome::Protected));
    }

    #[test]
    fn denied_without_delegation_is_silent_when_invisible() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        fs::write(&file, b"x").unwrap();

        let volume = path::resolve(dir.path()).unwrap();
        let fsid = path::fsid_of(&volume).unwrap();
        let table = DelegationTable::new(volume, fsid);
        let broker = PrivilegeBroker::with_syscalls(AlwaysSelfSyscalls);

        let other_uid = Uid(nix::unistd::getuid().as_raw().wrapping_add(1));
        let outcome = take_ownership_step(&broker, &table, other_uid, &file, false, false);
        assert!(outcome.is_silent());

        let outcome = take_ownership_step(&broker, &table, other_uid, &file, true, false);
        assert!(!outcome.is_silent());
        assert!(matches!(outcome, StepOutcome::Denied { .. }));
    }
}
