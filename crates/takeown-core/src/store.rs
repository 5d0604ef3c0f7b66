//! The delegation table: the persisted record of which users may take
//! ownership of which subtrees of a volume. Loaded fresh per invocation and
//! discarded at exit; there is no cache that outlives a command.

use std::fs::{self, File};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use takeown_common::Uid;

use crate::error::CoreError;
use crate::nameservice::NameService;
use crate::path::{self, Fsid};

pub const TABLE_FILE_NAME: &str = ".takeown.delegations";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationRecord {
    #[serde(rename = "Object")]
    pub object: String,
    #[serde(rename = "Delegate")]
    pub delegate: Uid,
}

impl DelegationRecord {
    fn matches(&self, subpath: &str, uid: Uid) -> bool {
        self.object == subpath && self.delegate == uid
    }
}

#[derive(Debug, Clone)]
pub struct DelegationTable {
    pub volume: PathBuf,
    pub fsid: Fsid,
    records: Vec<DelegationRecord>,
}

impl DelegationTable {
    pub fn new(volume: PathBuf, fsid: Fsid) -> Self {
        Self {
            volume,
            fsid,
            records: Vec::new(),
        }
    }

    fn table_path(&self) -> PathBuf {
        self.volume.join(TABLE_FILE_NAME)
    }

    pub fn records(&self) -> &[DelegationRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Load the table for the volume containing `target`, resolving
    /// `target` through the path resolver first so a relative or symlinked
    /// argument still lands on the right volume.
    pub fn load_for_path(target: &Path) -> Result<Self, CoreError> {
        let volume = path::find_volume(target)?;
        Self::load(&volume)
    }

    /// Load (or synthesize an empty) table bound to volume `volume`.
    pub fn load(volume: &Path) -> Result<Self, CoreError> {
        let fsid = path::fsid_of(volume)?;
        let table_path = volume.join(TABLE_FILE_NAME);
        let records = match fs::read(&table_path) {
            Ok(data) => serde_json::from_slice(&data).map_err(|source| CoreError::Corrupt {
                path: table_path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(CoreError::from_io("open", &table_path, e)),
        };
        Ok(Self {
            volume: volume.to_path_buf(),
            fsid,
            records,
        })
    }

    fn resolve_user(names: &dyn NameService, username: &str) -> Result<Uid, CoreError> {
        if let Some(uid) = names.user_to_uid(username) {
            return Ok(uid);
        }
        username
            .parse::<u32>()
            .map(Uid)
            .map_err(|_| CoreError::UnknownUser(username.to_string()))
    }

    /// Grant `username` the right to take ownership of `target` and its
    /// subtree. Idempotent: granting the same pair twice leaves exactly one
    /// matching record.
    pub fn add(
        &mut self,
        names: &dyn NameService,
        username: &str,
        target: &Path,
    ) -> Result<(), CoreError> {
        let uid = Self::resolve_user(names, username)?;

        let resolved = path::resolve(target)?;
        let fsid = path::fsid_of(&resolved)?;
        if fsid != self.fsid {
            return Err(CoreError::CrossVolume {
                path: resolved,
                volume: self.volume.clone(),
            });
        }

        let relative = path::relative_to_volume(&self.volume, &resolved)?;
        let subpath = normalize_subpath(&relative);

        if !self.records.iter().any(|r| r.matches(&subpath, uid)) {
            self.records.push(DelegationRecord {
                object: subpath,
                delegate: uid,
            });
        }
        Ok(())
    }

    /// Revoke every delegation record matching `(username, target)`.
    pub fn remove(
        &mut self,
        names: &dyn NameService,
        username: &str,
        target: &Path,
    ) -> Result<(), CoreError> {
        let uid = Self::resolve_user(names, username)?;

        let resolved = match path::resolve(target) {
            Ok(r) => r,
            Err(CoreError::NotFound { .. }) => path::absolutize(target)?,
            Err(e) => return Err(e),
        };

        let relative = path::relative_to_volume(&self.volume, &resolved)?;
        let subpath = normalize_subpath(&relative);

        let before = self.records.len();
        self.records.retain(|r| !r.matches(&subpath, uid));
        if self.records.len() == before {
            return Err(CoreError::NoSuchDelegation {
                user: username.to_string(),
                path: resolved,
            });
        }
        Ok(())
    }

    /// True if any record grants `uid` ownership of `realpath`, either
    /// directly or because `realpath` descends from a delegated subtree.
    pub fn grants(&self, uid: Uid, realpath: &Path) -> bool {
        self.records.iter().any(|record| {
            if record.delegate != uid {
                return false;
            }
            let delegated_root = self.volume.join(&record.object);
            path::contains(&delegated_root, realpath)
        })
    }

    /// Persist the table. An empty table removes the file rather than
    /// writing an empty list; a non-empty table is written via a sibling
    /// temp file and `rename` so a crash mid-write cannot corrupt or
    /// truncate the previous table.
    pub fn save(&self) -> Result<(), CoreError> {
        let table_path = self.table_path();
        if self.records.is_empty() {
            match fs::remove_file(&table_path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(CoreError::from_io("remove", &table_path, e)),
            }
        } else {
            write_atomically(&table_path, &self.records)
        }
    }
}

fn normalize_subpath(relative: &Path) -> String {
    relative.to_string_lossy().replace('\\', "/")
}

fn write_atomically(table_path: &Path, records: &[DelegationRecord]) -> Result<(), CoreError> {
    let data = serde_json::to_vec_pretty(records).map_err(|source| CoreError::Corrupt {
        path: table_path.to_path_buf(),
        source,
    })?;

    let dir = table_path.parent().unwrap_or_else(|| Path::new("."));
    let tmp_name = format!(
        ".{}.tmp.{}",
        table_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("takeown"),
        std::process::id()
    );
    let tmp_path = dir.join(tmp_name);

    {
        let mut tmp =
            File::create(&tmp_path).map_err(|e| CoreError::from_io("create", &tmp_path, e))?;
        let mut perms = tmp
            .metadata()
            .map_err(|e| CoreError::from_io("stat", &tmp_path, e))?
            .permissions();
        perms.set_mode(0o600);
        tmp.set_permissions(perms)
            .map_err(|e| CoreError::from_io("chmod", &tmp_path, e))?;
        tmp.write_all(&data)
            .map_err(|e| CoreError::from_io("write", &tmp_path, e))?;
        tmp.sync_all()
            .map_err(|e| CoreError::from_io("fsync", &tmp_path, e))?;
    }

    fs::rename(&tmp_path, table_path).map_err(|e| CoreError::from_io("rename", table_path, e))?;

    if let Ok(dir_handle) = File::open(dir) {
        let _ = dir_handle.sync_all();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nameservice::test_support::FakeNameService;

    fn names() -> FakeNameService {
        FakeNameService::new().with_user("alice", 1001).with_user("bob", 1002)
    }

    #[test]
    fn add_then_grants_subtree() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/readme.txt"), b"hi").unwrap();

        let volume = path::resolve(dir.path()).unwrap();
        let fsid = path::fsid_of(&volume).unwrap();
        let mut table = DelegationTable::new(volume.clone(), fsid);

        table.add(&names(), "alice", &dir.path().join("docs")).unwrap();
        assert!(table.grants(Uid(1001), &volume.join("docs/readme.txt")));
        assert!(!table.grants(Uid(1002), &volume.join("docs/readme.txt")));
    }

    #[test]
    fn add_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let volume = path::resolve(dir.path()).unwrap();
        let fsid = path::fsid_of(&volume).unwrap();
        let mut table = DelegationTable::new(volume, fsid);

        table.add(&names(), "alice", dir.path()).unwrap();
        table.add(&names(), "alice", dir.path()).unwrap();
        assert_eq!(table.records().len(), 1);
    }

    #[test]
    fn add_rejects_nonexistent_target() {
        let dir = tempfile::tempdir().unwrap();
        let volume = path::resolve(dir.path()).unwrap();
        let fsid = path::fsid_of(&volume).unwrap();
        let mut table = DelegationTable::new(volume, fsid);

        let missing = dir.path().join("not-created-yet");
        let err = table.add(&names(), "alice", &missing).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn remove_resolves_nonexistent_target_instead_of_erroring() {
        let dir = tempfile::tempdir().unwrap();
        let volume = path::resolve(dir.path()).unwrap();
        let fsid = path::fsid_of(&volume).unwrap();
        let mut table = DelegationTable::new(volume, fsid);

        let missing = dir.path().join("not-created-yet");
        let err = table.remove(&names(), "alice", &missing).unwrap_err();
        assert!(matches!(err, CoreError::NoSuchDelegation { .. }));
    }

    #[test]
    fn remove_unknown_delegation_errors() {
        let dir = tempfile::tempdir().unwrap();
        let volume = path::resolve(dir.path()).unwrap();
        let fsid = path::fsid_of(&volume).unwrap();
        let mut table = DelegationTable::new(volume, fsid);

        let err = table.remove(&names(), "alice", dir.path()).unwrap_err();
        assert!(matches!(err, CoreError::NoSuchDelegation { .. }));
    }

    #[test]
    fn add_rejects_cross_volume_target() {
        let dir = tempfile::tempdir().unwrap();
        let volume = path::resolve(dir.path()).unwrap();
        // a fabricated fsid that will not match the real device number of
        // anything on the test machine, standing in for a genuinely
        // different mounted volume without depending on the CI host's
        // actual mount layout.
        let mut table = DelegationTable::new(volume, Fsid(0xDEAD_BEEF_0000));

        let err = table.add(&names(), "alice", dir.path()).unwrap_err();
        assert!(matches!(err, CoreError::CrossVolume { .. }));
    }

    #[test]
    fn save_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let volume = path::resolve(dir.path()).unwrap();
        let fsid = path::fsid_of(&volume).unwrap();
        let mut table = DelegationTable::new(volume.clone(), fsid);
        table.add(&names(), "alice", dir.path()).unwrap();
        table.save().unwrap();

        let reloaded = DelegationTable::load(&volume).unwrap();
        assert_eq!(reloaded.records(), table.records());
    }

    #[test]
    fn save_of_empty_table_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let volume = path::resolve(dir.path()).unwrap();
        let fsid = path::fsid_of(&volume).unwrap();
        let mut table = DelegationTable::new(volume.clone(), fsid);
        table.add(&names(), "alice", dir.path()).unwrap();
        table.save().unwrap();
        assert!(volume.join(TABLE_FILE_NAME).exists());

        table.remove(&names(), "alice", dir.path()).unwrap();
        table.save().unwrap();
        assert!(!volume.join(TABLE_FILE_NAME).exists());
    }
}
