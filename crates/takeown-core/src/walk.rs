//! A thin adapter over `walkdir` that stops recursion at a mount boundary.
//!
//! Ordinary directory traversal has nothing to do with authorization; the
//! only extra rule the walker enforces itself is that it never crosses onto
//! a different filesystem than the one it started on, so a bind mount or
//! another device nested under a delegated tree is skipped outright rather
//! than treated as part of it.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::path::{self, Fsid};
use crate::store::TABLE_FILE_NAME;

pub struct WalkEntry {
    pub path: PathBuf,
    pub is_dir: bool,
}

pub fn walk(root: &Path, volume_fsid: Fsid) -> impl Iterator<Item = WalkEntry> + '_ {
    let root_owned = root.to_path_buf();
    WalkDir::new(root)
        .into_iter()
        .filter_entry(move |entry| {
            if entry.file_name() == TABLE_FILE_NAME {
                return false;
            }
            if entry.path() == root_owned.as_path() {
                return true;
            }
            match path::fsid_of(entry.path()) {
                Ok(fsid) => fsid == volume_fsid,
                Err(_) => true, // let the caller's own stat surface the error
            }
        })
        .filter_map(|res| {
            let entry = res.ok()?;
            Some(WalkEntry {
                is_dir: entry.file_type().is_dir(),
                path: entry.into_path(),
            })
        })
}
