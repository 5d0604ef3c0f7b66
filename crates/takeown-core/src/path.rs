//! Path resolution and volume discovery.
//!
//! A "volume" here is a mount point: the highest ancestor of a path that
//! still shares its device number, i.e. the root of the filesystem the path
//! lives on. The delegation table for a path always lives at the root of its
//! volume, so every other module needs to find it the same way.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Component, Path, PathBuf};

use crate::error::CoreError;

/// Identifies a mounted filesystem. `statfs`'s `f_fsid` is an opaque,
/// platform-specific value that safe Rust has no ergonomic way to obtain;
/// `st_dev` from `stat`/`lstat` answers exactly the question we need ("are
/// these two paths on the same filesystem") and is how coreutils'
/// `--one-file-system` and rsync's cross-device guard both do this check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fsid(pub u64);

/// `stat`s `path`, following a terminal symlink, and returns its device id.
pub fn fsid_of(path: &Path) -> Result<Fsid, CoreError> {
    let meta = fs::metadata(path).map_err(|e| CoreError::from_io("stat", path, e))?;
    Ok(Fsid(meta.dev()))
}

/// Canonicalize `p`: make it absolute and resolve every symlink component.
pub fn resolve(p: &Path) -> Result<PathBuf, CoreError> {
    fs::canonicalize(p).map_err(|e| CoreError::from_io("resolve", p, e))
}

/// Make `p` absolute without requiring it to exist, for callers that need a
/// path's would-be location before it has been created (e.g. `add`
/// delegating a file that doesn't exist yet).
pub fn absolutize(p: &Path) -> Result<PathBuf, CoreError> {
    if p.is_absolute() {
        Ok(lexically_normalize(p))
    } else {
        let cwd = std::env::current_dir().map_err(|e| CoreError::from_io("getcwd", p, e))?;
        Ok(lexically_normalize(&cwd.join(p)))
    }
}

fn lexically_normalize(p: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in p.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Find the volume (mount root) containing `path`. `path` itself need not
/// exist: if it's missing, the search retries on its parent, so the volume
/// of a not-yet-created file can still be found.
pub fn find_volume(path: &Path) -> Result<PathBuf, CoreError> {
    match resolve(path) {
        Ok(resolved) => find_volume_of_resolved(&resolved),
        Err(CoreError::NotFound { .. }) => {
            let parent = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .ok_or_else(|| CoreError::NotFound {
                    path: path.to_path_buf(),
                })?;
            find_volume(parent)
        }
        Err(e) => Err(e),
    }
}

fn find_volume_of_resolved(resolved: &Path) -> Result<PathBuf, CoreError> {
    let this_fsid = fsid_of(resolved)?;
    let parent = match resolved.parent() {
        Some(p) if p != resolved => p,
        _ => return Ok(resolved.to_path_buf()), // reached `/`
    };
    let parent_fsid = fsid_of(parent)?;
    if this_fsid == parent_fsid {
        find_volume_of_resolved(parent)
    } else {
        Ok(resolved.to_path_buf())
    }
}

/// `absolute`'s path relative to `volume`. Fails unless `absolute` is
/// lexically nested under `volume`.
pub fn relative_to_volume(volume: &Path, absolute: &Path) -> Result<PathBuf, CoreError> {
    absolute
        .strip_prefix(volume)
        .map(Path::to_path_buf)
        .map_err(|_| CoreError::CrossVolume {
            path: absolute.to_path_buf(),
            volume: volume.to_path_buf(),
        })
}

/// True iff `path` equals `container` or is lexically nested under it. Both
/// arguments must already be absolute and symlink-resolved; doing the check
/// purely lexically after full resolution is what makes a symlink that
/// points outside the delegated subtree unable to defeat it.
pub fn contains(container: &Path, path: &Path) -> bool {
    if path == container {
        return true;
    }
    match path.strip_prefix(container) {
        Ok(rest) => !rest.as_os_str().is_empty(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    #[test]
    fn find_volume_of_nonexistent_path_uses_parent() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-created-yet");
        let volume = find_volume(&missing).unwrap();
        assert_eq!(volume, resolve(dir.path()).unwrap());
    }

    #[test]
    fn contains_rejects_sibling_escape() {
        let container = Path::new("/srv/delegated/docs");
        let sibling = Path::new("/srv/delegated/other");
        assert!(!contains(container, sibling));
        assert!(contains(container, Path::new("/srv/delegated/docs/readme.txt")));
        assert!(contains(container, container));
    }

    #[test]
    fn relative_to_volume_rejects_outside_path() {
        let volume = Path::new("/srv/vol");
        assert!(relative_to_volume(volume, Path::new("/etc/passwd")).is_err());
        assert_eq!(
            relative_to_volume(volume, Path::new("/srv/vol/a/b")).unwrap(),
            Path::new("a/b")
        );
    }

    #[test]
    fn symlink_escaping_subtree_is_not_contained() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        let outside = dir.path().join("outside");
        fs::create_dir(&docs).unwrap();
        fs::create_dir(&outside).unwrap();
        let escape = docs.join("out");
        symlink(&outside, &escape).unwrap();

        let resolved_escape = resolve(&escape).unwrap();
        let resolved_docs = resolve(&docs).unwrap();
        assert!(!contains(&resolved_docs, &resolved_escape));
    }
}
