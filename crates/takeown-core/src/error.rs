//! The core never writes to stderr or calls `std::process::exit`; it only
//! ever returns one of these. The `takeown` binary crate is the sole place
//! that maps a `CoreError` to a diagnostic and one of the process exit
//! codes.

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{path}: no such file or directory")]
    NotFound { path: PathBuf },

    #[error("{path}: permission denied")]
    PermissionDenied { path: PathBuf },

    #[error("{path}: too many levels of symbolic links")]
    Loop { path: PathBuf },

    #[error("{path} is not contained in volume {volume}")]
    CrossVolume { path: PathBuf, volume: PathBuf },

    #[error("delegation table at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot take ownership of {path}: not delegated")]
    NotDelegated { path: PathBuf },

    #[error("no delegation found for user {user} on {path}")]
    NoSuchDelegation { user: String, path: PathBuf },

    #[error("cannot look up user {0:?}")]
    UnknownUser(String),

    #[error("{action} failed: {source}")]
    Privilege {
        action: &'static str,
        #[source]
        source: nix::errno::Errno,
    },

    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CoreError {
    /// Build a `CoreError` from an `io::Error` raised while performing
    /// `action` on `path`, routing well-known errno classes (a missing
    /// component, an unreadable directory, a symlink cycle) to their own
    /// variants instead of the catch-all `Io`.
    pub fn from_io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.raw_os_error() == Some(libc::ELOOP) {
            return CoreError::Loop { path };
        }
        match source.kind() {
            io::ErrorKind::NotFound => CoreError::NotFound { path },
            io::ErrorKind::PermissionDenied => CoreError::PermissionDenied { path },
            _ => CoreError::Io {
                action,
                path,
                source,
            },
        }
    }

    pub fn from_nix(action: &'static str, source: nix::errno::Errno) -> Self {
        CoreError::Privilege { action, source }
    }

    /// True for the class of error the invisibility rule cares about: a
    /// caller-facing permission failure, as opposed to a structural problem
    /// (corrupt table, cross-volume target) that must always be surfaced
    /// regardless of visibility.
    pub fn is_permission(&self) -> bool {
        matches!(
            self,
            CoreError::PermissionDenied { .. } | CoreError::NotDelegated { .. }
        )
    }
}
