//! The privilege broker: scoped "act as caller" / "stay as root" windows
//! over a set-uid-root process.
//!
//! The broker is the only thing in the crate that touches the effective
//! UID. Everything else asks it to run a closure (or acquire a guard) under
//! one identity or the other; none of the authorization or delegation logic
//! needs to know whether the process is actually set-uid.

use std::cell::Cell;
use std::path::Path;

use caps::{CapSet, Capability};
use nix::unistd::Uid as NixUid;

use crate::error::CoreError;

/// The raw syscalls the broker depends on, abstracted so unit tests can
/// drive the guard/ref-counting logic without actually holding root.
pub trait PrivilegeSyscalls {
    fn getuid(&self) -> NixUid;
    fn seteuid(&self, uid: NixUid) -> nix::Result<()>;
    fn setuid(&self, uid: NixUid) -> nix::Result<()>;
    /// Whether `CAP_CHOWN` is in this process's effective set right now.
    /// Must be called while running as the caller, so the kernel reports
    /// the caller's own capabilities rather than root's.
    fn has_effective_cap_chown(&self) -> bool;
}

/// The real, OS-backed implementation of [`PrivilegeSyscalls`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPrivilegeSyscalls;

impl PrivilegeSyscalls for SystemPrivilegeSyscalls {
    fn getuid(&self) -> NixUid {
        nix::unistd::getuid()
    }

    fn seteuid(&self, uid: NixUid) -> nix::Result<()> {
        nix::unistd::seteuid(uid)
    }

    fn setuid(&self, uid: NixUid) -> nix::Result<()> {
        nix::unistd::setuid(uid)
    }

    fn has_effective_cap_chown(&self) -> bool {
        caps::has_cap(None, CapSet::Effective, Capability::CAP_CHOWN).unwrap_or(false)
    }
}

/// Scoped privilege control over a set-uid-root process. Acquisitions of
/// [`act_as_caller`](Self::act_as_caller) nest as a counter, so a helper
/// that calls it from inside an already-dropped-privilege scope doesn't
/// fight its caller over the effective UID.
pub struct PrivilegeBroker<S: PrivilegeSyscalls = SystemPrivilegeSyscalls> {
    sys: S,
    real_uid: NixUid,
    depth: Cell<u32>,
}

impl PrivilegeBroker<SystemPrivilegeSyscalls> {
    pub fn new() -> Self {
        Self::with_syscalls(SystemPrivilegeSyscalls)
    }
}

impl Default for PrivilegeBroker<SystemPrivilegeSyscalls> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: PrivilegeSyscalls> PrivilegeBroker<S> {
    pub fn with_syscalls(sys: S) -> Self {
        let real_uid = sys.getuid();
        Self {
            sys,
            real_uid,
            depth: Cell::new(0),
        }
    }

    pub fn real_uid(&self) -> NixUid {
        self.real_uid
    }

    /// Whether the process is actually running with elevated privilege. If
    /// it was invoked directly as root, or under a test harness, there is
    /// no effective UID to drop or restore and every operation below is a
    /// documented no-op.
    fn running_privileged(&self) -> bool {
        !self.real_uid.is_root()
    }

    /// Temporarily drop the effective UID to the caller's real UID. Restored
    /// (back to root) when the returned guard drops, including during a
    /// panic unwind.
    pub fn act_as_caller(&self) -> Result<ActAsCaller<'_, S>, CoreError> {
        if self.depth.get() == 0 && self.running_privileged() {
            self.sys
                .seteuid(self.real_uid)
                .map_err(|e| CoreError::from_nix("seteuid", e))?;
        }
        self.depth.set(self.depth.get() + 1);
        Ok(ActAsCaller { broker: self })
    }

    fn release_act_as_caller(&self) {
        let depth = self.depth.get().saturating_sub(1);
        self.depth.set(depth);
        if depth == 0 && self.running_privileged() {
            self.sys
                .seteuid(NixUid::from_raw(0))
                .expect("failed to restore effective uid to root after act_as_caller");
        }
    }

    /// Permanently drop privilege for commands that never need root again
    /// (listing delegations, removing one's own delegation).
    pub fn drop_permanently(&self) -> Result<(), CoreError> {
        if self.running_privileged() {
            self.sys
                .setuid(self.real_uid)
                .map_err(|e| CoreError::from_nix("setuid", e))?;
        }
        Ok(())
    }

    /// Whether the kernel grants the caller `CAP_CHOWN` independent of any
    /// delegation, covering a capability-aware caller that was never given
    /// an explicit grant.
    pub fn caller_can_chown(&self, path: &Path) -> bool {
        let _guard = match self.act_as_caller() {
            Ok(g) => g,
            Err(_) => return false,
        };
        tracing::trace!(?path, "probing CAP_CHOWN as caller");
        self.sys.has_effective_cap_chown()
    }
}

/// RAII guard returned by [`PrivilegeBroker::act_as_caller`].
pub struct ActAsCaller<'a, S: PrivilegeSyscalls> {
    broker: &'a PrivilegeBroker<S>,
}

impl<'a, S: PrivilegeSyscalls> Drop for ActAsCaller<'a, S> {
    fn drop(&mut self) {
        self.broker.release_act_as_caller();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct FakeSyscalls {
        euid: RefCell<u32>,
        real_uid: u32,
        cap_chown: bool,
        seteuid_calls: RefCell<Vec<u32>>,
    }

    impl PrivilegeSyscalls for FakeSyscalls {
        fn getuid(&self) -> NixUid {
            NixUid::from_raw(self.real_uid)
        }

        fn seteuid(&self, uid: NixUid) -> nix::Result<()> {
            self.seteuid_calls.borrow_mut().push(uid.as_raw());
            *self.euid.borrow_mut() = uid.as_raw();
            Ok(())
        }

        fn setuid(&self, uid: NixUid) -> nix::Result<()> {
            *self.euid.borrow_mut() = uid.as_raw();
            Ok(())
        }

        fn has_effective_cap_chown(&self) -> bool {
            self.cap_chown
        }
    }

    fn setuid_root_fixture(cap_chown: bool) -> PrivilegeBroker<FakeSyscalls> {
        PrivilegeBroker::with_syscalls(FakeSyscalls {
            euid: RefCell::new(0),
            real_uid: 1000,
            cap_chown,
            seteuid_calls: RefCell::new(Vec::new()),
        })
    }

    #[test]
    fn act_as_caller_drops_and_restores_euid() {
        let broker = setuid_root_fixture(false);
        {
            let _guard = broker.act_as_caller().unwrap();
            assert_eq!(*broker.sys.euid.borrow(), 1000);
        }
        assert_eq!(*broker.sys.euid.borrow(), 0);
    }

    #[test]
    fn nested_act_as_caller_only_touches_euid_at_the_edges() {
        let broker = setuid_root_fixture(false);
        {
            let outer = broker.act_as_caller().unwrap();
            {
                let _inner = broker.act_as_caller().unwrap();
                assert_eq!(*broker.sys.euid.borrow(), 1000);
            }
            assert_eq!(*broker.sys.euid.borrow(), 1000);
            drop(outer);
        }
        assert_eq!(*broker.sys.euid.borrow(), 0);
        // exactly one seteuid(1000) and one seteuid(0), not two of each
        assert_eq!(*broker.sys.seteuid_calls.borrow(), vec![1000, 0]);
    }

    #[test]
    fn not_privileged_process_never_calls_seteuid() {
        let broker = PrivilegeBroker::with_syscalls(FakeSyscalls {
            euid: RefCell::new(1000),
            real_uid: 1000,
            cap_chown: false,
            seteuid_calls: RefCell::new(Vec::new()),
        });
        let _guard = broker.act_as_caller().unwrap();
        assert!(broker.sys.seteuid_calls.borrow().is_empty());
    }

    #[test]
    fn caller_can_chown_reflects_fake_capability() {
        let broker = setuid_root_fixture(true);
        assert!(broker.caller_can_chown(Path::new("/tmp")));
        let broker = setuid_root_fixture(false);
        assert!(!broker.caller_can_chown(Path::new("/tmp")));
    }
}
