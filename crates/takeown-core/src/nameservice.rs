//! Username <-> UID resolution, injected rather than reached through a
//! process-global passwd lookup so tests can supply a deterministic
//! mapping without touching `/etc/passwd`.

use nix::unistd::{Uid as NixUid, User};
use takeown_common::Uid;

pub trait NameService {
    fn user_to_uid(&self, name: &str) -> Option<Uid>;
    fn uid_to_name(&self, uid: Uid) -> Option<String>;
}

/// Resolves through the system user database via `nix::unistd::User`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemNameService;

impl NameService for SystemNameService {
    fn user_to_uid(&self, name: &str) -> Option<Uid> {
        User::from_name(name).ok().flatten().map(|u| Uid(u.uid.as_raw()))
    }

    fn uid_to_name(&self, uid: Uid) -> Option<String> {
        User::from_uid(NixUid::from_raw(uid.0)).ok().flatten().map(|u| u.name)
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Default, Clone)]
    pub struct FakeNameService {
        by_name: HashMap<String, Uid>,
    }

    impl FakeNameService {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_user(mut self, name: &str, uid: u32) -> Self {
            self.by_name.insert(name.to_string(), Uid(uid));
            self
        }
    }

    impl NameService for FakeNameService {
        fn user_to_uid(&self, name: &str) -> Option<Uid> {
            self.by_name.get(name).copied()
        }

        fn uid_to_name(&self, uid: Uid) -> Option<String> {
            self.by_name
                .iter()
                .find(|(_, v)| **v == uid)
                .map(|(k, _)| k.clone())
        }
    }
}
