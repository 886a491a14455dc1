//! Identity management (C12): a small free-list of uid/gid records used by
//! kernel-call handlers to authorize operations. Accessors and mutators here
//! perform no authorization themselves — that is always the caller's duty.

use crate::error::{KernelError, KernelResult};
use crate::sync::Spinlock;

const IDENTITY_MAX: usize = 64;

#[derive(Debug, Clone, Copy)]
struct Record {
    uid: u32,
    euid: u32,
    gid: u32,
    egid: u32,
    refcount: u32,
}

impl Record {
    const fn root() -> Self {
        Self {
            uid: 0,
            euid: 0,
            gid: 0,
            egid: 0,
            refcount: 1,
        }
    }

    const fn empty() -> Self {
        Self {
            uid: 0,
            euid: 0,
            gid: 0,
            egid: 0,
            refcount: 0,
        }
    }
}

/// A handle to a live identity record, valid until [`identity_drop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity(usize);

/// Slot 0 is permanently the superuser root identity, refcounted so it is
/// never reclaimed by [`identity_drop`].
pub const ROOT: Identity = Identity(0);

struct Table {
    records: [Record; IDENTITY_MAX],
}

static TABLE: Spinlock<Table> = Spinlock::new(Table {
    records: {
        let mut records = [Record::empty(); IDENTITY_MAX];
        records[0] = Record::root();
        records
    },
});

/// Returns the singleton root identity (`uid == 0`).
pub fn identity_root() -> Identity {
    ROOT
}

/// Allocates a new identity, copying every field from `base`.
pub fn identity_new(base: Identity) -> KernelResult<Identity> {
    let mut guard = TABLE.lock();
    let base_record = guard.records[base.0];
    let slot = guard
        .records
        .iter()
        .position(|r| r.refcount == 0)
        .ok_or(KernelError::Again {
            resource: "identity table",
        })?;
    guard.records[slot] = Record {
        refcount: 1,
        ..base_record
    };
    Ok(Identity(slot))
}

/// Releases a reference to `id`. The root identity is never reclaimed.
pub fn identity_drop(id: Identity) -> KernelResult<()> {
    if id == ROOT {
        return Ok(());
    }
    let mut guard = TABLE.lock();
    let record = &mut guard.records[id.0];
    if record.refcount == 0 {
        return Err(KernelError::Inval {
            reason: "identity already dropped",
        });
    }
    record.refcount -= 1;
    Ok(())
}

/// `true` iff `id`'s effective user ID is 0.
pub fn identity_is_superuser(id: Identity) -> bool {
    TABLE.lock().records[id.0].euid == 0
}

pub fn identity_getuid(id: Identity) -> u32 {
    TABLE.lock().records[id.0].uid
}

pub fn identity_geteuid(id: Identity) -> u32 {
    TABLE.lock().records[id.0].euid
}

pub fn identity_getgid(id: Identity) -> u32 {
    TABLE.lock().records[id.0].gid
}

pub fn identity_getegid(id: Identity) -> u32 {
    TABLE.lock().records[id.0].egid
}

pub fn identity_setuid(id: Identity, uid: u32) -> KernelResult<()> {
    TABLE.lock().records[id.0].uid = uid;
    Ok(())
}

pub fn identity_seteuid(id: Identity, euid: u32) -> KernelResult<()> {
    TABLE.lock().records[id.0].euid = euid;
    Ok(())
}

pub fn identity_setgid(id: Identity, gid: u32) -> KernelResult<()> {
    TABLE.lock().records[id.0].gid = gid;
    Ok(())
}

pub fn identity_setegid(id: Identity, egid: u32) -> KernelResult<()> {
    TABLE.lock().records[id.0].egid = egid;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_superuser() {
        assert!(identity_is_superuser(identity_root()));
    }

    #[test]
    fn new_identity_inherits_base_then_can_be_modified_independently() {
        let base = identity_root();
        let child = identity_new(base).unwrap();
        identity_setuid(child, 1000).unwrap();
        identity_seteuid(child, 1000).unwrap();
        assert_eq!(identity_getuid(child), 1000);
        assert_eq!(identity_getuid(base), 0);
        assert!(!identity_is_superuser(child));
        identity_drop(child).unwrap();
    }

    #[test]
    fn double_drop_is_an_error() {
        let child = identity_new(identity_root()).unwrap();
        identity_drop(child).unwrap();
        assert!(identity_drop(child).is_err());
    }

    #[test]
    fn dropping_root_is_a_no_op() {
        assert!(identity_drop(identity_root()).is_ok());
        assert!(identity_is_superuser(identity_root()));
    }
}
