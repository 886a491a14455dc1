//! The kernel-call number table (C10), resolved against the original
//! implementation's stable numbering. Mirrors the teacher's
//! enum-plus-`TryFrom`-plus-dispatch-match pattern for its own syscall
//! table, generalized to this nucleus's 29 entries.

use crate::error::KernelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Kcall {
    Void0 = 0,
    Void1 = 1,
    Void2 = 2,
    Void3 = 3,
    Void4 = 4,
    Void5 = 5,
    Shutdown = 6,
    Write = 7,
    Fralloc = 8,
    Frfree = 9,
    Vmcreate = 10,
    Vmremove = 11,
    Vmmap = 12,
    Vmunmap = 13,
    Vmctrl = 14,
    Vminfo = 15,
    KmodGet = 16,
    Spawn = 17,
    Semget = 18,
    Semop = 19,
    Semctl = 20,
    ThreadGetId = 21,
    ThreadCreate = 22,
    ThreadExit = 23,
    ThreadYield = 24,
    /// Reserved for the IPC layer's NoC mailboxes, out of scope here; always
    /// dispatches to `NOSYS`.
    MailboxTag = 25,
    ThreadJoin = 26,
    ThreadDetach = 27,
    Pinfo = 28,
}

pub const KCALL_MAX: usize = 29;

impl TryFrom<usize> for Kcall {
    type Error = KernelError;

    fn try_from(nr: usize) -> Result<Self, Self::Error> {
        Ok(match nr {
            0 => Self::Void0,
            1 => Self::Void1,
            2 => Self::Void2,
            3 => Self::Void3,
            4 => Self::Void4,
            5 => Self::Void5,
            6 => Self::Shutdown,
            7 => Self::Write,
            8 => Self::Fralloc,
            9 => Self::Frfree,
            10 => Self::Vmcreate,
            11 => Self::Vmremove,
            12 => Self::Vmmap,
            13 => Self::Vmunmap,
            14 => Self::Vmctrl,
            15 => Self::Vminfo,
            16 => Self::KmodGet,
            17 => Self::Spawn,
            18 => Self::Semget,
            19 => Self::Semop,
            20 => Self::Semctl,
            21 => Self::ThreadGetId,
            22 => Self::ThreadCreate,
            23 => Self::ThreadExit,
            24 => Self::ThreadYield,
            25 => Self::MailboxTag,
            26 => Self::ThreadJoin,
            27 => Self::ThreadDetach,
            28 => Self::Pinfo,
            _ => return Err(KernelError::Nosys { kcall_nr: nr }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_registered_number_round_trips() {
        for nr in 0..KCALL_MAX {
            assert!(Kcall::try_from(nr).is_ok(), "kcall {nr} should be registered");
        }
    }

    #[test]
    fn unregistered_number_is_nosys() {
        assert_eq!(Kcall::try_from(KCALL_MAX), Err(KernelError::Nosys { kcall_nr: KCALL_MAX }));
    }
}
