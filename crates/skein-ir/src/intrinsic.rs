// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Runtime primitives callable from IR.
//!
//! These are the only places where a task actually gives up its worker.
//! Everything else is classified as suspending only because it (transitively)
//! calls one of these.

use serde::{Deserialize, Serialize};

use crate::ProcId;

/// Declaring type of every runtime primitive.
pub const RUNTIME_OWNER: &str = "skein.rt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intrinsic {
    /// `yield()` or `yield(value)` when driven by a generator.
    Yield,
    /// `sleep(millis)`
    Sleep,
    /// `get(mailbox) -> msg`
    Get,
    /// `put(mailbox, msg)`
    Put,
    /// `getnb(mailbox) -> msg | unit`
    GetNb,
    /// `putnb(mailbox, msg) -> bool`
    PutNb,
    /// `exit(value)`
    Exit,
    /// `error_exit(value)`
    ErrorExit,
    /// `print(value)`, appends to the machine's output.
    Print,
}

const ALL: [Intrinsic; 9] = [
    Intrinsic::Yield,
    Intrinsic::Sleep,
    Intrinsic::Get,
    Intrinsic::Put,
    Intrinsic::GetNb,
    Intrinsic::PutNb,
    Intrinsic::Exit,
    Intrinsic::ErrorExit,
    Intrinsic::Print,
];

impl Intrinsic {
    pub fn name(self) -> &'static str {
        match self {
            Intrinsic::Yield => "yield",
            Intrinsic::Sleep => "sleep",
            Intrinsic::Get => "get",
            Intrinsic::Put => "put",
            Intrinsic::GetNb => "getnb",
            Intrinsic::PutNb => "putnb",
            Intrinsic::Exit => "exit",
            Intrinsic::ErrorExit => "error_exit",
            Intrinsic::Print => "print",
        }
    }

    fn signature(self) -> &'static str {
        match self {
            Intrinsic::Yield => "(..)",
            Intrinsic::Sleep => "(int)",
            Intrinsic::Get | Intrinsic::GetNb => "(mailbox)->any",
            Intrinsic::Put => "(mailbox,any)",
            Intrinsic::PutNb => "(mailbox,any)->bool",
            Intrinsic::Exit | Intrinsic::ErrorExit | Intrinsic::Print => "(any)",
        }
    }

    pub fn proc_id(self) -> ProcId {
        ProcId::new(RUNTIME_OWNER, self.name(), self.signature())
    }

    /// Look up a primitive by owner and name. The signature is not checked.
    pub fn from_proc(id: &ProcId) -> Option<Intrinsic> {
        if id.owner != RUNTIME_OWNER {
            return None;
        }
        ALL.iter().copied().find(|i| i.name() == id.name)
    }

    /// Whether calling this primitive can give up the worker.
    pub fn suspends(self) -> bool {
        match self {
            Intrinsic::Yield
            | Intrinsic::Sleep
            | Intrinsic::Get
            | Intrinsic::Put
            | Intrinsic::Exit
            | Intrinsic::ErrorExit => true,
            Intrinsic::GetNb | Intrinsic::PutNb | Intrinsic::Print => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_owner_and_name() {
        for which in ALL {
            assert_eq!(Intrinsic::from_proc(&which.proc_id()), Some(which));
        }
        assert_eq!(Intrinsic::from_proc(&ProcId::new("app.Main", "get", "()")), None);
    }

    #[test]
    fn nonblocking_primitives_do_not_suspend() {
        assert!(Intrinsic::Get.suspends());
        assert!(Intrinsic::Sleep.suspends());
        assert!(!Intrinsic::GetNb.suspends());
        assert!(!Intrinsic::PutNb.suspends());
        assert!(!Intrinsic::Print.suspends());
    }
}
