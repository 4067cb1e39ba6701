// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Statements and terminators.

use serde::{Deserialize, Serialize};

use crate::{BlockId, FunctionRef, LocalId, Operand, RValue, StateId};

/// Statement - no control flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Assign {
        dst: LocalId,
        rvalue: RValue,
    },
    Call {
        dst: Option<LocalId>,
        func: FunctionRef,
        args: Vec<Operand>,
    },
    /// Reload saved slots from the resumed frame, in order. Woven code only.
    Restore {
        slots: Vec<LocalId>,
    },
    /// Take the completion of the call that suspended: store its value in
    /// `dst`, or raise its exception in the enclosing handler scope.
    /// Woven code only.
    Resume {
        dst: Option<LocalId>,
    },
}

impl Stmt {
    pub fn is_call(&self) -> bool {
        matches!(self, Stmt::Call { .. })
    }
}

/// Terminator - ends a basic block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Terminator {
    Return {
        value: Option<Operand>,
    },
    Goto {
        target: BlockId,
    },
    Branch {
        cond: Operand,
        then_block: BlockId,
        else_block: BlockId,
    },
    Switch {
        value: Operand,
        cases: Vec<(i64, BlockId)>,
        default: BlockId,
    },
    /// Raise `value` to the block's handler or the caller.
    Throw {
        value: Operand,
    },
    Unreachable,
    /// Entry of a woven procedure: fresh calls go to `fresh`, resumed calls
    /// to the resume block of their recorded state.
    Dispatch {
        fresh: BlockId,
        states: Vec<(StateId, BlockId)>,
    },
    /// A call that may suspend. On suspension the `save` locals are captured
    /// into a frame tagged with `state`; on normal return control goes to
    /// `next`.
    SuspendCall {
        dst: Option<LocalId>,
        func: FunctionRef,
        args: Vec<Operand>,
        state: StateId,
        save: Vec<LocalId>,
        next: BlockId,
    },
}

impl Terminator {
    /// Normal (non-exceptional) successor blocks.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Return { .. } | Terminator::Throw { .. } | Terminator::Unreachable => {
                vec![]
            }
            Terminator::Goto { target } => vec![*target],
            Terminator::Branch { then_block, else_block, .. } => vec![*then_block, *else_block],
            Terminator::Switch { cases, default, .. } => {
                let mut out: Vec<BlockId> = cases.iter().map(|(_, b)| *b).collect();
                out.push(*default);
                out
            }
            Terminator::Dispatch { fresh, states } => {
                let mut out = vec![*fresh];
                out.extend(states.iter().map(|(_, b)| *b));
                out
            }
            Terminator::SuspendCall { next, .. } => vec![*next],
        }
    }

    /// Locals read by the terminator itself.
    pub fn uses(&self) -> Vec<LocalId> {
        let mut out = Vec::new();
        match self {
            Terminator::Return { value: Some(op) } | Terminator::Throw { value: op } => {
                out.extend(op.as_local());
            }
            Terminator::Branch { cond, .. } => out.extend(cond.as_local()),
            Terminator::Switch { value, .. } => out.extend(value.as_local()),
            Terminator::SuspendCall { args, save, .. } => {
                out.extend(args.iter().filter_map(Operand::as_local));
                out.extend(save.iter().copied());
            }
            Terminator::Return { value: None }
            | Terminator::Goto { .. }
            | Terminator::Unreachable
            | Terminator::Dispatch { .. } => {}
        }
        out
    }
}
