// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Procedure IR - non-SSA control-flow graph of basic blocks.
//!
//! Every procedure the analysis sees, and every woven procedure the runtime
//! executes, is expressed in this form. Blocks carry straight-line statements,
//! a terminator for normal control flow and an optional exception handler edge.

mod builder;
mod display;
mod function;
mod intrinsic;
mod operand;
mod stmt;
mod types;
mod unit;

pub use builder::BlockBuilder;
pub use function::{
    Block, BlockId, Handler, LiveSlot, Local, LocalId, ProcAttrs, ProcId, Procedure,
    ResumptionState, StateId,
};
pub use intrinsic::{Intrinsic, RUNTIME_OWNER};
pub use operand::{BinOp, CallKind, Const, FunctionRef, Operand, RValue, UnaryOp};
pub use stmt::{Stmt, Terminator};
pub use types::Ty;
pub use unit::{CompilationUnit, TypeDecl};
