// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Operands, rvalues and call targets.

use serde::{Deserialize, Serialize};

use crate::{Intrinsic, LocalId, ProcId};

/// Operand - value that can be used
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Local(LocalId),
    Constant(Const),
}

impl Operand {
    pub fn int(v: i64) -> Self {
        Operand::Constant(Const::Int(v))
    }

    pub fn bool(v: bool) -> Self {
        Operand::Constant(Const::Bool(v))
    }

    pub fn str(v: impl Into<String>) -> Self {
        Operand::Constant(Const::Str(v.into()))
    }

    pub fn as_local(&self) -> Option<LocalId> {
        match self {
            Operand::Local(id) => Some(*id),
            Operand::Constant(_) => None,
        }
    }
}

impl From<LocalId> for Operand {
    fn from(id: LocalId) -> Self {
        Operand::Local(id)
    }
}

/// Constant value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Const {
    Unit,
    Int(i64),
    Bool(bool),
    Str(String),
}

/// Rvalue - right-hand side of assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RValue {
    Use(Operand),
    BinaryOp {
        op: BinOp,
        left: Operand,
        right: Operand,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Operand,
    },
}

impl RValue {
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            RValue::Use(op) => vec![op],
            RValue::BinaryOp { left, right, .. } => vec![left, right],
            RValue::UnaryOp { operand, .. } => vec![operand],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    /// String concatenation
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// How a call picks its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallKind {
    /// Exactly the named procedure.
    Static,
    /// The named procedure or any override in a subtype.
    Virtual,
}

/// Call target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionRef {
    pub target: ProcId,
    pub kind: CallKind,
}

impl FunctionRef {
    pub fn direct(target: ProcId) -> Self {
        Self { target, kind: CallKind::Static }
    }

    pub fn virtual_call(target: ProcId) -> Self {
        Self { target, kind: CallKind::Virtual }
    }

    /// Call to a runtime primitive.
    pub fn intrinsic(which: Intrinsic) -> Self {
        Self::direct(which.proc_id())
    }
}
