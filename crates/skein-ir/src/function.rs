// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Procedure representation - control-flow graph of basic blocks.

use serde::{Deserialize, Serialize};

use crate::{Stmt, Terminator, Ty};

/// Stable identity of a procedure: declaring type, name and signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcId {
    pub owner: String,
    pub name: String,
    pub signature: String,
}

impl ProcId {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            signature: signature.into(),
        }
    }

    /// Instance and type initializers never suspend.
    pub fn is_initializer(&self) -> bool {
        self.name == "<init>" || self.name == "<clinit>"
    }

    /// Same name and signature, regardless of the declaring type.
    pub fn same_member(&self, other: &ProcId) -> bool {
        self.name == other.name && self.signature == other.signature
    }
}

/// Procedure attributes supplied by the front end (or set by weaving).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcAttrs {
    /// Explicitly declared as suspending.
    pub suspend_marker: bool,
    /// Compiler-generated forwarder to a single concrete call.
    pub bridge: bool,
    /// No body (interface or abstract declaration).
    pub is_abstract: bool,
    /// Already rewritten into state-machine form.
    pub woven: bool,
}

/// A procedure and its control-flow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub id: ProcId,
    pub params: Vec<Local>,
    pub ret_ty: Ty,
    pub locals: Vec<Local>,
    pub blocks: Vec<Block>,
    pub entry_block: BlockId,
    #[serde(default)]
    pub attrs: ProcAttrs,
    /// Resumption states, populated by weaving. State 0 is fresh entry.
    #[serde(default)]
    pub states: Vec<ResumptionState>,
}

impl Procedure {
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.0 as usize)
    }

    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(id.0 as usize)
    }

    pub fn local(&self, id: LocalId) -> Option<&Local> {
        self.locals.get(id.0 as usize)
    }

    pub fn state(&self, id: StateId) -> Option<&ResumptionState> {
        self.states.iter().find(|s| s.id == id)
    }

    /// Every call made by this procedure, in block order.
    pub fn calls(&self) -> impl Iterator<Item = &crate::FunctionRef> {
        self.blocks.iter().flat_map(|block| {
            block
                .statements
                .iter()
                .filter_map(|stmt| match stmt {
                    Stmt::Call { func, .. } => Some(func),
                    _ => None,
                })
                .chain(match &block.terminator {
                    Terminator::SuspendCall { func, .. } => Some(func),
                    _ => None,
                })
        })
    }

    pub fn has_body(&self) -> bool {
        !self.attrs.is_abstract && !self.blocks.is_empty()
    }
}

/// Basic block in CFG
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub statements: Vec<Stmt>,
    pub terminator: Terminator,
    /// Exceptional edge taken when any statement in the block raises.
    #[serde(default)]
    pub handler: Option<Handler>,
    /// Indices of statements that are calls to suspending procedures.
    /// Filled in by classification.
    #[serde(default)]
    pub suspend_sites: Vec<usize>,
}

impl Block {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            statements: Vec::new(),
            terminator: Terminator::Unreachable,
            handler: None,
            suspend_sites: Vec::new(),
        }
    }

    /// True when the block contains at least one suspending call.
    pub fn suspends(&self) -> bool {
        !self.suspend_sites.is_empty()
    }
}

/// Exception handler scope covering a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handler {
    pub target: BlockId,
    /// Local receiving the raised value.
    pub bind: LocalId,
}

/// Local variable or temporary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Local {
    pub id: LocalId,
    pub name: Option<String>,
    pub ty: Ty,
    pub is_param: bool,
}

impl Local {
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("_{}", self.id.0),
        }
    }
}

/// A point where a woven procedure can be re-entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumptionState {
    pub id: StateId,
    /// Block control reaches when re-entering at this state.
    pub block: BlockId,
    /// Locals that must be restored at this state, in save order.
    pub live: Vec<LiveSlot>,
    /// States reachable without crossing another suspension point.
    pub successors: Vec<StateId>,
}

/// A saved local in a resumption state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LiveSlot {
    pub local: LocalId,
    pub name: String,
    pub ty: Ty,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BlockId(pub u32);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct LocalId(pub u32);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct StateId(pub u32);

impl StateId {
    /// Fresh entry.
    pub const ENTRY: StateId = StateId(0);
}
