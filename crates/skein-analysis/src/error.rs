// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Analysis errors.

use skein_ir::{BlockId, LocalId, ProcId};
use thiserror::Error;

/// Structural defect in a procedure's control-flow graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("procedure has a body but no blocks")]
    Empty,

    #[error("entry block {0} does not exist")]
    MissingEntry(BlockId),

    #[error("block at index {index} is labelled {found}")]
    MisnumberedBlock { index: usize, found: BlockId },

    #[error("{from} jumps to missing block {to}")]
    DanglingEdge { from: BlockId, to: BlockId },

    #[error("{block} refers to undeclared local {local}")]
    UndeclaredLocal { block: BlockId, local: LocalId },

    #[error("unwoven procedure contains resumption code in {0}")]
    ResumptionCode(BlockId),
}

/// The analysis could not classify a procedure.
///
/// Aborts transformation of that procedure only; the rest of the unit is
/// still classified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("malformed control-flow graph in {proc}: {source}")]
    MalformedGraph {
        proc: ProcId,
        #[source]
        source: GraphError,
    },

    #[error("bridge {proc} must forward to exactly one call, found {calls}")]
    BridgeForwarding { proc: ProcId, calls: usize },

    #[error("{caller} calls {callee}, which is declared nowhere")]
    UnresolvedCall { caller: ProcId, callee: ProcId },

    #[error("{0} is defined more than once in the unit")]
    DuplicateProcedure(ProcId),

    #[error("invalid external metadata: {0}")]
    Metadata(String),
}

impl AnalysisError {
    /// The procedure this error aborts, if it is tied to one.
    pub fn procedure(&self) -> Option<&ProcId> {
        match self {
            AnalysisError::MalformedGraph { proc, .. }
            | AnalysisError::BridgeForwarding { proc, .. }
            | AnalysisError::DuplicateProcedure(proc) => Some(proc),
            AnalysisError::UnresolvedCall { caller, .. } => Some(caller),
            AnalysisError::Metadata(_) => None,
        }
    }
}
