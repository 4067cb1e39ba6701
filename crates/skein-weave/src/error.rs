// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Weaving errors.

use skein_analysis::AnalysisError;
use skein_ir::ProcId;
use thiserror::Error;

/// The woven form of a procedure broke one of its own guarantees.
///
/// Always fatal for that procedure: the output is discarded, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transformation invariant violated in {proc}: {detail}")]
pub struct InvariantViolation {
    pub proc: ProcId,
    pub detail: String,
}

#[derive(Debug, Error)]
pub enum WeaveError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("{0} does not suspend; nothing to weave")]
    NotSuspending(ProcId),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    #[error("cannot access woven unit: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed woven unit: {0}")]
    Format(#[from] serde_json::Error),
}
