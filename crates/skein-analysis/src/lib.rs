// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Suspendability analysis.
//!
//! Decides, for every procedure of a compilation unit, whether a call to it
//! can give up the worker thread. The verdict is computed once per unit and
//! the suspending call sites are recorded on each block for weaving.

mod classifier;
mod config;
mod error;
pub mod metadata;
mod validate;

pub use classifier::{Classification, Classifier, UnresolvedCall, Verdict};
pub use config::AnalysisConfig;
pub use error::{AnalysisError, GraphError};
pub use metadata::{ExternalMetadata, ExternalResolver, Lookup};
pub use validate::validate_procedure;
