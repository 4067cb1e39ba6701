// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Continuation weaving.
//!
//! Turns each suspending procedure into a re-entrant state machine: the
//! graph is cut at every suspending call, live locals are saved per
//! resumption state, and a dispatching entry block routes resumed calls
//! back to where they left off.

mod error;
pub mod liveness;
mod state_machine;
mod unit;
mod verify;

pub use error::{InvariantViolation, WeaveError};
pub use state_machine::{transform, StateHolder, TransformedProcedure};
pub use unit::{WeaveFailure, Weaver, WovenUnit};
pub use verify::verify;
