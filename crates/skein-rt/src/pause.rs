// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Why a task is not running.
//!
//! A paused task records its reason. After clearing its running flag the
//! task asks the reason whether it still holds; if the awaited event already
//! happened the task resumes itself instead of waiting for a notification
//! that has come and gone.

use std::fmt;
use std::sync::Arc;

use crate::{Failure, TaskId, Value};

/// Readiness of something a task can wait on.
pub trait Probe: Send + Sync {
    fn has_message(&self) -> bool;
    fn has_space(&self) -> bool;

    /// Forget `task` as a waiting consumer or producer.
    fn remove_listener(&self, _task: TaskId) {}
}

/// A user-defined pause reason.
pub trait PauseCondition: Send + Sync {
    /// Whether the task should stay paused.
    fn is_valid(&self) -> bool;

    fn describe(&self) -> String {
        "custom condition".to_string()
    }
}

#[derive(Clone)]
pub enum PauseReason {
    WaitingForMessage(Arc<dyn Probe>),
    WaitingForSpace(Arc<dyn Probe>),
    /// Voluntary yield: the task goes straight back on the run queue.
    Yielded,
    /// Terminal. The task will not run again.
    Done(Result<Value, Failure>),
    Custom(Arc<dyn PauseCondition>),
}

impl PauseReason {
    pub fn is_valid(&self) -> bool {
        match self {
            PauseReason::WaitingForMessage(probe) => !probe.has_message(),
            PauseReason::WaitingForSpace(probe) => !probe.has_space(),
            PauseReason::Yielded => false,
            PauseReason::Done(_) => true,
            PauseReason::Custom(cond) => cond.is_valid(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, PauseReason::Done(_))
    }
}

impl fmt::Display for PauseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PauseReason::WaitingForMessage(_) => write!(f, "waiting for message"),
            PauseReason::WaitingForSpace(_) => write!(f, "waiting for space"),
            PauseReason::Yielded => write!(f, "yielded"),
            PauseReason::Done(Ok(v)) => write!(f, "done: {}", v),
            PauseReason::Done(Err(e)) => write!(f, "failed: {}", e),
            PauseReason::Custom(cond) => write!(f, "{}", cond.describe()),
        }
    }
}

impl fmt::Debug for PauseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PauseReason({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Flag(AtomicBool);

    impl PauseCondition for Flag {
        fn is_valid(&self) -> bool {
            !self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn yield_never_holds_and_done_always_does() {
        assert!(!PauseReason::Yielded.is_valid());
        assert!(PauseReason::Done(Ok(Value::Unit)).is_valid());
    }

    #[test]
    fn custom_condition_is_consulted() {
        let flag = Arc::new(Flag(AtomicBool::new(false)));
        let reason = PauseReason::Custom(flag.clone());
        assert!(reason.is_valid());
        flag.0.store(true, Ordering::SeqCst);
        assert!(!reason.is_valid());
        assert_eq!(reason.to_string(), "custom condition");
    }
}
