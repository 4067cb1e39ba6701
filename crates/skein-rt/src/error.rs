// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Runtime errors.

use std::fmt;

use thiserror::Error;

use crate::task::TaskId;
use crate::Value;

/// Why a task finished without a value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Failure {
    /// An exception escaped the task body.
    #[error("uncaught exception: {0}")]
    Raised(Value),

    #[error("task panicked: {0}")]
    Panicked(String),

    /// The machine could not continue: bad program, type error, or a
    /// suspension through code that was never woven.
    #[error("machine fault: {0}")]
    Fault(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("{0} was already started")]
    AlreadyStarted(TaskId),

    #[error("executor is shut down")]
    ExecutorShutdown,

    #[error("not running inside a task")]
    NoCurrentTask,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailboxError {
    #[error("invalid mailbox capacity: initial {initial}, max {max}")]
    InvalidCapacity { initial: usize, max: usize },
}

/// Panic payload for misuse of the mailbox protocol, such as two tasks
/// waiting on the same mailbox. Tasks do not catch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolViolation(pub String);

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "protocol violation: {}", self.0)
    }
}

impl std::error::Error for ProtocolViolation {}

pub(crate) fn protocol_violation(message: impl Into<String>) -> ! {
    let violation = ProtocolViolation(message.into());
    tracing::error!(%violation, "aborting");
    std::panic::panic_any(violation)
}
