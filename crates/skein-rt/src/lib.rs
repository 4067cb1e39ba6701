// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Skein runtime.
//!
//! Lightweight tasks multiplexed over a fixed pool of worker threads. A task
//! suspends by unwinding its woven frames into its [`Fiber`] and is resumed
//! by rewinding them on whichever worker picks it up next.
//!
//! Components:
//! - fiber: frame snapshots and the task primitives (yield, pause, exit)
//! - task: lifecycle, pause reasons, exit notification
//! - scheduler: shared run queue + worker pool
//! - mailbox: single-consumer, multi-producer message queue
//! - timer: sleeping without holding a worker
//! - generator: iterator over values yielded by a body
//! - machine: executes woven IR procedures

pub mod config;
mod error;
pub mod fiber;
pub mod generator;
pub mod machine;
pub mod mailbox;
pub mod pause;
mod queue;
mod ring;
pub mod scheduler;
pub mod task;
pub mod timer;
mod value;

pub use config::SchedulerConfig;
pub use error::{Failure, MailboxError, ProtocolViolation, TaskError};
pub use fiber::{Cursor, Fiber, Frame};
pub use generator::Generator;
pub use machine::{Machine, Outcome, Output, Program};
pub use mailbox::Mailbox;
pub use pause::{PauseCondition, PauseReason, Probe};
pub use scheduler::{Executor, Scheduler};
pub use task::{from_fn, Execute, ExitMessage, Task, TaskId, TaskStatus};
pub use timer::{timer_after, Sleep};
pub use value::Value;
