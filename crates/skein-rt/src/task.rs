// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Tasks: a body, the fiber it suspends into, and its lifecycle.
//!
//! ```text
//! Created --start--> Running --pause--> Paused --resume--> Running
//!                       |
//!                       +--complete / exit / failure--> Done
//! ```
//!
//! A task is running from the moment it is handed to its executor until its
//! body returns. `resume` on a running or finished task is a no-op, so at
//! most one worker drives a task at a time and each resume schedules it at
//! most once.

use std::fmt;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::Poll;

use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use crate::pause::PauseReason;
use crate::scheduler::Executor;
use crate::{Failure, Fiber, Mailbox, ProtocolViolation, TaskError, Value};

/// The code a task runs.
///
/// Called once per drive. `Pending` means the body suspended: the reason is
/// on the fiber (see [`Fiber::pause`]) and the body will be called again
/// after the task resumes.
pub trait Execute: Send {
    fn execute(&mut self, fiber: &mut Fiber) -> Poll<Result<Value, Failure>>;
}

/// Body from a closure.
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: FnMut(&mut Fiber) -> Poll<Result<Value, Failure>> + Send,
{
    FromFn(f)
}

pub struct FromFn<F>(F);

impl<F> Execute for FromFn<F>
where
    F: FnMut(&mut Fiber) -> Poll<Result<Value, Failure>> + Send,
{
    fn execute(&mut self, fiber: &mut Fiber) -> Poll<Result<Value, Failure>> {
        (self.0)(fiber)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TaskId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Created,
    Running,
    Paused,
    Done,
}

/// Sent to every mailbox registered with [`Task::inform_on_exit`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExitMessage {
    pub task: TaskId,
    pub result: Result<Value, Failure>,
}

pub struct Task {
    id: TaskId,
    state: Mutex<TaskState>,
    engine: Mutex<Engine>,
    this: Weak<Task>,
}

struct TaskState {
    started: bool,
    running: bool,
    done: bool,
    pause_reason: Option<PauseReason>,
    result: Option<Result<Value, Failure>>,
    exit_mailboxes: Vec<Mailbox<ExitMessage>>,
    executor: Option<Arc<dyn Executor>>,
}

struct Engine {
    body: Box<dyn Execute>,
    fiber: Fiber,
}

impl Task {
    pub fn new(body: impl Execute + 'static) -> Arc<Self> {
        Arc::new_cyclic(|this| Task {
            id: TaskId::next(),
            state: Mutex::new(TaskState {
                started: false,
                running: false,
                done: false,
                pause_reason: None,
                result: None,
                exit_mailboxes: Vec::new(),
                executor: None,
            }),
            engine: Mutex::new(Engine { body: Box::new(body), fiber: Fiber::for_task(this.clone()) }),
            this: this.clone(),
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Hand the task to `executor` for its first run.
    pub fn start(self: &Arc<Self>, executor: Arc<dyn Executor>) -> Result<(), TaskError> {
        if executor.is_shutdown() {
            return Err(TaskError::ExecutorShutdown);
        }
        {
            let mut state = self.state.lock();
            if state.started {
                return Err(TaskError::AlreadyStarted(self.id));
            }
            state.started = true;
            state.running = true;
            state.executor = Some(executor.clone());
        }
        if !executor.schedule(self.clone()) {
            let mut state = self.state.lock();
            state.started = false;
            state.running = false;
            state.executor = None;
            return Err(TaskError::ExecutorShutdown);
        }
        debug!(task = %self.id, "started");
        Ok(())
    }

    /// Start on the executor of the task that owns `fiber`.
    pub fn start_from(self: &Arc<Self>, fiber: &Fiber) -> Result<(), TaskError> {
        let executor = fiber.task().and_then(|t| t.executor()).ok_or(TaskError::NoCurrentTask)?;
        self.start(executor)
    }

    /// Schedule the task again if it is paused. No-op when it is already
    /// running, finished, or never started.
    pub fn resume(&self) {
        let executor = {
            let mut state = self.state.lock();
            if state.done || !state.started || state.running {
                return;
            }
            state.running = true;
            state.executor.clone()
        };
        let (Some(executor), Some(this)) = (executor, self.this.upgrade()) else {
            return;
        };
        trace!(task = %self.id, "resumed");
        if !executor.schedule(this) {
            self.state.lock().running = false;
        }
    }

    /// Drive the body once. Called by the executor.
    pub fn run(&self) {
        let outcome = {
            let mut engine = self.engine.lock();
            let Engine { body, fiber } = &mut *engine;
            // Listeners from the previous pause; a retried get or put
            // registers again.
            fiber.stop_listening();
            let outcome = catch_unwind(AssertUnwindSafe(|| body.execute(fiber)))
                .map(|poll| (poll, fiber.take_pause_reason()));
            let pausing = matches!(
                &outcome,
                Ok((Poll::Pending, reason)) if !reason.as_ref().is_some_and(PauseReason::is_done)
            );
            if !pausing {
                fiber.stop_listening();
            }
            outcome
        };

        match outcome {
            Err(payload) => {
                if payload.is::<ProtocolViolation>() {
                    resume_unwind(payload);
                }
                self.finish(Err(Failure::Panicked(panic_message(payload.as_ref()))));
            }
            Ok((Poll::Ready(result), _)) => self.finish(result),
            Ok((Poll::Pending, Some(PauseReason::Done(result)))) => self.finish(result),
            Ok((Poll::Pending, reason)) => {
                let reason = reason.unwrap_or_else(|| {
                    warn!(task = %self.id, "body suspended without a reason; treating as a yield");
                    PauseReason::Yielded
                });
                trace!(task = %self.id, %reason, "paused");
                {
                    let mut state = self.state.lock();
                    state.pause_reason = Some(reason.clone());
                    state.running = false;
                }
                // The awaited event may have fired while we were still
                // marked running, when resume() was a no-op.
                if !reason.is_valid() {
                    self.resume();
                }
            }
        }
    }

    fn finish(&self, result: Result<Value, Failure>) {
        let mailboxes = {
            let mut state = self.state.lock();
            state.done = true;
            state.running = false;
            state.pause_reason = Some(PauseReason::Done(result.clone()));
            state.result = Some(result.clone());
            state.executor = None;
            std::mem::take(&mut state.exit_mailboxes)
        };
        match &result {
            Ok(value) => debug!(task = %self.id, %value, "done"),
            Err(failure) => error!(task = %self.id, %failure, "task failed"),
        }
        for mailbox in mailboxes {
            self.notify_exit(&mailbox, result.clone());
        }
    }

    /// Deliver one [`ExitMessage`] to `mailbox` when the task finishes, or
    /// right away if it already has.
    pub fn inform_on_exit(&self, mailbox: Mailbox<ExitMessage>) {
        let finished = {
            let mut state = self.state.lock();
            match &state.result {
                Some(result) => Some(result.clone()),
                None => {
                    state.exit_mailboxes.push(mailbox.clone());
                    None
                }
            }
        };
        if let Some(result) = finished {
            self.notify_exit(&mailbox, result);
        }
    }

    fn notify_exit(&self, mailbox: &Mailbox<ExitMessage>, result: Result<Value, Failure>) {
        if !mailbox.putnb(ExitMessage { task: self.id, result }) {
            warn!(task = %self.id, "exit mailbox is full; exit message dropped");
        }
    }

    // ── Inspection ──────────────────────────────────────────────

    pub fn status(&self) -> TaskStatus {
        let state = self.state.lock();
        if state.done {
            TaskStatus::Done
        } else if !state.started {
            TaskStatus::Created
        } else if state.running {
            TaskStatus::Running
        } else {
            TaskStatus::Paused
        }
    }

    pub fn is_done(&self) -> bool {
        self.state.lock().done
    }

    pub fn result(&self) -> Option<Result<Value, Failure>> {
        self.state.lock().result.clone()
    }

    pub fn pause_reason(&self) -> Option<PauseReason> {
        self.state.lock().pause_reason.clone()
    }

    fn executor(&self) -> Option<Arc<dyn Executor>> {
        self.state.lock().executor.clone()
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status();
        write!(f, "{} [{:?}", self.id, status)?;
        if status == TaskStatus::Paused {
            if let Some(reason) = self.pause_reason() {
                write!(f, ": {}", reason)?;
            }
        }
        write!(f, "]")
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
