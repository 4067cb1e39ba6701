// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Mailboxes: single-consumer, multi-producer message queues.
//!
//! Three flavours of every operation:
//! - non-blocking (`getnb`, `putnb`): never wait;
//! - cooperative (`get`, `put`): pause the calling task, freeing its worker;
//! - hard-blocking (`getb`, `putb`): park the calling OS thread.
//!
//! One lock guards the buffer, the waiting consumer and the waiting
//! producers. Waiters are registered under that lock and resumed only after
//! it is released, so resuming a task never happens with a mailbox held.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::task::Poll;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::trace;

use crate::error::protocol_violation;
use crate::pause::{PauseReason, Probe};
use crate::ring::RingBuffer;
use crate::task::{Task, TaskId};
use crate::{Fiber, MailboxError};

const DEFAULT_INITIAL_CAPACITY: usize = 10;

pub struct Mailbox<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    msg_available: Condvar,
    space_available: Condvar,
}

struct State<T> {
    ring: RingBuffer<T>,
    /// The consumer task waiting for a message, if any.
    sink: Option<Arc<Task>>,
    /// Producer tasks waiting for space, in arrival order.
    srcs: VecDeque<Arc<Task>>,
}

impl<T> State<T> {
    /// Pop a message. Returns the producer to wake if space opened up.
    fn take(&mut self, space_available: &Condvar) -> Option<(T, Option<Arc<Task>>)> {
        let msg = self.ring.pop()?;
        space_available.notify_one();
        let src = if self.ring.has_space() { self.srcs.pop_front() } else { None };
        Some((msg, src))
    }

    /// Push a message. Returns the consumer to wake.
    fn give(&mut self, msg: T, msg_available: &Condvar) -> Result<Option<Arc<Task>>, T> {
        self.ring.push(msg)?;
        msg_available.notify_one();
        Ok(self.sink.take())
    }
}

impl<T> Mailbox<T> {
    /// Unbounded mailbox.
    pub fn new() -> Self {
        Self::build(DEFAULT_INITIAL_CAPACITY, usize::MAX)
    }

    /// Mailbox holding at most `max` messages (at least one).
    pub fn bounded(max: usize) -> Self {
        let max = max.max(1);
        Self::build(DEFAULT_INITIAL_CAPACITY.min(max), max)
    }

    pub fn with_capacity(initial: usize, max: usize) -> Result<Self, MailboxError> {
        if initial == 0 || max == 0 || initial > max {
            return Err(MailboxError::InvalidCapacity { initial, max });
        }
        Ok(Self::build(initial, max))
    }

    fn build(initial: usize, max: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    ring: RingBuffer::new(initial, max),
                    sink: None,
                    srcs: VecDeque::new(),
                }),
                msg_available: Condvar::new(),
                space_available: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.shared.state.lock()
    }

    // ── Non-blocking ────────────────────────────────────────────

    pub fn getnb(&self) -> Option<T> {
        let (msg, src) = self.lock().take(&self.shared.space_available)?;
        wake(src);
        Some(msg)
    }

    /// Enqueue `msg`, handing it back if the mailbox is full.
    pub fn try_put(&self, msg: T) -> Result<(), T> {
        let sink = self.lock().give(msg, &self.shared.msg_available)?;
        wake(sink);
        Ok(())
    }

    pub fn putnb(&self, msg: T) -> bool {
        self.try_put(msg).is_ok()
    }

    // ── Hard-blocking ───────────────────────────────────────────

    /// Block the current thread until a message arrives.
    pub fn getb(&self) -> T {
        loop {
            if let Some(msg) = self.get_until(None) {
                return msg;
            }
        }
    }

    pub fn getb_timeout(&self, timeout: Duration) -> Option<T> {
        self.get_until(Some(Instant::now() + timeout))
    }

    fn get_until(&self, deadline: Option<Instant>) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some((msg, src)) = state.take(&self.shared.space_available) {
                drop(state);
                wake(src);
                return Some(msg);
            }
            match deadline {
                None => self.shared.msg_available.wait(&mut state),
                Some(deadline) => {
                    if self.shared.msg_available.wait_until(&mut state, deadline).timed_out() {
                        let (msg, src) = state.take(&self.shared.space_available)?;
                        drop(state);
                        wake(src);
                        return Some(msg);
                    }
                }
            }
        }
    }

    /// Block the current thread until there is room for `msg`.
    pub fn putb(&self, msg: T) {
        let mut msg = msg;
        loop {
            match self.put_until(msg, None) {
                Ok(()) => return,
                Err(back) => msg = back,
            }
        }
    }

    pub fn putb_timeout(&self, msg: T, timeout: Duration) -> Result<(), T> {
        self.put_until(msg, Some(Instant::now() + timeout))
    }

    fn put_until(&self, msg: T, deadline: Option<Instant>) -> Result<(), T> {
        let mut state = self.lock();
        let mut msg = msg;
        loop {
            match state.give(msg, &self.shared.msg_available) {
                Ok(sink) => {
                    drop(state);
                    wake(sink);
                    return Ok(());
                }
                Err(back) => msg = back,
            }
            match deadline {
                None => self.shared.space_available.wait(&mut state),
                Some(deadline) => {
                    if self.shared.space_available.wait_until(&mut state, deadline).timed_out() {
                        let sink = state.give(msg, &self.shared.msg_available)?;
                        drop(state);
                        wake(sink);
                        return Ok(());
                    }
                }
            }
        }
    }

    // ── Inspection ──────────────────────────────────────────────

    pub fn has_message(&self) -> bool {
        !self.lock().ring.is_empty()
    }

    pub fn has_space(&self) -> bool {
        self.lock().ring.has_space()
    }

    pub fn len(&self) -> usize {
        self.lock().ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().ring.is_empty()
    }

    pub fn max_capacity(&self) -> usize {
        self.lock().ring.max()
    }

    /// Whether both handles refer to the same mailbox.
    pub fn same_as(&self, other: &Mailbox<T>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<T: Send + 'static> Mailbox<T> {
    // ── Cooperative ─────────────────────────────────────────────

    /// Take a message, or pause the fiber's task until one arrives.
    ///
    /// On `Pending` the caller must return to its driver; the task is resumed
    /// when a message is put and the call should be repeated.
    ///
    /// # Panics
    ///
    /// With [`ProtocolViolation`](crate::ProtocolViolation) if another task
    /// is already waiting on this mailbox, or if the fiber has no task.
    pub fn get(&self, fiber: &mut Fiber) -> Poll<T> {
        let task = fiber.task();
        let taken = {
            let mut state = self.lock();
            match state.take(&self.shared.space_available) {
                Some(taken) => {
                    let was_waiting = matches!(
                        (&state.sink, &task),
                        (Some(sink), Some(me)) if sink.id() == me.id()
                    );
                    if was_waiting {
                        state.sink = None;
                    }
                    Some(taken)
                }
                None => {
                    let Some(me) = task else {
                        protocol_violation("cooperative get outside a task");
                    };
                    if let Some(sink) = &state.sink {
                        if sink.id() != me.id() {
                            protocol_violation(format!(
                                "{} waits on a mailbox already awaited by {}",
                                me.id(),
                                sink.id()
                            ));
                        }
                    }
                    state.sink = Some(me);
                    None
                }
            }
        };

        match taken {
            Some((msg, src)) => {
                wake(src);
                Poll::Ready(msg)
            }
            None => {
                trace!(mailbox = %self, "consumer paused");
                fiber.listen(self.probe());
                fiber.pause(PauseReason::WaitingForMessage(self.probe()))
            }
        }
    }

    /// Put a message, or pause the fiber's task until there is room.
    ///
    /// `Err` hands `msg` back: the task is paused and the call should be
    /// repeated with the same message once it resumes.
    pub fn put(&self, fiber: &mut Fiber, msg: T) -> Result<(), T> {
        let task = fiber.task();
        let sink = {
            let mut state = self.lock();
            match state.give(msg, &self.shared.msg_available) {
                Ok(sink) => {
                    if let Some(me) = &task {
                        state.srcs.retain(|t| t.id() != me.id());
                    }
                    sink
                }
                Err(msg) => {
                    let Some(me) = task else {
                        protocol_violation("cooperative put outside a task");
                    };
                    if !state.srcs.iter().any(|t| t.id() == me.id()) {
                        state.srcs.push_back(me);
                    }
                    drop(state);
                    trace!(mailbox = %self, "producer paused");
                    fiber.listen(self.probe());
                    let _: Poll<()> = fiber.pause(PauseReason::WaitingForSpace(self.probe()));
                    return Err(msg);
                }
            }
        };
        wake(sink);
        Ok(())
    }

    fn probe(&self) -> Arc<dyn Probe> {
        self.shared.clone()
    }
}

impl<T: Send> Probe for Shared<T> {
    fn has_message(&self) -> bool {
        !self.state.lock().ring.is_empty()
    }

    fn has_space(&self) -> bool {
        self.state.lock().ring.has_space()
    }

    fn remove_listener(&self, task: TaskId) {
        let mut state = self.state.lock();
        if state.sink.as_ref().is_some_and(|sink| sink.id() == task) {
            state.sink = None;
        }
        state.srcs.retain(|t| t.id() != task);
    }
}

fn wake(task: Option<Arc<Task>>) {
    if let Some(task) = task {
        task.resume();
    }
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Display for Mailbox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        write!(f, "mailbox@{:p} [{}/{}", Arc::as_ptr(&self.shared), state.ring.len(), state.ring.capacity())?;
        if let Some(sink) = &state.sink {
            write!(f, ", consumer {}", sink.id())?;
        }
        if !state.srcs.is_empty() {
            write!(f, ", {} producers waiting", state.srcs.len())?;
        }
        write!(f, "]")
    }
}

impl<T> fmt::Debug for Mailbox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
