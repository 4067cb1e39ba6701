// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Fibers: the suspended call stack of a task.
//!
//! A woven procedure that suspends pushes one [`Frame`] (its resumption
//! state and saved values) and returns. Its caller does the same, so after a
//! suspension the fiber holds one frame per activation, innermost first.
//! Resuming hands the frames back in that order; the executor re-enters each
//! procedure at its recorded state and feeds each result to the next frame.

use std::sync::{Arc, Weak};
use std::task::Poll;

use skein_ir::{ProcId, StateId};

use crate::pause::{PauseReason, Probe};
use crate::task::Task;
use crate::{Failure, Value};

/// One suspended activation.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub proc: ProcId,
    pub state: StateId,
    pub slots: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// Running normally, nothing saved.
    Idle,
    /// Frames are being pushed on the way out.
    Unwinding,
    /// Frames were handed back for re-entry.
    Rewinding,
}

pub struct Fiber {
    frames: Vec<Frame>,
    cursor: Cursor,
    pause_reason: Option<PauseReason>,
    offered: Option<Value>,
    /// Mailboxes holding this fiber's task as a listener.
    listening: Vec<Arc<dyn Probe>>,
    task: Weak<Task>,
}

impl Fiber {
    /// A fiber not owned by any task (generators, direct drives).
    pub fn new() -> Self {
        Self::for_task(Weak::new())
    }

    pub(crate) fn for_task(task: Weak<Task>) -> Self {
        Self {
            frames: Vec::new(),
            cursor: Cursor::Idle,
            pause_reason: None,
            offered: None,
            listening: Vec::new(),
            task,
        }
    }

    // ── Frames ──────────────────────────────────────────────────

    pub fn unwind(&mut self, frame: Frame) {
        self.cursor = Cursor::Unwinding;
        self.frames.push(frame);
    }

    /// Take the saved frames back, innermost first.
    pub fn rewind(&mut self) -> Vec<Frame> {
        self.cursor = Cursor::Rewinding;
        std::mem::take(&mut self.frames)
    }

    /// Put back frames that were rewound but not re-entered.
    pub fn unwind_rest(&mut self, rest: impl IntoIterator<Item = Frame>) {
        self.cursor = Cursor::Unwinding;
        self.frames.extend(rest);
    }

    /// Mark the rewind as finished.
    pub fn settle(&mut self) {
        self.cursor = if self.frames.is_empty() { Cursor::Idle } else { Cursor::Unwinding };
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn is_suspended(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    // ── Task primitives ─────────────────────────────────────────

    pub fn task(&self) -> Option<Arc<Task>> {
        self.task.upgrade()
    }

    /// Record why the task stops and return `Pending`.
    pub fn pause<T>(&mut self, reason: PauseReason) -> Poll<T> {
        self.set_pause_reason(reason);
        Poll::Pending
    }

    pub fn yield_now<T>(&mut self) -> Poll<T> {
        self.pause(PauseReason::Yielded)
    }

    /// Hand `value` to whoever drives this fiber as a generator, then yield.
    pub fn yield_value<T>(&mut self, value: Value) -> Poll<T> {
        self.offered = Some(value);
        self.yield_now()
    }

    /// Finish the task with `value`. The task never runs again.
    pub fn exit<T>(&mut self, value: Value) -> Poll<T> {
        self.pause(PauseReason::Done(Ok(value)))
    }

    pub fn error_exit<T>(&mut self, failure: Failure) -> Poll<T> {
        self.pause(PauseReason::Done(Err(failure)))
    }

    pub fn pause_reason(&self) -> Option<&PauseReason> {
        self.pause_reason.as_ref()
    }

    pub(crate) fn set_pause_reason(&mut self, reason: PauseReason) {
        self.pause_reason = Some(reason);
    }

    pub(crate) fn take_pause_reason(&mut self) -> Option<PauseReason> {
        self.pause_reason.take()
    }

    pub(crate) fn offer(&mut self, value: Value) {
        self.offered = Some(value);
    }

    pub(crate) fn take_offered(&mut self) -> Option<Value> {
        self.offered.take()
    }

    pub(crate) fn listen(&mut self, probe: Arc<dyn Probe>) {
        let addr = Arc::as_ptr(&probe) as *const ();
        if !self.listening.iter().any(|p| Arc::as_ptr(p) as *const () == addr) {
            self.listening.push(probe);
        }
    }

    /// Drop every listener registration made since the last call.
    pub(crate) fn stop_listening(&mut self) {
        let Some(task) = self.task() else {
            self.listening.clear();
            return;
        };
        for probe in self.listening.drain(..) {
            probe.remove_listener(task.id());
        }
    }
}

impl Default for Fiber {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Fiber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fiber")
            .field("cursor", &self.cursor)
            .field("frames", &self.frames.len())
            .field("pause_reason", &self.pause_reason)
            .field("listening", &self.listening.len())
            .finish()
    }
}
