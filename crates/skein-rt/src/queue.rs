// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Shared FIFO run queue.
//!
//! All workers pop from one queue; there is no per-worker affinity. A worker
//! with nothing to do sleeps on the condition variable until a task is
//! pushed or shutdown is requested.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::task::Task;

pub(crate) struct RunQueue {
    tasks: Mutex<VecDeque<Arc<Task>>>,
    available: Condvar,
}

impl RunQueue {
    pub fn new() -> Self {
        Self { tasks: Mutex::new(VecDeque::new()), available: Condvar::new() }
    }

    /// Queue `task` unless `shutdown` is set. Checked under the lock, so a
    /// task accepted here is always popped by some worker before it exits.
    pub fn push(&self, task: Arc<Task>, shutdown: &AtomicBool) -> bool {
        let mut tasks = self.tasks.lock();
        if shutdown.load(Ordering::Acquire) {
            return false;
        }
        tasks.push_back(task);
        drop(tasks);
        self.available.notify_one();
        true
    }

    /// Block until a task is available. Returns `None` once `shutdown` is set
    /// and the queue has been drained.
    pub fn pop(&self, shutdown: &AtomicBool) -> Option<Arc<Task>> {
        let mut tasks = self.tasks.lock();
        loop {
            if let Some(task) = tasks.pop_front() {
                return Some(task);
            }
            if shutdown.load(Ordering::Acquire) {
                return None;
            }
            self.available.wait(&mut tasks);
        }
    }

    /// Wake every sleeping worker. Takes the lock so a worker between its
    /// shutdown check and its wait cannot miss the notification.
    pub fn wake_all(&self) {
        let _tasks = self.tasks.lock();
        self.available.notify_all();
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }
}
