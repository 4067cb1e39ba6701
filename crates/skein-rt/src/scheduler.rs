// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Worker pool driving tasks from a shared run queue.
//!
//! N worker threads pop tasks in FIFO order and run each one until it
//! completes or pauses. A paused task re-enters the queue only when
//! something resumes it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::queue::RunQueue;
use crate::task::Task;
use crate::SchedulerConfig;

/// Something that can run tasks.
pub trait Executor: Send + Sync {
    /// Queue `task` to be run. The task has already been marked running.
    /// Returns `false` if the task was refused and will not run.
    fn schedule(&self, task: Arc<Task>) -> bool;

    fn is_shutdown(&self) -> bool {
        false
    }
}

pub struct Scheduler {
    /// Worker handles for join-on-shutdown.
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    shared: Arc<SharedState>,
}

/// State shared between workers and schedulers of new work.
struct SharedState {
    queue: RunQueue,
    shutdown: AtomicBool,
    worker_count: usize,
}

impl Scheduler {
    /// Start a scheduler with `config.workers` worker threads.
    pub fn new(config: SchedulerConfig) -> Arc<Self> {
        let worker_count = config.worker_count();
        let shared = Arc::new(SharedState {
            queue: RunQueue::new(),
            shutdown: AtomicBool::new(false),
            worker_count,
        });

        let mut handles = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let shared = shared.clone();
            handles.push(
                thread::Builder::new()
                    .name(format!("{}-{}", config.thread_name, id))
                    .spawn(move || worker_loop(id, &shared))
                    .expect("failed to spawn worker thread"),
            );
        }

        info!(workers = worker_count, "scheduler started");
        Arc::new(Self { workers: Mutex::new(handles), shared })
    }

    pub fn with_workers(n: usize) -> Arc<Self> {
        Self::new(SchedulerConfig::with_workers(n))
    }

    pub fn worker_count(&self) -> usize {
        self.shared.worker_count
    }

    /// Tasks waiting for a worker.
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    /// Stop the workers once the run queue is drained and join them.
    ///
    /// Tasks still paused stay paused; nothing resumes them afterwards.
    /// Safe to call from a worker: that worker is not joined and exits
    /// when it returns to its loop.
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.queue.wake_all();

        let current = thread::current().id();
        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            let _ = handle.join();
        }
        info!("scheduler stopped");
    }
}

impl Executor for Scheduler {
    fn schedule(&self, task: Arc<Task>) -> bool {
        let id = task.id();
        if !self.shared.queue.push(task, &self.shared.shutdown) {
            warn!(task = %id, "scheduler is shut down; task refused");
            return false;
        }
        trace!(task = %id, "scheduled");
        true
    }

    fn is_shutdown(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if !self.shared.shutdown.load(Ordering::Acquire) {
            self.shutdown();
        }
    }
}

fn worker_loop(id: usize, shared: &SharedState) {
    debug!(worker = id, "worker started");
    while let Some(task) = shared.queue.pop(&shared.shutdown) {
        task.run();
    }
    debug!(worker = id, "worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{from_fn, Value};
    use std::sync::atomic::AtomicI32;
    use std::task::Poll;

    #[test]
    fn scheduler_spawn_and_shutdown() {
        let sched = Scheduler::with_workers(2);
        let counter = Arc::new(AtomicI32::new(0));

        for _ in 0..10 {
            let c = counter.clone();
            let task = Task::new(from_fn(move |_| {
                c.fetch_add(1, Ordering::Relaxed);
                Poll::Ready(Ok(Value::Unit))
            }));
            task.start(sched.clone()).unwrap();
        }

        sched.shutdown();
        assert_eq!(counter.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn scheduler_default_workers() {
        // 0 picks the core count.
        let sched = Scheduler::new(SchedulerConfig::default());
        assert!(sched.worker_count() >= 1);
        sched.shutdown();
    }

    #[test]
    fn shut_down_scheduler_refuses_new_tasks() {
        let sched = Scheduler::with_workers(1);
        sched.shutdown();
        assert!(sched.is_shutdown());
        let task = Task::new(from_fn(|_| Poll::Ready(Ok(Value::Unit))));
        assert_eq!(task.start(sched.clone()), Err(crate::TaskError::ExecutorShutdown));
        assert!(!sched.schedule(task.clone()));
        assert_eq!(sched.queued(), 0);
        assert_eq!(task.status(), crate::TaskStatus::Created);
    }

    #[test]
    fn yielding_task_is_requeued_until_done() {
        let sched = Scheduler::with_workers(1);
        let mut turns = 0;
        let task = Task::new(from_fn(move |fiber| {
            turns += 1;
            if turns < 5 {
                fiber.yield_now()
            } else {
                Poll::Ready(Ok(Value::Int(turns)))
            }
        }));
        let exit = crate::Mailbox::new();
        task.inform_on_exit(exit.clone());
        task.start(sched.clone()).unwrap();

        let msg = exit.getb_timeout(std::time::Duration::from_secs(5)).unwrap();
        assert_eq!(msg.result, Ok(Value::Int(5)));
        sched.shutdown();
    }
}
