// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Timers.
//!
//! One process-wide timer thread keeps pending deadlines in a min-heap and
//! fires each one when it passes. A sleeping task waits on a private mailbox
//! the timer fills, so neither its worker nor a thread of its own is held in
//! the meantime.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::OnceLock;
use std::task::Poll;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::{Fiber, Mailbox};

const TIMER_THREAD: &str = "skein-timer";

type Action = Box<dyn FnOnce() + Send>;

struct TimerEntry {
    deadline: Instant,
    /// Insertion order, so equal deadlines fire first-come first-served.
    generation: u64,
    fire: Action,
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the earliest deadline.
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimerEntry {}

#[derive(Default)]
struct TimerHeap {
    heap: BinaryHeap<TimerEntry>,
    next_generation: u64,
}

impl TimerHeap {
    fn insert(&mut self, deadline: Instant, fire: Action) {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.heap.push(TimerEntry { deadline, generation, fire });
    }

    fn peek_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|e| e.deadline)
    }

    /// Remove every entry whose deadline is at or before `now`, earliest first.
    fn pop_expired(&mut self, now: Instant) -> Vec<Action> {
        let mut expired = Vec::new();
        while self.peek_deadline().is_some_and(|d| d <= now) {
            if let Some(entry) = self.heap.pop() {
                expired.push(entry.fire);
            }
        }
        expired
    }
}

struct Timer {
    pending: Mutex<TimerHeap>,
    changed: Condvar,
}

impl Timer {
    /// The process-wide timer, started on first use.
    fn global() -> &'static Timer {
        static TIMER: OnceLock<Timer> = OnceLock::new();
        TIMER.get_or_init(|| {
            thread::Builder::new()
                .name(TIMER_THREAD.to_string())
                .spawn(|| Timer::global().run())
                .expect("failed to spawn timer thread");
            debug!("timer thread started");
            Timer { pending: Mutex::new(TimerHeap::default()), changed: Condvar::new() }
        })
    }

    fn schedule(&self, deadline: Instant, fire: Action) {
        let mut pending = self.pending.lock();
        let earliest = pending.peek_deadline().map_or(true, |d| deadline < d);
        pending.insert(deadline, fire);
        if earliest {
            self.changed.notify_one();
        }
    }

    fn run(&self) {
        let mut pending = self.pending.lock();
        loop {
            let expired = pending.pop_expired(Instant::now());
            if !expired.is_empty() {
                trace!(count = expired.len(), "timers fired");
                // Actions resume tasks; never run them with the heap locked.
                MutexGuard::unlocked(&mut pending, || expired.into_iter().for_each(|fire| fire()));
                continue;
            }
            match pending.peek_deadline() {
                Some(deadline) => {
                    self.changed.wait_until(&mut pending, deadline);
                }
                None => self.changed.wait(&mut pending),
            }
        }
    }
}

/// Put `msg` into `mailbox` after `duration`.
pub fn timer_after<T: Send + 'static>(duration: Duration, mailbox: Mailbox<T>, msg: T) {
    let deadline = Instant::now() + duration;
    Timer::global().schedule(
        deadline,
        Box::new(move || {
            let _ = mailbox.putnb(msg);
        }),
    );
}

/// Cooperative sleep. Poll it until it is ready; the timer starts on the
/// first poll.
pub struct Sleep {
    duration: Duration,
    alarm: Option<Mailbox<()>>,
}

impl Sleep {
    pub fn new(duration: Duration) -> Self {
        Self { duration, alarm: None }
    }

    pub fn poll(&mut self, fiber: &mut Fiber) -> Poll<()> {
        let duration = self.duration;
        let alarm = self.alarm.get_or_insert_with(|| {
            let alarm = Mailbox::bounded(1);
            timer_after(duration, alarm.clone(), ());
            alarm
        });
        let poll = alarm.get(fiber);
        if poll.is_ready() {
            self.alarm = None;
        }
        poll
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{from_fn, Scheduler, Task, Value};

    #[test]
    fn timer_after_fires() {
        let mb = Mailbox::new();
        timer_after(Duration::from_millis(10), mb.clone(), 7);
        assert_eq!(mb.getb_timeout(Duration::from_secs(5)), Some(7));
    }

    #[test]
    fn heap_pops_earliest_first() {
        let base = Instant::now();
        let order = std::sync::Arc::new(Mutex::new(Vec::new()));
        let mut heap = TimerHeap::default();
        for (ms, tag) in [(100, "b"), (50, "a"), (150, "c"), (100, "b2")] {
            let order = order.clone();
            heap.insert(base + Duration::from_millis(ms), Box::new(move || order.lock().push(tag)));
        }

        let expired = heap.pop_expired(base + Duration::from_millis(100));
        assert_eq!(expired.len(), 3);
        expired.into_iter().for_each(|fire| fire());
        assert_eq!(*order.lock(), vec!["a", "b", "b2"]);
        assert_eq!(heap.peek_deadline(), Some(base + Duration::from_millis(150)));
    }

    #[test]
    fn all_timers_share_one_thread() {
        let mb = Mailbox::new();
        for ms in [30u64, 5, 20, 10] {
            let mb = mb.clone();
            Timer::global().schedule(
                Instant::now() + Duration::from_millis(ms),
                Box::new(move || {
                    let current = thread::current();
                    mb.putnb((ms, current.id(), current.name().map(str::to_string)));
                }),
            );
        }

        let fired: Vec<_> = (0..4).filter_map(|_| mb.getb_timeout(Duration::from_secs(5))).collect();
        assert_eq!(fired.iter().map(|f| f.0).collect::<Vec<_>>(), vec![5, 10, 20, 30]);
        assert!(fired.iter().all(|f| f.1 == fired[0].1));
        assert!(fired.iter().all(|f| f.2.as_deref() == Some(TIMER_THREAD)));
    }

    #[test]
    fn sleeping_task_resumes_after_duration() {
        let sched = Scheduler::with_workers(1);
        let started = Instant::now();
        let mut sleep = Sleep::new(Duration::from_millis(30));
        let task = Task::new(from_fn(move |fiber| match sleep.poll(fiber) {
            Poll::Ready(()) => Poll::Ready(Ok(Value::Unit)),
            Poll::Pending => Poll::Pending,
        }));
        let exit = Mailbox::new();
        task.inform_on_exit(exit.clone());
        task.start(sched.clone()).unwrap();

        assert!(exit.getb_timeout(Duration::from_secs(5)).is_some());
        assert!(started.elapsed() >= Duration::from_millis(30));
        sched.shutdown();
    }
}
