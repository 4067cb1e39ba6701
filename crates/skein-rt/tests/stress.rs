// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Many producers racing one consumer. A lost wakeup shows up as a consumer
//! that never finishes; a double resume as a count that is off.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::Poll;
use std::thread;
use std::time::Duration;

use skein_rt::{from_fn, Mailbox, Scheduler, SchedulerConfig, Task, Value};

const WAIT: Duration = Duration::from_secs(30);

fn consumer(inbox: Mailbox<u64>, expected: u64, runs: Arc<AtomicUsize>) -> Arc<Task> {
    let mut received = 0u64;
    let mut sum = 0u64;
    Task::new(from_fn(move |fiber| {
        runs.fetch_add(1, Ordering::Relaxed);
        while received < expected {
            match inbox.get(fiber) {
                Poll::Ready(n) => {
                    received += 1;
                    sum += n;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
        Poll::Ready(Ok(Value::Int(sum as i64)))
    }))
}

#[test]
fn thread_producers_never_lose_a_wakeup() {
    const PRODUCERS: u64 = 8;
    const EACH: u64 = 2_000;

    let sched = Scheduler::new(SchedulerConfig::with_workers(4));
    for round in 0..5 {
        let inbox = Mailbox::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let task = consumer(inbox.clone(), PRODUCERS * EACH, runs.clone());
        let exit = Mailbox::new();
        task.inform_on_exit(exit.clone());
        task.start(sched.clone()).unwrap();

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let inbox = inbox.clone();
                thread::spawn(move || {
                    for i in 0..EACH {
                        inbox.putb(p * EACH + i);
                        if i % 256 == 0 {
                            thread::yield_now();
                        }
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let n = PRODUCERS * EACH;
        let msg = exit.getb_timeout(WAIT).unwrap_or_else(|| panic!("round {}: consumer stalled", round));
        assert_eq!(msg.result, Ok(Value::Int((n * (n - 1) / 2) as i64)));
        assert!(inbox.is_empty());
        // Each run either makes progress or pauses once; never more runs than messages.
        assert!(runs.load(Ordering::Relaxed) as u64 <= n + 1);
    }
    sched.shutdown();
}

#[test]
fn cooperative_producers_share_a_bounded_mailbox() {
    const PRODUCERS: u64 = 6;
    const EACH: u64 = 500;

    let sched = Scheduler::new(SchedulerConfig::with_workers(4));
    let inbox = Mailbox::bounded(2);
    let runs = Arc::new(AtomicUsize::new(0));
    let task = consumer(inbox.clone(), PRODUCERS * EACH, runs);
    let exit = Mailbox::new();
    task.inform_on_exit(exit.clone());
    task.start(sched.clone()).unwrap();

    for p in 0..PRODUCERS {
        let inbox = inbox.clone();
        let mut sent = 0u64;
        let producer = Task::new(from_fn(move |fiber| {
            while sent < EACH {
                match inbox.put(fiber, p * EACH + sent) {
                    Ok(()) => sent += 1,
                    Err(_) => return Poll::Pending,
                }
            }
            Poll::Ready(Ok(Value::Unit))
        }));
        producer.start(sched.clone()).unwrap();
    }

    let n = PRODUCERS * EACH;
    let msg = exit.getb_timeout(WAIT).expect("consumer stalled");
    assert_eq!(msg.result, Ok(Value::Int((n * (n - 1) / 2) as i64)));
    sched.shutdown();
}
