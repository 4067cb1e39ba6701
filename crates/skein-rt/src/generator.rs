// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Generators: iterate over the values a body yields.
//!
//! The body runs on the caller's thread with a detached fiber. Each
//! [`Fiber::yield_value`] produces one item; completion or exit ends the
//! iteration.

use std::task::Poll;

use tracing::warn;

use crate::pause::PauseReason;
use crate::task::Execute;
use crate::{Fiber, Value};

pub struct Generator<B> {
    body: B,
    fiber: Fiber,
    finished: bool,
}

impl<B: Execute> Generator<B> {
    pub fn new(body: B) -> Self {
        Self { body, fiber: Fiber::new(), finished: false }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl<B: Execute> Iterator for Generator<B> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        while !self.finished {
            match self.body.execute(&mut self.fiber) {
                Poll::Ready(Ok(_)) => self.finished = true,
                Poll::Ready(Err(failure)) => {
                    warn!(%failure, "generator body failed");
                    self.finished = true;
                }
                Poll::Pending => match self.fiber.take_pause_reason() {
                    Some(PauseReason::Yielded) | None => {}
                    Some(PauseReason::Done(_)) => self.finished = true,
                    // Nothing would ever resume us.
                    Some(reason) => {
                        warn!(%reason, "generator paused outside a scheduler");
                        self.finished = true;
                    }
                },
            }
            if let Some(value) = self.fiber.take_offered() {
                return Some(value);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::from_fn;

    #[test]
    fn fibonacci() {
        let (mut a, mut b) = (0i64, 1i64);
        let fib = Generator::new(from_fn(move |fiber| {
            if a > 50 {
                return Poll::Ready(Ok(Value::Unit));
            }
            let next = a;
            (a, b) = (b, a + b);
            fiber.yield_value(Value::Int(next))
        }));
        let values: Vec<i64> = fib.filter_map(|v| v.as_int()).collect();
        assert_eq!(values, vec![0, 1, 1, 2, 3, 5, 8, 13, 21, 34]);
    }

    #[test]
    fn exit_ends_iteration() {
        let mut n = 0;
        let mut numbers = Generator::new(from_fn(move |fiber| {
            n += 1;
            if n == 3 {
                fiber.exit(Value::Unit)
            } else {
                fiber.yield_value(Value::Int(n))
            }
        }));
        assert_eq!(numbers.next(), Some(Value::Int(1)));
        assert_eq!(numbers.next(), Some(Value::Int(2)));
        assert_eq!(numbers.next(), None);
        assert!(numbers.is_finished());
    }
}
