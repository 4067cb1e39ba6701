// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Runtime primitives called from IR.
//!
//! A suspending primitive that cannot complete pushes a frame for itself
//! (state 1, holding what it needs to retry) and reports `Suspend`. When
//! the task resumes, the frame is re-entered first and the primitive runs
//! again.

use std::task::Poll;
use std::time::Duration;

use skein_ir::{Intrinsic, StateId};

use super::exec::fault;
use super::{Machine, Outcome};
use crate::pause::PauseReason;
use crate::timer::timer_after;
use crate::{Failure, Fiber, Frame, Mailbox, Value};

const RETRY: StateId = StateId(1);

impl Machine {
    pub(super) fn intrinsic(
        &self,
        fiber: &mut Fiber,
        which: Intrinsic,
        args: Vec<Value>,
        resumed: bool,
    ) -> Result<Outcome, Failure> {
        let suspend = |fiber: &mut Fiber, slots: Vec<Value>| -> Result<Outcome, Failure> {
            fiber.unwind(Frame { proc: which.proc_id(), state: RETRY, slots });
            Ok(Outcome::Suspend)
        };

        match which {
            Intrinsic::Print => {
                self.output.push(args.into_iter().next().unwrap_or(Value::Unit));
                Ok(Outcome::Return(Value::Unit))
            }
            Intrinsic::GetNb => {
                let mailbox = mailbox_arg(which, &args)?;
                Ok(Outcome::Return(mailbox.getnb().unwrap_or(Value::Unit)))
            }
            Intrinsic::PutNb => {
                let (mailbox, msg) = mailbox_and_message(which, args)?;
                Ok(Outcome::Return(Value::Bool(mailbox.putnb(msg))))
            }
            Intrinsic::Yield => {
                if resumed {
                    return Ok(Outcome::Return(Value::Unit));
                }
                if let Some(value) = args.into_iter().next() {
                    fiber.offer(value);
                }
                fiber.set_pause_reason(PauseReason::Yielded);
                suspend(fiber, Vec::new())
            }
            Intrinsic::Get => {
                let mailbox = mailbox_arg(which, &args)?;
                match mailbox.get(fiber) {
                    Poll::Ready(msg) => Ok(Outcome::Return(msg)),
                    Poll::Pending => suspend(fiber, args),
                }
            }
            Intrinsic::Put => {
                let (mailbox, msg) = mailbox_and_message(which, args)?;
                match mailbox.put(fiber, msg) {
                    Ok(()) => Ok(Outcome::Return(Value::Unit)),
                    Err(msg) => suspend(fiber, vec![Value::Mailbox(mailbox), msg]),
                }
            }
            Intrinsic::Sleep => {
                // First call gets the duration; the retry frame holds the alarm.
                let alarm = if resumed {
                    mailbox_arg(which, &args)?
                } else {
                    let millis = args.first().and_then(Value::as_int).ok_or_else(|| {
                        fault(format!("{} expects a duration in milliseconds", which.name()))
                    })?;
                    let alarm = Mailbox::bounded(1);
                    let millis = u64::try_from(millis).unwrap_or(0);
                    timer_after(Duration::from_millis(millis), alarm.clone(), Value::Unit);
                    alarm
                };
                match alarm.get(fiber) {
                    Poll::Ready(_) => Ok(Outcome::Return(Value::Unit)),
                    Poll::Pending => suspend(fiber, vec![Value::Mailbox(alarm)]),
                }
            }
            Intrinsic::Exit => {
                let value = args.into_iter().next().unwrap_or(Value::Unit);
                fiber.set_pause_reason(PauseReason::Done(Ok(value)));
                Ok(Outcome::Suspend)
            }
            Intrinsic::ErrorExit => {
                let value = args.into_iter().next().unwrap_or(Value::Unit);
                fiber.set_pause_reason(PauseReason::Done(Err(Failure::Raised(value))));
                Ok(Outcome::Suspend)
            }
        }
    }
}

fn mailbox_arg(which: Intrinsic, args: &[Value]) -> Result<Mailbox<Value>, Failure> {
    args.first()
        .and_then(Value::as_mailbox)
        .cloned()
        .ok_or_else(|| fault(format!("{} expects a mailbox", which.name())))
}

fn mailbox_and_message(
    which: Intrinsic,
    args: Vec<Value>,
) -> Result<(Mailbox<Value>, Value), Failure> {
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(Value::Mailbox(mailbox)), Some(msg)) => Ok((mailbox, msg)),
        _ => Err(fault(format!("{} expects a mailbox and a message", which.name()))),
    }
}
