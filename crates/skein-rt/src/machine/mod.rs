// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Executes woven IR.
//!
//! A [`Machine`] is a task body: the first drive calls the entry procedure,
//! later drives rewind the fiber's frames and re-enter each woven procedure
//! at its recorded state. Calls nest on the host stack; a suspension returns
//! [`Outcome::Suspend`] all the way out, each woven caller pushing its frame
//! on the way.

mod exec;
mod intrinsics;
mod operators;

use std::collections::HashMap;
use std::sync::Arc;
use std::task::Poll;

use parking_lot::Mutex;
use skein_ir::{ProcId, Procedure};
use tracing::debug;

use crate::task::Execute;
use crate::{Failure, Fiber, Value};

/// Loaded procedures, by id.
#[derive(Debug, Default)]
pub struct Program {
    procedures: HashMap<ProcId, Procedure>,
}

impl Program {
    pub fn new(procedures: impl IntoIterator<Item = Procedure>) -> Self {
        Self { procedures: procedures.into_iter().map(|p| (p.id.clone(), p)).collect() }
    }

    pub fn procedure(&self, id: &ProcId) -> Option<&Procedure> {
        self.procedures.get(id)
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}

/// Values printed by a machine. Cloning shares the buffer.
#[derive(Debug, Clone, Default)]
pub struct Output(Arc<Mutex<Vec<Value>>>);

impl Output {
    pub fn values(&self) -> Vec<Value> {
        self.0.lock().clone()
    }

    /// Everything printed, concatenated.
    pub fn text(&self) -> String {
        self.0.lock().iter().map(|v| v.to_string()).collect()
    }

    fn push(&self, value: Value) {
        self.0.lock().push(value);
    }
}

/// How a call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Return(Value),
    Throw(Value),
    /// The callee suspended; its frames are on the fiber.
    Suspend,
}

pub struct Machine {
    program: Arc<Program>,
    entry: ProcId,
    args: Option<Vec<Value>>,
    output: Output,
}

impl Machine {
    pub fn new(program: Arc<Program>, entry: ProcId, args: Vec<Value>) -> Self {
        Self { program, entry, args: Some(args), output: Output::default() }
    }

    /// Print into `output` instead of a private buffer.
    pub fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    pub fn output(&self) -> Output {
        self.output.clone()
    }

    /// Call `id` from scratch.
    pub fn call(&self, fiber: &mut Fiber, id: &ProcId, args: Vec<Value>) -> Result<Outcome, Failure> {
        self.invoke(fiber, id, args)
    }

    /// Continue after a suspension: re-enter the saved frames innermost
    /// first, passing each completion to the next frame out.
    pub fn resume(&self, fiber: &mut Fiber) -> Result<Outcome, Failure> {
        let frames = fiber.rewind();
        debug!(frames = frames.len(), "rewinding");

        let mut completion = Outcome::Return(Value::Unit);
        let mut frames = frames.into_iter();
        while let Some(frame) = frames.next() {
            completion = self.reenter(fiber, frame, completion)?;
            if completion == Outcome::Suspend {
                fiber.unwind_rest(frames);
                return Ok(Outcome::Suspend);
            }
        }
        fiber.settle();
        Ok(completion)
    }
}

impl Execute for Machine {
    fn execute(&mut self, fiber: &mut Fiber) -> Poll<Result<Value, Failure>> {
        let outcome = if fiber.is_suspended() {
            self.resume(fiber)
        } else if let Some(args) = self.args.take() {
            let entry = self.entry.clone();
            self.invoke(fiber, &entry, args)
        } else {
            Err(Failure::Fault(format!("{} driven again after it finished", self.entry)))
        };

        match outcome {
            Ok(Outcome::Return(value)) => Poll::Ready(Ok(value)),
            Ok(Outcome::Throw(exception)) => Poll::Ready(Err(Failure::Raised(exception))),
            Ok(Outcome::Suspend) => Poll::Pending,
            Err(failure) => Poll::Ready(Err(failure)),
        }
    }
}
