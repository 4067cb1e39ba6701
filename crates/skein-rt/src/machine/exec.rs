// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Procedure activation: the block walk, statements, and terminators.

use skein_ir::{
    Block, BlockId, FunctionRef, Intrinsic, LocalId, Operand, ProcId, Procedure, RValue, StateId,
    Stmt, Terminator,
};

use super::{Machine, Outcome};
use crate::{Failure, Fiber, Frame, Value};

/// What stops straight-line execution of a block.
pub(super) enum Interrupt {
    /// An IR exception, catchable by the block's handler.
    Raise(Value),
    Fault(Failure),
}

impl From<Failure> for Interrupt {
    fn from(failure: Failure) -> Self {
        Interrupt::Fault(failure)
    }
}

pub(super) fn fault(message: impl Into<String>) -> Failure {
    Failure::Fault(message.into())
}

/// Values saved by a suspension, waiting to be restored.
struct Resumed {
    state: StateId,
    slots: Option<Vec<Value>>,
    completion: Option<Outcome>,
}

struct Activation<'p> {
    proc: &'p Procedure,
    locals: Vec<Value>,
    resumed: Option<Resumed>,
}

impl<'p> Activation<'p> {
    fn fresh(proc: &'p Procedure, args: Vec<Value>) -> Result<Self, Failure> {
        if args.len() != proc.params.len() {
            return Err(fault(format!(
                "{} takes {} arguments, got {}",
                proc.id,
                proc.params.len(),
                args.len()
            )));
        }
        let mut act = Self { proc, locals: vec![Value::Unit; proc.locals.len()], resumed: None };
        for (param, arg) in proc.params.iter().zip(args) {
            act.set(param.id, arg)?;
        }
        Ok(act)
    }

    fn resumed(proc: &'p Procedure, frame: Frame, completion: Outcome) -> Self {
        Self {
            proc,
            locals: vec![Value::Unit; proc.locals.len()],
            resumed: Some(Resumed {
                state: frame.state,
                slots: Some(frame.slots),
                completion: Some(completion),
            }),
        }
    }

    fn get(&self, local: LocalId) -> Result<Value, Failure> {
        self.locals
            .get(local.0 as usize)
            .cloned()
            .ok_or_else(|| fault(format!("{} has no local {}", self.proc.id, local)))
    }

    fn set(&mut self, local: LocalId, value: Value) -> Result<(), Failure> {
        match self.locals.get_mut(local.0 as usize) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(fault(format!("{} has no local {}", self.proc.id, local))),
        }
    }

    fn eval(&self, operand: &Operand) -> Result<Value, Failure> {
        match operand {
            Operand::Local(id) => self.get(*id),
            Operand::Constant(c) => Ok(Value::from(c)),
        }
    }

    fn eval_all(&self, operands: &[Operand]) -> Result<Vec<Value>, Failure> {
        operands.iter().map(|op| self.eval(op)).collect()
    }

    fn save(&self, locals: &[LocalId]) -> Result<Vec<Value>, Failure> {
        locals.iter().map(|l| self.get(*l)).collect()
    }
}

impl Machine {
    pub(super) fn invoke(
        &self,
        fiber: &mut Fiber,
        id: &ProcId,
        args: Vec<Value>,
    ) -> Result<Outcome, Failure> {
        if let Some(which) = Intrinsic::from_proc(id) {
            return self.intrinsic(fiber, which, args, false);
        }
        let proc = self.lookup(id)?;
        if !proc.has_body() {
            return Err(fault(format!("{} has no body", id)));
        }
        self.run(fiber, Activation::fresh(proc, args)?)
    }

    pub(super) fn reenter(
        &self,
        fiber: &mut Fiber,
        frame: Frame,
        completion: Outcome,
    ) -> Result<Outcome, Failure> {
        if let Some(which) = Intrinsic::from_proc(&frame.proc) {
            return self.intrinsic(fiber, which, frame.slots, true);
        }
        let proc = self.lookup(&frame.proc)?;
        if !proc.attrs.woven {
            return Err(fault(format!("cannot resume {}: it is not woven", proc.id)));
        }
        self.run(fiber, Activation::resumed(proc, frame, completion))
    }

    fn lookup(&self, id: &ProcId) -> Result<&Procedure, Failure> {
        self.program.procedure(id).ok_or_else(|| fault(format!("unknown procedure {}", id)))
    }

    fn call_ref(
        &self,
        fiber: &mut Fiber,
        func: &FunctionRef,
        args: Vec<Value>,
    ) -> Result<Outcome, Failure> {
        // Values carry no runtime type, so virtual calls go to the named target.
        self.invoke(fiber, &func.target, args)
    }

    fn run(&self, fiber: &mut Fiber, mut act: Activation<'_>) -> Result<Outcome, Failure> {
        let proc = act.proc;
        let mut current = proc.entry_block;

        loop {
            let block = proc
                .block(current)
                .ok_or_else(|| fault(format!("{} has no block {}", proc.id, current)))?;

            let interrupt = match self.run_statements(fiber, &mut act, block) {
                Ok(()) => match self.run_terminator(fiber, &mut act, block)? {
                    Step::Goto(next) => {
                        current = next;
                        continue;
                    }
                    Step::Done(outcome) => return Ok(outcome),
                    Step::Raise(value) => Interrupt::Raise(value),
                },
                Err(interrupt) => interrupt,
            };

            match interrupt {
                Interrupt::Fault(failure) => return Err(failure),
                Interrupt::Raise(exception) => match block.handler {
                    Some(handler) => {
                        act.set(handler.bind, exception)?;
                        current = handler.target;
                    }
                    None => return Ok(Outcome::Throw(exception)),
                },
            }
        }
    }

    fn run_statements(
        &self,
        fiber: &mut Fiber,
        act: &mut Activation<'_>,
        block: &Block,
    ) -> Result<(), Interrupt> {
        for stmt in &block.statements {
            match stmt {
                Stmt::Assign { dst, rvalue } => {
                    let value = self.eval_rvalue(act, rvalue)?;
                    act.set(*dst, value)?;
                }
                Stmt::Call { dst, func, args } => {
                    let args = act.eval_all(args)?;
                    match self.call_ref(fiber, func, args)? {
                        Outcome::Return(value) => {
                            if let Some(dst) = dst {
                                act.set(*dst, value)?;
                            }
                        }
                        Outcome::Throw(exception) => return Err(Interrupt::Raise(exception)),
                        Outcome::Suspend => {
                            return Err(fault(format!(
                                "{} suspended inside {}, which is not a suspension point",
                                func.target, act.proc.id
                            ))
                            .into())
                        }
                    }
                }
                Stmt::Restore { slots } => {
                    let saved = act
                        .resumed
                        .as_mut()
                        .and_then(|r| r.slots.take())
                        .ok_or_else(|| fault(format!("{} restores outside a resume", act.proc.id)))?;
                    if saved.len() != slots.len() {
                        return Err(fault(format!(
                            "{} restores {} slots from a frame holding {}",
                            act.proc.id,
                            slots.len(),
                            saved.len()
                        ))
                        .into());
                    }
                    for (local, value) in slots.iter().zip(saved) {
                        act.set(*local, value)?;
                    }
                }
                Stmt::Resume { dst } => {
                    let completion = act.resumed.as_mut().and_then(|r| r.completion.take());
                    match completion {
                        Some(Outcome::Return(value)) => {
                            if let Some(dst) = dst {
                                act.set(*dst, value)?;
                            }
                        }
                        Some(Outcome::Throw(exception)) => return Err(Interrupt::Raise(exception)),
                        Some(Outcome::Suspend) | None => {
                            return Err(fault(format!("{} resumed twice", act.proc.id)).into())
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn eval_rvalue(&self, act: &Activation<'_>, rvalue: &RValue) -> Result<Value, Interrupt> {
        match rvalue {
            RValue::Use(op) => Ok(act.eval(op)?),
            RValue::BinaryOp { op, left, right } => {
                self.eval_binop(*op, act.eval(left)?, act.eval(right)?)
            }
            RValue::UnaryOp { op, operand } => self.eval_unop(*op, act.eval(operand)?),
        }
    }

    fn run_terminator(
        &self,
        fiber: &mut Fiber,
        act: &mut Activation<'_>,
        block: &Block,
    ) -> Result<Step, Failure> {
        let proc = act.proc;
        let step = match &block.terminator {
            Terminator::Return { value } => {
                let value = match value {
                    Some(op) => act.eval(op)?,
                    None => Value::Unit,
                };
                Step::Done(Outcome::Return(value))
            }
            Terminator::Goto { target } => Step::Goto(*target),
            Terminator::Branch { cond, then_block, else_block } => match act.eval(cond)? {
                Value::Bool(true) => Step::Goto(*then_block),
                Value::Bool(false) => Step::Goto(*else_block),
                other => {
                    return Err(fault(format!("branch on {} in {}", other.type_name(), proc.id)))
                }
            },
            Terminator::Switch { value, cases, default } => {
                let value = act.eval(value)?;
                let Some(n) = value.as_int() else {
                    return Err(fault(format!("switch on {} in {}", value.type_name(), proc.id)));
                };
                let target = cases.iter().find(|(case, _)| *case == n).map(|(_, b)| *b);
                Step::Goto(target.unwrap_or(*default))
            }
            Terminator::Throw { value } => Step::Raise(act.eval(value)?),
            Terminator::Unreachable => {
                return Err(fault(format!("{} reached unreachable code in {}", proc.id, block.id)))
            }
            Terminator::Dispatch { fresh, states } => match &act.resumed {
                None => Step::Goto(*fresh),
                Some(resumed) => {
                    let target = states.iter().find(|(s, _)| *s == resumed.state).map(|(_, b)| *b);
                    match target {
                        Some(target) => Step::Goto(target),
                        None => {
                            return Err(fault(format!(
                                "{} has no resumption state {}",
                                proc.id, resumed.state
                            )))
                        }
                    }
                }
            },
            Terminator::SuspendCall { dst, func, args, state, save, next } => {
                let args = act.eval_all(args)?;
                match self.call_ref(fiber, func, args)? {
                    Outcome::Return(value) => {
                        if let Some(dst) = dst {
                            act.set(*dst, value)?;
                        }
                        Step::Goto(*next)
                    }
                    Outcome::Throw(exception) => Step::Raise(exception),
                    Outcome::Suspend => {
                        fiber.unwind(Frame {
                            proc: proc.id.clone(),
                            state: *state,
                            slots: act.save(save)?,
                        });
                        Step::Done(Outcome::Suspend)
                    }
                }
            }
        };
        Ok(step)
    }
}

enum Step {
    Goto(BlockId),
    Done(Outcome),
    Raise(Value),
}
