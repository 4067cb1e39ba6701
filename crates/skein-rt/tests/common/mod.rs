// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Helpers shared by the runtime scenarios.

#![allow(dead_code)]

use std::sync::Arc;
use std::task::Poll;

use skein_ir::{CompilationUnit, ProcId, Procedure};
use skein_rt::{Execute, Failure, Fiber, Machine, Program, Value};
use skein_weave::Weaver;

pub fn id(name: &str) -> ProcId {
    ProcId::new("app.Main", name, "()")
}

/// Weave `procs` and load the result.
pub fn woven(procs: Vec<Procedure>) -> Arc<Program> {
    let unit = procs.into_iter().fold(CompilationUnit::new("app"), |u, p| u.with_procedure(p));
    let woven = Weaver::new(&()).weave(unit);
    assert!(woven.failures.is_empty(), "weaving failed: {:?}", woven.failures);
    Arc::new(Program::new(woven.procedures))
}

/// Load `procs` as they are.
pub fn plain(procs: Vec<Procedure>) -> Arc<Program> {
    Arc::new(Program::new(procs))
}

/// Drive a machine on the current thread until it finishes. Returns the
/// result and how many times it suspended.
pub fn drive(program: Arc<Program>, entry: ProcId, args: Vec<Value>) -> (Result<Value, Failure>, usize) {
    let mut machine = Machine::new(program, entry, args);
    let mut fiber = Fiber::new();
    let mut suspensions = 0;
    loop {
        match machine.execute(&mut fiber) {
            Poll::Ready(result) => return (result, suspensions),
            Poll::Pending => suspensions += 1,
        }
    }
}
