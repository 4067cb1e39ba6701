// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Woven procedures compute what the original procedures compute.
//!
//! Each program is built twice: once with `yield()` calls sprinkled in, once
//! without. The plain build runs unwoven; the yielding build is woven and
//! driven through every suspension. Results must match.

mod common;

use skein_ir::{
    BinOp, BlockBuilder, FunctionRef, Intrinsic, Operand, ProcId, Procedure, RValue, Terminator, Ty,
};
use skein_rt::{Failure, Value};

use common::{drive, plain, woven};

fn pid(name: &str) -> ProcId {
    ProcId::new("app.Calc", name, "(int)->any")
}

fn maybe_yield(b: &mut BlockBuilder, yields: bool) {
    if yields {
        b.call(None, FunctionRef::intrinsic(Intrinsic::Yield), vec![]);
    }
}

fn assert_same(procs: fn(bool) -> Vec<Procedure>, entry: &str, arg: i64, expected: Result<Value, Failure>) {
    let (original, none) = drive(plain(procs(false)), pid(entry), vec![Value::Int(arg)]);
    assert_eq!(none, 0);
    assert_eq!(original, expected, "original {}({})", entry, arg);

    let (transformed, suspensions) = drive(woven(procs(true)), pid(entry), vec![Value::Int(arg)]);
    assert!(suspensions > 0, "{}({}) never suspended", entry, arg);
    assert_eq!(transformed, expected, "woven {}({})", entry, arg);
}

/// sum(n) { i = 0; acc = 0; while i < n { acc = acc + i; yield(); i = i + 1 } return acc }
fn sum(yields: bool) -> Vec<Procedure> {
    let mut b = BlockBuilder::new(pid("sum"), Ty::Int);
    let n = b.add_param("n", Ty::Int);
    let i = b.alloc_local("i", Ty::Int);
    let acc = b.alloc_local("acc", Ty::Int);
    let cond = b.alloc_temp(Ty::Bool);
    let head = b.create_block();
    let body = b.create_block();
    let exit = b.create_block();

    b.assign(i, RValue::Use(Operand::int(0)));
    b.assign(acc, RValue::Use(Operand::int(0)));
    b.terminate(Terminator::Goto { target: head });

    b.switch_to_block(head);
    b.assign(cond, RValue::BinaryOp { op: BinOp::Lt, left: i.into(), right: n.into() });
    b.terminate(Terminator::Branch { cond: cond.into(), then_block: body, else_block: exit });

    b.switch_to_block(body);
    b.assign(acc, RValue::BinaryOp { op: BinOp::Add, left: acc.into(), right: i.into() });
    maybe_yield(&mut b, yields);
    b.assign(i, RValue::BinaryOp { op: BinOp::Add, left: i.into(), right: Operand::int(1) });
    b.terminate(Terminator::Goto { target: head });

    b.switch_to_block(exit);
    b.terminate(Terminator::Return { value: Some(acc.into()) });
    vec![b.finish()]
}

/// sign(x) { if x < 0 { yield(); return -1 } yield(); return x * 2 }
fn early_return(yields: bool) -> Vec<Procedure> {
    let mut b = BlockBuilder::new(pid("sign"), Ty::Int);
    let x = b.add_param("x", Ty::Int);
    let neg = b.alloc_temp(Ty::Bool);
    let out = b.alloc_temp(Ty::Int);
    let early = b.create_block();
    let late = b.create_block();

    b.assign(neg, RValue::BinaryOp { op: BinOp::Lt, left: x.into(), right: Operand::int(0) });
    b.terminate(Terminator::Branch { cond: neg.into(), then_block: early, else_block: late });

    b.switch_to_block(early);
    maybe_yield(&mut b, yields);
    b.terminate(Terminator::Return { value: Some(Operand::int(-1)) });

    b.switch_to_block(late);
    maybe_yield(&mut b, yields);
    b.assign(out, RValue::BinaryOp { op: BinOp::Mul, left: x.into(), right: Operand::int(2) });
    b.terminate(Terminator::Return { value: Some(out.into()) });
    vec![b.finish()]
}

/// ratio(x) {
///     try { yield(); q = 10 / x } catch e { yield(); return "caught: " ++ e }
///     return q
/// }
fn caught(yields: bool) -> Vec<Procedure> {
    let mut b = BlockBuilder::new(pid("ratio"), Ty::Any);
    let x = b.add_param("x", Ty::Int);
    let q = b.alloc_local("q", Ty::Int);
    let e = b.alloc_local("e", Ty::Any);
    let msg = b.alloc_temp(Ty::Str);
    let ok = b.create_block();
    let catch = b.create_block();

    b.set_handler(catch, e);
    maybe_yield(&mut b, yields);
    b.assign(q, RValue::BinaryOp { op: BinOp::Div, left: Operand::int(10), right: x.into() });
    b.terminate(Terminator::Goto { target: ok });

    b.switch_to_block(ok);
    b.terminate(Terminator::Return { value: Some(q.into()) });

    b.switch_to_block(catch);
    maybe_yield(&mut b, yields);
    b.assign(msg, RValue::BinaryOp { op: BinOp::Concat, left: Operand::str("caught: "), right: e.into() });
    b.terminate(Terminator::Return { value: Some(msg.into()) });
    vec![b.finish()]
}

/// check(x) { yield(); if x == 0 { throw "zero" } return x }
/// guard(x) { try { r = check(x) } catch e { return e ++ "!" } return r + 1 }
/// bare(x)  { return check(x) }
fn propagated(yields: bool) -> Vec<Procedure> {
    let mut check = BlockBuilder::new(pid("check"), Ty::Int);
    let x = check.add_param("x", Ty::Int);
    let zero = check.alloc_temp(Ty::Bool);
    let throw = check.create_block();
    let fine = check.create_block();
    maybe_yield(&mut check, yields);
    check.assign(zero, RValue::BinaryOp { op: BinOp::Eq, left: x.into(), right: Operand::int(0) });
    check.terminate(Terminator::Branch { cond: zero.into(), then_block: throw, else_block: fine });
    check.switch_to_block(throw);
    check.terminate(Terminator::Throw { value: Operand::str("zero") });
    check.switch_to_block(fine);
    check.terminate(Terminator::Return { value: Some(x.into()) });

    let mut guard = BlockBuilder::new(pid("guard"), Ty::Any);
    let x = guard.add_param("x", Ty::Int);
    let r = guard.alloc_local("r", Ty::Int);
    let e = guard.alloc_local("e", Ty::Any);
    let t = guard.alloc_temp(Ty::Any);
    let ok = guard.create_block();
    let catch = guard.create_block();
    guard.set_handler(catch, e);
    guard.call(Some(r), FunctionRef::direct(pid("check")), vec![x.into()]);
    guard.terminate(Terminator::Goto { target: ok });
    guard.switch_to_block(ok);
    guard.assign(t, RValue::BinaryOp { op: BinOp::Add, left: r.into(), right: Operand::int(1) });
    guard.terminate(Terminator::Return { value: Some(t.into()) });
    guard.switch_to_block(catch);
    guard.assign(t, RValue::BinaryOp { op: BinOp::Concat, left: e.into(), right: Operand::str("!") });
    guard.terminate(Terminator::Return { value: Some(t.into()) });

    let mut bare = BlockBuilder::new(pid("bare"), Ty::Int);
    let x = bare.add_param("x", Ty::Int);
    let r = bare.alloc_temp(Ty::Int);
    bare.call(Some(r), FunctionRef::direct(pid("check")), vec![x.into()]);
    bare.terminate(Terminator::Return { value: Some(r.into()) });

    vec![check.finish(), guard.finish(), bare.finish()]
}

#[test]
fn loop_with_suspension_in_body() {
    assert_same(sum, "sum", 5, Ok(Value::Int(10)));
    assert_same(sum, "sum", 1, Ok(Value::Int(0)));
}

#[test]
fn early_return_on_either_path() {
    assert_same(early_return, "sign", -3, Ok(Value::Int(-1)));
    assert_same(early_return, "sign", 4, Ok(Value::Int(8)));
}

#[test]
fn exception_caught_in_same_procedure() {
    assert_same(caught, "ratio", 2, Ok(Value::Int(5)));
    assert_same(caught, "ratio", 0, Ok(Value::from("caught: division by zero")));
}

#[test]
fn exception_raised_after_resume_reaches_callers_handler() {
    assert_same(propagated, "guard", 3, Ok(Value::Int(4)));
    assert_same(propagated, "guard", 0, Ok(Value::from("zero!")));
}

#[test]
fn uncaught_exception_fails_the_drive() {
    assert_same(propagated, "bare", 7, Ok(Value::Int(7)));
    assert_same(propagated, "bare", 0, Err(Failure::Raised(Value::from("zero"))));
}

#[test]
fn suspension_count_matches_yields() {
    let (result, suspensions) = drive(woven(sum(true)), pid("sum"), vec![Value::Int(4)]);
    assert_eq!(result, Ok(Value::Int(6)));
    assert_eq!(suspensions, 4);
}
