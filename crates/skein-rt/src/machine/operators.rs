// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Binary and unary operators.

use skein_ir::{BinOp, UnaryOp};

use super::exec::{fault, Interrupt};
use super::Machine;
use crate::Value;

fn raise(message: &str) -> Interrupt {
    Interrupt::Raise(Value::str(message))
}

impl Machine {
    pub(super) fn eval_binop(&self, op: BinOp, l: Value, r: Value) -> Result<Value, Interrupt> {
        let int = |v: Option<i64>| v.map(Value::Int).ok_or_else(|| raise("integer overflow"));
        match (op, &l, &r) {
            (BinOp::Add, Value::Int(a), Value::Int(b)) => int(a.checked_add(*b)),
            (BinOp::Sub, Value::Int(a), Value::Int(b)) => int(a.checked_sub(*b)),
            (BinOp::Mul, Value::Int(a), Value::Int(b)) => int(a.checked_mul(*b)),
            (BinOp::Div | BinOp::Mod, Value::Int(_), Value::Int(0)) => Err(raise("division by zero")),
            (BinOp::Div, Value::Int(a), Value::Int(b)) => int(a.checked_div(*b)),
            (BinOp::Mod, Value::Int(a), Value::Int(b)) => int(a.checked_rem(*b)),
            (BinOp::Eq, _, _) => Ok(Value::Bool(l == r)),
            (BinOp::Ne, _, _) => Ok(Value::Bool(l != r)),
            (BinOp::Lt, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a < b)),
            (BinOp::Gt, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a > b)),
            (BinOp::Le, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a <= b)),
            (BinOp::Ge, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a >= b)),
            (BinOp::Lt, Value::Str(a), Value::Str(b)) => Ok(Value::Bool(a < b)),
            (BinOp::Gt, Value::Str(a), Value::Str(b)) => Ok(Value::Bool(a > b)),
            (BinOp::And, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a && *b)),
            (BinOp::Or, Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a || *b)),
            (BinOp::Concat, _, _) => Ok(Value::from(format!("{}{}", l, r))),
            _ => Err(fault(format!(
                "unsupported binary op {:?} on {} and {}",
                op,
                l.type_name(),
                r.type_name()
            ))
            .into()),
        }
    }

    pub(super) fn eval_unop(&self, op: UnaryOp, v: Value) -> Result<Value, Interrupt> {
        match (op, &v) {
            (UnaryOp::Neg, Value::Int(n)) => {
                n.checked_neg().map(Value::Int).ok_or_else(|| raise("integer overflow"))
            }
            (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            _ => Err(fault(format!("unsupported unary op {:?} on {}", op, v.type_name())).into()),
        }
    }
}
