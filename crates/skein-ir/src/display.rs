// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Display implementations for IR types.

use crate::*;
use std::fmt;

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Void => write!(f, "void"),
            Ty::Bool => write!(f, "bool"),
            Ty::Int => write!(f, "int"),
            Ty::Str => write!(f, "string"),
            Ty::Mailbox => write!(f, "mailbox"),
            Ty::Any => write!(f, "any"),
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_{}", self.0)
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl fmt::Display for ProcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.signature)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Local(id) => write!(f, "_{}", id.0),
            Operand::Constant(c) => write!(f, "{}", c),
        }
    }
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Const::Unit => write!(f, "()"),
            Const::Int(v) => write!(f, "{}", v),
            Const::Bool(v) => write!(f, "{}", v),
            Const::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sym = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Concat => "++",
        };
        write!(f, "{}", sym)
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sym = match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        };
        write!(f, "{}", sym)
    }
}

impl fmt::Display for RValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RValue::Use(op) => write!(f, "{}", op),
            RValue::BinaryOp { op, left, right } => {
                write!(f, "{} {} {}", left, op, right)
            }
            RValue::UnaryOp { op, operand } => {
                write!(f, "{}{}", op, operand)
            }
        }
    }
}

fn write_call(
    f: &mut fmt::Formatter<'_>,
    dst: &Option<LocalId>,
    func: &FunctionRef,
    args: &[Operand],
) -> fmt::Result {
    if let Some(d) = dst {
        write!(f, "_{} = ", d.0)?;
    }
    if func.kind == CallKind::Virtual {
        write!(f, "virtual ")?;
    }
    write!(f, "{}.{}(", func.target.owner, func.target.name)?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 { write!(f, ", ")?; }
        write!(f, "{}", arg)?;
    }
    write!(f, ")")
}

fn write_locals(f: &mut fmt::Formatter<'_>, locals: &[LocalId]) -> fmt::Result {
    for (i, l) in locals.iter().enumerate() {
        if i > 0 { write!(f, ", ")?; }
        write!(f, "_{}", l.0)?;
    }
    Ok(())
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Assign { dst, rvalue } => {
                write!(f, "_{} = {}", dst.0, rvalue)
            }
            Stmt::Call { dst, func, args } => write_call(f, dst, func, args),
            Stmt::Restore { slots } => {
                write!(f, "restore [")?;
                write_locals(f, slots)?;
                write!(f, "]")
            }
            Stmt::Resume { dst: Some(d) } => write!(f, "_{} = resume", d.0),
            Stmt::Resume { dst: None } => write!(f, "resume"),
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Return { value: Some(v) } => write!(f, "return {}", v),
            Terminator::Return { value: None } => write!(f, "return"),
            Terminator::Goto { target } => write!(f, "goto bb{}", target.0),
            Terminator::Branch { cond, then_block, else_block } => {
                write!(f, "if {} then bb{} else bb{}", cond, then_block.0, else_block.0)
            }
            Terminator::Switch { value, cases, default } => {
                write!(f, "switch {} [", value)?;
                for (i, (val, block)) in cases.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}: bb{}", val, block.0)?;
                }
                write!(f, ", default: bb{}]", default.0)
            }
            Terminator::Throw { value } => write!(f, "throw {}", value),
            Terminator::Unreachable => write!(f, "unreachable"),
            Terminator::Dispatch { fresh, states } => {
                write!(f, "dispatch [fresh: bb{}", fresh.0)?;
                for (state, block) in states {
                    write!(f, ", s{}: bb{}", state.0, block.0)?;
                }
                write!(f, "]")
            }
            Terminator::SuspendCall { dst, func, args, state, save, next } => {
                write!(f, "suspendable ")?;
                write_call(f, dst, func, args)?;
                write!(f, " @s{} save [", state.0)?;
                write_locals(f, save)?;
                write!(f, "] -> bb{}", next.0)
            }
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Signature
        if self.attrs.woven {
            write!(f, "woven ")?;
        } else if self.attrs.suspend_marker {
            write!(f, "suspending ")?;
        }
        write!(f, "proc {}.{}(", self.id.owner, self.id.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 { write!(f, ", ")?; }
            write!(f, "{}: {}", p.display_name(), p.ty)?;
        }
        write!(f, ") -> {}", self.ret_ty)?;
        if !self.has_body() {
            return write!(f, ";");
        }
        writeln!(f, " {{")?;

        // Locals (non-param)
        for local in &self.locals {
            if !local.is_param {
                if let Some(name) = &local.name {
                    writeln!(f, "  let {}: {}  // _{}", name, local.ty, local.id.0)?;
                } else {
                    writeln!(f, "  let _{}: {}", local.id.0, local.ty)?;
                }
            }
        }
        if self.locals.iter().any(|l| !l.is_param) {
            writeln!(f)?;
        }

        // Blocks
        for block in &self.blocks {
            write!(f, "  bb{}:", block.id.0)?;
            if let Some(h) = &block.handler {
                write!(f, "  // catch -> bb{} (_{})", h.target.0, h.bind.0)?;
            }
            writeln!(f)?;
            for stmt in &block.statements {
                writeln!(f, "    {}", stmt)?;
            }
            writeln!(f, "    {}", block.terminator)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_procedure_with_handler() {
        let mut b = BlockBuilder::new(ProcId::new("app.Echo", "run", "(mailbox)"), Ty::Void);
        let mb = b.add_param("mb", Ty::Mailbox);
        let msg = b.alloc_local("msg", Ty::Any);
        let err = b.alloc_local("err", Ty::Any);
        let catch = b.create_block();
        b.set_handler(catch, err);
        b.call(Some(msg), FunctionRef::intrinsic(Intrinsic::Get), vec![mb.into()]);
        b.terminate(Terminator::Return { value: None });
        b.switch_to_block(catch);
        b.terminate(Terminator::Throw { value: err.into() });
        b.mark_suspending();
        let text = b.finish().to_string();

        assert!(text.starts_with("suspending proc app.Echo.run(mb: mailbox) -> void {"));
        assert!(text.contains("bb0:  // catch -> bb1 (_2)"));
        assert!(text.contains("_1 = skein.rt.get(_0)"));
        assert!(text.contains("throw _2"));
    }

    #[test]
    fn print_woven_terminators() {
        let call = Terminator::SuspendCall {
            dst: Some(LocalId(3)),
            func: FunctionRef::direct(ProcId::new("app.A", "step", "()")),
            args: vec![Operand::int(7)],
            state: StateId(2),
            save: vec![LocalId(0), LocalId(1)],
            next: BlockId(4),
        };
        assert_eq!(call.to_string(), "suspendable _3 = app.A.step(7) @s2 save [_0, _1] -> bb4");

        let dispatch = Terminator::Dispatch {
            fresh: BlockId(0),
            states: vec![(StateId(1), BlockId(5))],
        };
        assert_eq!(dispatch.to_string(), "dispatch [fresh: bb0, s1: bb5]");
    }
}
