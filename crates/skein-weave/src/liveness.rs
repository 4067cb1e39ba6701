// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Backward liveness over a procedure's blocks.
//!
//! Exceptional edges are included: every statement that can raise keeps the
//! handler's live-in set (minus the binding local) alive.

use std::collections::BTreeSet;

use skein_ir::{Block, BlockId, Handler, LocalId, Operand, Procedure, RValue, Stmt, Terminator};

pub type LiveSet = BTreeSet<LocalId>;

// ── Defs and uses ───────────────────────────────────────────────────

/// Collect locals defined by a statement.
pub(crate) fn stmt_defs(stmt: &Stmt) -> Vec<LocalId> {
    match stmt {
        Stmt::Assign { dst, .. } => vec![*dst],
        Stmt::Call { dst: Some(d), .. } | Stmt::Resume { dst: Some(d) } => vec![*d],
        Stmt::Restore { slots } => slots.clone(),
        Stmt::Call { dst: None, .. } | Stmt::Resume { dst: None } => vec![],
    }
}

/// Collect locals used by a statement.
pub(crate) fn stmt_uses(stmt: &Stmt) -> Vec<LocalId> {
    let mut uses = Vec::new();
    match stmt {
        Stmt::Assign { rvalue, .. } => rvalue_uses(rvalue, &mut uses),
        Stmt::Call { args, .. } => {
            for arg in args {
                operand_uses(arg, &mut uses);
            }
        }
        Stmt::Restore { .. } | Stmt::Resume { .. } => {}
    }
    uses
}

fn operand_uses(op: &Operand, uses: &mut Vec<LocalId>) {
    if let Operand::Local(id) = op {
        uses.push(*id);
    }
}

fn rvalue_uses(rv: &RValue, uses: &mut Vec<LocalId>) {
    for op in rv.operands() {
        operand_uses(op, uses);
    }
}

/// Whether control can leave the statement through the exception handler.
fn can_raise(stmt: &Stmt) -> bool {
    !matches!(stmt, Stmt::Restore { .. })
}

fn terminator_can_raise(term: &Terminator) -> bool {
    matches!(term, Terminator::Throw { .. } | Terminator::SuspendCall { .. })
}

// ── Dataflow ────────────────────────────────────────────────────────

/// Per-block live-in and live-out sets.
#[derive(Debug, Clone)]
pub struct Liveness {
    live_in: Vec<LiveSet>,
    live_out: Vec<LiveSet>,
}

impl Liveness {
    pub fn compute(proc: &Procedure) -> Self {
        let n = proc.blocks.len();
        let mut live = Liveness {
            live_in: vec![LiveSet::new(); n],
            live_out: vec![LiveSet::new(); n],
        };

        loop {
            let mut changed = false;
            for block in proc.blocks.iter().rev() {
                let i = block.id.0 as usize;
                let out = live.normal_out(block);
                let inn = live.transfer(block, block.statements.len(), &out);
                if out != live.live_out[i] {
                    live.live_out[i] = out;
                    changed = true;
                }
                if inn != live.live_in[i] {
                    live.live_in[i] = inn;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        live
    }

    pub fn live_in(&self, block: BlockId) -> &LiveSet {
        &self.live_in[block.0 as usize]
    }

    pub fn live_out(&self, block: BlockId) -> &LiveSet {
        &self.live_out[block.0 as usize]
    }

    /// Locals a raised value needs when it lands in `handler`.
    pub fn handler_live(&self, handler: &Handler) -> LiveSet {
        let mut set = self.live_in(handler.target).clone();
        set.remove(&handler.bind);
        set
    }

    /// Locals live immediately after statement `index` of `block` on the
    /// normal path.
    pub fn live_after(&self, block: &Block, index: usize) -> LiveSet {
        let out = self.normal_out(block);
        let mut live = self.before_terminator(block, &out);
        let handler = block.handler.as_ref().map(|h| self.handler_live(h));
        for stmt in block.statements[index + 1..].iter().rev() {
            step_back(&mut live, stmt, handler.as_ref());
        }
        live
    }

    fn normal_out(&self, block: &Block) -> LiveSet {
        let mut out = LiveSet::new();
        for succ in block.terminator.successors() {
            if let Some(set) = self.live_in.get(succ.0 as usize) {
                out.extend(set.iter().copied());
            }
        }
        out
    }

    /// Live set just before the terminator executes.
    fn before_terminator(&self, block: &Block, out: &LiveSet) -> LiveSet {
        let mut live = out.clone();
        if let Terminator::SuspendCall { dst: Some(d), .. } = &block.terminator {
            live.remove(d);
        }
        live.extend(block.terminator.uses());
        if terminator_can_raise(&block.terminator) {
            if let Some(h) = &block.handler {
                live.extend(self.handler_live(h));
            }
        }
        live
    }

    /// Live set before the first `upto` statements of `block`.
    fn transfer(&self, block: &Block, upto: usize, out: &LiveSet) -> LiveSet {
        let mut live = self.before_terminator(block, out);
        let handler = block.handler.as_ref().map(|h| self.handler_live(h));
        for stmt in block.statements[..upto].iter().rev() {
            step_back(&mut live, stmt, handler.as_ref());
        }
        live
    }
}

fn step_back(live: &mut LiveSet, stmt: &Stmt, handler: Option<&LiveSet>) {
    for d in stmt_defs(stmt) {
        live.remove(&d);
    }
    live.extend(stmt_uses(stmt));
    if can_raise(stmt) {
        if let Some(h) = handler {
            live.extend(h.iter().copied());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_ir::{BinOp, BlockBuilder, FunctionRef, Intrinsic, ProcId, Ty};

    #[test]
    fn value_used_after_call_is_live() {
        // x = 1; y = 2; yield(); return x
        let mut b = BlockBuilder::new(ProcId::new("app.T", "f", "()->int"), Ty::Int);
        let x = b.alloc_local("x", Ty::Int);
        let y = b.alloc_local("y", Ty::Int);
        b.assign(x, RValue::Use(Operand::int(1)));
        b.assign(y, RValue::Use(Operand::int(2)));
        b.call(None, FunctionRef::intrinsic(Intrinsic::Yield), vec![]);
        b.terminate(Terminator::Return { value: Some(x.into()) });
        let proc = b.finish();

        let live = Liveness::compute(&proc);
        let after = live.live_after(&proc.blocks[0], 2);
        assert!(after.contains(&x), "x should be live after the call");
        assert!(!after.contains(&y), "y is dead after the call");
        assert!(live.live_in(BlockId(0)).is_empty());
    }

    #[test]
    fn liveness_flows_across_loops() {
        // bb0: i = 0; goto bb1
        // bb1: c = i < n; if c then bb2 else bb3
        // bb2: i = i + 1; goto bb1
        // bb3: return i
        let mut b = BlockBuilder::new(ProcId::new("app.T", "count", "(int)->int"), Ty::Int);
        let n = b.add_param("n", Ty::Int);
        let i = b.alloc_local("i", Ty::Int);
        let c = b.alloc_local("c", Ty::Bool);
        let head = b.create_block();
        let body = b.create_block();
        let exit = b.create_block();
        b.assign(i, RValue::Use(Operand::int(0)));
        b.terminate(Terminator::Goto { target: head });
        b.switch_to_block(head);
        b.assign(c, RValue::BinaryOp { op: BinOp::Lt, left: i.into(), right: n.into() });
        b.terminate(Terminator::Branch { cond: c.into(), then_block: body, else_block: exit });
        b.switch_to_block(body);
        b.assign(i, RValue::BinaryOp { op: BinOp::Add, left: i.into(), right: Operand::int(1) });
        b.terminate(Terminator::Goto { target: head });
        b.switch_to_block(exit);
        b.terminate(Terminator::Return { value: Some(i.into()) });
        let proc = b.finish();

        let live = Liveness::compute(&proc);
        assert_eq!(live.live_in(head), &LiveSet::from([n, i]));
        assert_eq!(live.live_in(body), &LiveSet::from([n, i]));
        assert_eq!(live.live_out(body), &LiveSet::from([n, i]));
        assert_eq!(live.live_in(BlockId(0)), &LiveSet::from([n]));
    }

    #[test]
    fn handler_keeps_values_alive() {
        // bb0 (catch -> bb2): yield(); goto bb1
        // bb1: return 0
        // bb2: return fallback
        let mut b = BlockBuilder::new(ProcId::new("app.T", "guarded", "(int)->int"), Ty::Int);
        let fallback = b.add_param("fallback", Ty::Int);
        let err = b.alloc_local("err", Ty::Any);
        let ok = b.create_block();
        let catch = b.create_block();
        b.set_handler(catch, err);
        b.call(None, FunctionRef::intrinsic(Intrinsic::Yield), vec![]);
        b.terminate(Terminator::Goto { target: ok });
        b.switch_to_block(ok);
        b.terminate(Terminator::Return { value: Some(Operand::int(0)) });
        b.switch_to_block(catch);
        b.terminate(Terminator::Return { value: Some(fallback.into()) });
        let proc = b.finish();

        let live = Liveness::compute(&proc);
        let handler = proc.blocks[0].handler.expect("handler");
        assert_eq!(live.handler_live(&handler), LiveSet::from([fallback]));
        assert!(live.live_in(BlockId(0)).contains(&fallback));
        // Normal path after the call does not need it.
        assert!(live.live_after(&proc.blocks[0], 0).is_empty());
    }
}
