// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! State machine transform for suspending procedures.
//!
//! Every block is cut right after each suspending call. The call itself
//! becomes a `SuspendCall` terminator tagged with a fresh resumption state
//! and the locals that must survive it. Each state gets a resume block that
//! restores those locals, takes the callee's completion and jumps to the
//! continuation. A new entry block dispatches on the resumed state.
//!
//! Block ids of the original procedure are preserved, so the first piece
//! of every cut block keeps its id and handler edges stay valid. Locals are
//! not renumbered.

use std::collections::{BTreeSet, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use skein_analysis::Classification;
use skein_ir::{
    Block, BlockId, LiveSlot, LocalId, ProcId, Procedure, ResumptionState, StateId, Stmt,
    Terminator,
};
use tracing::debug;

use crate::liveness::Liveness;
use crate::verify::verify;
use crate::{InvariantViolation, WeaveError};

// ── Public API ──────────────────────────────────────────────────────

/// Result of weaving one procedure.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedProcedure {
    pub procedure: Procedure,
    pub holder: StateHolder,
}

/// Layout of the per-invocation state a woven procedure saves when it
/// suspends: the union of the slots of all its resumption states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateHolder {
    pub name: String,
    pub procedure: ProcId,
    pub fields: Vec<LiveSlot>,
}

impl StateHolder {
    fn for_procedure(proc: &Procedure) -> Self {
        let mut seen = HashSet::new();
        let mut fields: Vec<LiveSlot> = proc
            .states
            .iter()
            .filter(|s| s.id != StateId::ENTRY)
            .flat_map(|s| s.live.iter())
            .filter(|slot| seen.insert(slot.local))
            .cloned()
            .collect();
        fields.sort_by_key(|slot| slot.local);
        Self {
            name: format!("{}$State.{}{}", proc.id.owner, proc.id.name, proc.id.signature),
            procedure: proc.id.clone(),
            fields,
        }
    }
}

/// Rewrite a suspending procedure into its resumable form.
///
/// Returns `Ok(None)` for procedures that are already woven or have no
/// body. A procedure whose verdict is not suspending is an error.
pub fn transform(
    proc: &Procedure,
    classification: &Classification,
) -> Result<Option<TransformedProcedure>, WeaveError> {
    if proc.attrs.woven {
        debug!(proc = %proc.id, "already woven, skipped");
        return Ok(None);
    }
    if !proc.has_body() {
        return Ok(None);
    }
    if let Some(err) = classification.error_for(&proc.id) {
        return Err(err.clone().into());
    }
    if !classification.is_suspending(&proc.id) {
        return Err(WeaveError::NotSuspending(proc.id.clone()));
    }

    let liveness = Liveness::compute(proc);
    let mut cutter = Cutter::new(proc);
    for block in &proc.blocks {
        cutter.cut(block, &liveness)?;
    }
    let woven = cutter.finish(proc);

    verify(&woven)?;
    debug!(proc = %woven.id, states = woven.states.len(), "woven");

    let holder = StateHolder::for_procedure(&woven);
    Ok(Some(TransformedProcedure { procedure: woven, holder }))
}

// ── Segmentation ────────────────────────────────────────────────────

struct Cutter<'p> {
    proc: &'p Procedure,
    blocks: Vec<Block>,
    states: Vec<ResumptionState>,
    arms: Vec<(StateId, BlockId)>,
    next_block: u32,
    next_state: u32,
}

impl<'p> Cutter<'p> {
    fn new(proc: &'p Procedure) -> Self {
        Self {
            proc,
            blocks: Vec::with_capacity(proc.blocks.len() + 1),
            states: Vec::new(),
            arms: Vec::new(),
            next_block: proc.blocks.len() as u32,
            next_state: 1,
        }
    }

    fn fresh_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        id
    }

    fn violation(&self, detail: String) -> InvariantViolation {
        InvariantViolation { proc: self.proc.id.clone(), detail }
    }

    fn cut(&mut self, block: &Block, liveness: &Liveness) -> Result<(), WeaveError> {
        let mut sites = block.suspend_sites.clone();
        sites.sort_unstable();
        sites.dedup();

        let mut current = Block {
            id: block.id,
            statements: Vec::new(),
            terminator: Terminator::Unreachable,
            handler: block.handler,
            suspend_sites: Vec::new(),
        };
        let mut start = 0;

        for site in sites {
            let Some(Stmt::Call { dst, func, args }) = block.statements.get(site) else {
                return Err(self
                    .violation(format!("{} statement {} is not a call", block.id, site))
                    .into());
            };

            let save = self.save_set(block, site, *dst, liveness);
            let state = StateId(self.next_state);
            self.next_state += 1;
            let next = self.fresh_block();
            let resume = self.fresh_block();

            current.statements = block.statements[start..site].to_vec();
            current.terminator = Terminator::SuspendCall {
                dst: *dst,
                func: func.clone(),
                args: args.clone(),
                state,
                save: save.clone(),
                next,
            };
            self.blocks.push(current);

            self.blocks.push(Block {
                id: resume,
                statements: vec![
                    Stmt::Restore { slots: save.clone() },
                    Stmt::Resume { dst: *dst },
                ],
                terminator: Terminator::Goto { target: next },
                // Exceptions delivered on resume land in the same scope
                // the call was made in.
                handler: block.handler,
                suspend_sites: Vec::new(),
            });
            let live = self.slots(&save);
            self.states.push(ResumptionState {
                id: state,
                block: resume,
                live,
                successors: Vec::new(),
            });
            self.arms.push((state, resume));

            current = Block {
                id: next,
                statements: Vec::new(),
                terminator: Terminator::Unreachable,
                handler: block.handler,
                suspend_sites: Vec::new(),
            };
            start = site + 1;
        }

        current.statements = block.statements[start..].to_vec();
        current.terminator = block.terminator.clone();
        self.blocks.push(current);
        Ok(())
    }

    /// Locals that must survive the call at `site`: whatever the normal
    /// continuation reads, plus whatever the handler reads if the callee
    /// completes by raising.
    fn save_set(
        &self,
        block: &Block,
        site: usize,
        dst: Option<LocalId>,
        liveness: &Liveness,
    ) -> Vec<LocalId> {
        let mut live: BTreeSet<LocalId> = liveness.live_after(block, site);
        if let Some(d) = dst {
            live.remove(&d);
        }
        if let Some(h) = &block.handler {
            live.extend(liveness.handler_live(h));
        }
        live.into_iter().collect()
    }

    fn slots(&self, locals: &[LocalId]) -> Vec<LiveSlot> {
        locals
            .iter()
            .map(|&id| match self.proc.local(id) {
                Some(local) => LiveSlot { local: id, name: local.display_name(), ty: local.ty },
                None => LiveSlot { local: id, name: format!("_{}", id.0), ty: skein_ir::Ty::Any },
            })
            .collect()
    }

    fn finish(mut self, original: &Procedure) -> Procedure {
        let dispatch = self.fresh_block();
        self.blocks.push(Block {
            id: dispatch,
            statements: Vec::new(),
            terminator: Terminator::Dispatch {
                fresh: original.entry_block,
                states: self.arms.clone(),
            },
            handler: None,
            suspend_sites: Vec::new(),
        });
        self.blocks.sort_by_key(|b| b.id);

        let entry_slots: Vec<LocalId> = original.params.iter().map(|p| p.id).collect();
        let mut states = Vec::with_capacity(self.states.len() + 1);
        states.push(ResumptionState {
            id: StateId::ENTRY,
            block: original.entry_block,
            live: self.slots(&entry_slots),
            successors: Vec::new(),
        });
        states.append(&mut self.states);

        let mut woven = original.clone();
        woven.blocks = self.blocks;
        woven.entry_block = dispatch;
        woven.attrs.woven = true;
        for state in &mut states {
            state.successors = reachable_states(&woven, state.block);
        }
        woven.states = states;
        woven
    }
}

/// States reachable from `start` without crossing another suspension.
fn reachable_states(proc: &Procedure, start: BlockId) -> Vec<StateId> {
    let mut found = BTreeSet::new();
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([start]);

    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        let Some(block) = proc.block(id) else { continue };
        if let Some(h) = &block.handler {
            queue.push_back(h.target);
        }
        match &block.terminator {
            Terminator::SuspendCall { state, .. } => {
                found.insert(*state);
            }
            term => queue.extend(term.successors()),
        }
    }
    found.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_analysis::Classifier;
    use skein_ir::{
        BinOp, BlockBuilder, CompilationUnit, FunctionRef, Intrinsic, Operand, RValue, Ty,
    };

    fn classify(procs: Vec<Procedure>) -> (Vec<Procedure>, Classification) {
        let mut unit = CompilationUnit { name: "t".into(), types: vec![], procedures: procs };
        let c = Classifier::new(&()).classify(&mut unit);
        (unit.procedures, c)
    }

    /// x = a + 1; yield(); y = x * 2; yield(); return y
    fn two_yields() -> Procedure {
        let mut b = BlockBuilder::new(ProcId::new("app.T", "twice", "(int)->int"), Ty::Int);
        let a = b.add_param("a", Ty::Int);
        let x = b.alloc_local("x", Ty::Int);
        let y = b.alloc_local("y", Ty::Int);
        b.assign(x, RValue::BinaryOp { op: BinOp::Add, left: a.into(), right: Operand::int(1) });
        b.call(None, FunctionRef::intrinsic(Intrinsic::Yield), vec![]);
        b.assign(y, RValue::BinaryOp { op: BinOp::Mul, left: x.into(), right: Operand::int(2) });
        b.call(None, FunctionRef::intrinsic(Intrinsic::Yield), vec![]);
        b.terminate(Terminator::Return { value: Some(y.into()) });
        b.finish()
    }

    #[test]
    fn splits_at_each_suspending_call() {
        let (procs, c) = classify(vec![two_yields()]);
        let result = transform(&procs[0], &c).unwrap().expect("woven");
        let woven = &result.procedure;

        assert!(woven.attrs.woven);
        assert_eq!(woven.states.len(), 3, "entry + one state per call");
        assert!(matches!(
            woven.block(woven.entry_block).map(|b| &b.terminator),
            Some(Terminator::Dispatch { states, .. }) if states.len() == 2
        ));

        let saves: Vec<Vec<LocalId>> = woven
            .blocks
            .iter()
            .filter_map(|b| match &b.terminator {
                Terminator::SuspendCall { save, .. } => Some(save.clone()),
                _ => None,
            })
            .collect();
        // x survives the first yield, y the second; the parameter dies early.
        assert_eq!(saves, vec![vec![LocalId(1)], vec![LocalId(2)]]);

        let s1 = woven.state(StateId(1)).unwrap();
        assert_eq!(s1.live[0].name, "x");
        assert_eq!(s1.successors, vec![StateId(2)]);
        assert!(woven.state(StateId(2)).unwrap().successors.is_empty());
        assert_eq!(woven.state(StateId::ENTRY).unwrap().successors, vec![StateId(1)]);

        assert_eq!(result.holder.name, "app.T$State.twice(int)->int");
        assert_eq!(result.holder.fields.len(), 2);
    }

    #[test]
    fn block_ids_match_positions() {
        let (procs, c) = classify(vec![two_yields()]);
        let woven = transform(&procs[0], &c).unwrap().unwrap().procedure;
        for (i, block) in woven.blocks.iter().enumerate() {
            assert_eq!(block.id.0 as usize, i);
        }
        assert_eq!(skein_analysis::validate_procedure(&woven), Ok(()));
    }

    #[test]
    fn declared_procedure_without_calls_passes_through() {
        let mut b = BlockBuilder::new(ProcId::new("app.T", "noop", "()"), Ty::Void);
        b.terminate(Terminator::Return { value: None });
        b.mark_suspending();
        let (procs, c) = classify(vec![b.finish()]);

        let woven = transform(&procs[0], &c).unwrap().unwrap().procedure;
        assert_eq!(woven.states.len(), 1);
        assert_eq!(woven.states[0].id, StateId::ENTRY);
        assert!(matches!(
            &woven.block(woven.entry_block).unwrap().terminator,
            Terminator::Dispatch { fresh, states } if *fresh == BlockId(0) && states.is_empty()
        ));
    }

    #[test]
    fn weaving_is_idempotent() {
        let (procs, c) = classify(vec![two_yields()]);
        let woven = transform(&procs[0], &c).unwrap().unwrap().procedure;
        assert_eq!(transform(&woven, &c).unwrap(), None);
    }

    #[test]
    fn non_suspending_procedure_is_rejected() {
        let mut b = BlockBuilder::new(ProcId::new("app.T", "pure", "()"), Ty::Void);
        b.terminate(Terminator::Return { value: None });
        let (procs, c) = classify(vec![b.finish()]);
        assert!(matches!(
            transform(&procs[0], &c),
            Err(WeaveError::NotSuspending(_))
        ));
    }

    #[test]
    fn resume_block_inherits_handler_and_saves_handler_inputs() {
        // bb0 (catch -> bb2 binding err): r = get(mb); goto bb1
        // bb1: return r
        // bb2: return fallback
        let mut b = BlockBuilder::new(ProcId::new("app.T", "recv", "(mailbox,any)->any"), Ty::Any);
        let mb = b.add_param("mb", Ty::Mailbox);
        let fallback = b.add_param("fallback", Ty::Any);
        let r = b.alloc_local("r", Ty::Any);
        let err = b.alloc_local("err", Ty::Any);
        let ok = b.create_block();
        let catch = b.create_block();
        b.set_handler(catch, err);
        b.call(Some(r), FunctionRef::intrinsic(Intrinsic::Get), vec![mb.into()]);
        b.terminate(Terminator::Goto { target: ok });
        b.switch_to_block(ok);
        b.terminate(Terminator::Return { value: Some(r.into()) });
        b.switch_to_block(catch);
        b.terminate(Terminator::Return { value: Some(fallback.into()) });
        let (procs, c) = classify(vec![b.finish()]);

        let woven = transform(&procs[0], &c).unwrap().unwrap().procedure;
        let state = woven.state(StateId(1)).unwrap();
        let resume = woven.block(state.block).unwrap();
        assert_eq!(resume.handler.map(|h| h.target), Some(catch));
        assert_eq!(
            resume.statements,
            vec![Stmt::Restore { slots: vec![fallback] }, Stmt::Resume { dst: Some(r) }]
        );
    }

    #[test]
    fn branches_keep_their_targets() {
        // bb0: if flag then bb1 else bb2
        // bb1: yield(); goto bb2
        // bb2: return n
        let mut b = BlockBuilder::new(ProcId::new("app.T", "maybe", "(bool,int)->int"), Ty::Int);
        let flag = b.add_param("flag", Ty::Bool);
        let n = b.add_param("n", Ty::Int);
        let then = b.create_block();
        let join = b.create_block();
        b.terminate(Terminator::Branch { cond: flag.into(), then_block: then, else_block: join });
        b.switch_to_block(then);
        b.call(None, FunctionRef::intrinsic(Intrinsic::Yield), vec![]);
        b.terminate(Terminator::Goto { target: join });
        b.switch_to_block(join);
        b.terminate(Terminator::Return { value: Some(n.into()) });
        let (procs, c) = classify(vec![b.finish()]);

        let woven = transform(&procs[0], &c).unwrap().unwrap().procedure;
        assert_eq!(woven.blocks[0].terminator, procs[0].blocks[0].terminator);
        assert!(matches!(
            &woven.blocks[1].terminator,
            Terminator::SuspendCall { save, state, .. } if save == &vec![n] && *state == StateId(1)
        ));
        assert_eq!(woven.state(StateId::ENTRY).unwrap().live.len(), 2);
    }
}
