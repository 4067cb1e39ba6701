// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Post-transform checks on woven procedures.
//!
//! Liveness is recomputed on the woven graph. A resume block must not need
//! any local it does not restore itself, and every suspension state must be
//! reachable from the dispatcher with a matching restore list.

use std::collections::HashMap;

use skein_ir::{Procedure, StateId, Stmt, Terminator};

use crate::liveness::Liveness;
use crate::InvariantViolation;

pub fn verify(proc: &Procedure) -> Result<(), InvariantViolation> {
    let fail = |detail: String| InvariantViolation { proc: proc.id.clone(), detail };

    let Some(entry) = proc.block(proc.entry_block) else {
        return Err(fail(format!("entry {} does not exist", proc.entry_block)));
    };
    let Terminator::Dispatch { states: arms, .. } = &entry.terminator else {
        return Err(fail("entry block does not dispatch on the resume state".into()));
    };
    let arms: HashMap<StateId, _> = arms.iter().copied().collect();

    let mut calls = HashMap::new();
    for block in &proc.blocks {
        if let Terminator::SuspendCall { state, save, .. } = &block.terminator {
            if calls.insert(*state, save).is_some() {
                return Err(fail(format!("state {} is used by two calls", state)));
            }
        }
    }
    if calls.len() != arms.len() {
        return Err(fail(format!(
            "{} suspending calls but {} dispatcher entries",
            calls.len(),
            arms.len()
        )));
    }

    let liveness = Liveness::compute(proc);
    for (state, save) in calls {
        let Some(&resume) = arms.get(&state) else {
            return Err(fail(format!("state {} has no dispatcher entry", state)));
        };
        let Some(recorded) = proc.state(state) else {
            return Err(fail(format!("state {} is not recorded", state)));
        };
        if recorded.block != resume {
            return Err(fail(format!(
                "state {} resumes at {} but dispatches to {}",
                state, recorded.block, resume
            )));
        }
        let restored = proc.block(resume).and_then(|b| match b.statements.first() {
            Some(Stmt::Restore { slots }) => Some(slots),
            _ => None,
        });
        if restored != Some(save) {
            return Err(fail(format!("{} does not restore what state {} saves", resume, state)));
        }
        let slots: Vec<_> = recorded.live.iter().map(|s| s.local).collect();
        if &slots != save {
            return Err(fail(format!("state {} records different slots than it saves", state)));
        }

        let missing = liveness.live_in(resume);
        if !missing.is_empty() {
            let names: Vec<String> = missing.iter().map(|l| l.to_string()).collect();
            return Err(fail(format!(
                "{} reads {} without restoring it",
                resume,
                names.join(", ")
            )));
        }
    }
    Ok(())
}
