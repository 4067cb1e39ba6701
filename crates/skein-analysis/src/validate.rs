// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Structural checks run before a procedure's body is trusted.

use skein_ir::{BlockId, LocalId, Operand, Procedure, RValue, Stmt, Terminator};

use crate::GraphError;

/// Check that every edge, local and entry point of `proc` exists.
///
/// Procedures without a body are trivially valid.
pub fn validate_procedure(proc: &Procedure) -> Result<(), GraphError> {
    if proc.attrs.is_abstract {
        return Ok(());
    }
    if proc.blocks.is_empty() {
        return Err(GraphError::Empty);
    }
    if proc.block(proc.entry_block).is_none() {
        return Err(GraphError::MissingEntry(proc.entry_block));
    }

    for (index, block) in proc.blocks.iter().enumerate() {
        if block.id.0 as usize != index {
            return Err(GraphError::MisnumberedBlock { index, found: block.id });
        }

        let check_edge = |to: BlockId| -> Result<(), GraphError> {
            match proc.block(to) {
                Some(_) => Ok(()),
                None => Err(GraphError::DanglingEdge { from: block.id, to }),
            }
        };
        let check_local = |local: LocalId| -> Result<(), GraphError> {
            match proc.local(local) {
                Some(l) if l.id == local => Ok(()),
                _ => Err(GraphError::UndeclaredLocal { block: block.id, local }),
            }
        };

        for target in block.terminator.successors() {
            check_edge(target)?;
        }
        if let Some(handler) = &block.handler {
            check_edge(handler.target)?;
            check_local(handler.bind)?;
        }

        for stmt in &block.statements {
            match stmt {
                Stmt::Assign { dst, rvalue } => {
                    check_local(*dst)?;
                    for op in rvalue_locals(rvalue) {
                        check_local(op)?;
                    }
                }
                Stmt::Call { dst, args, .. } => {
                    if let Some(dst) = dst {
                        check_local(*dst)?;
                    }
                    for op in args.iter().filter_map(Operand::as_local) {
                        check_local(op)?;
                    }
                }
                Stmt::Restore { slots } => {
                    if !proc.attrs.woven {
                        return Err(GraphError::ResumptionCode(block.id));
                    }
                    for slot in slots {
                        check_local(*slot)?;
                    }
                }
                Stmt::Resume { dst } => {
                    if !proc.attrs.woven {
                        return Err(GraphError::ResumptionCode(block.id));
                    }
                    if let Some(dst) = dst {
                        check_local(*dst)?;
                    }
                }
            }
        }

        match &block.terminator {
            Terminator::Dispatch { .. } if !proc.attrs.woven => {
                return Err(GraphError::ResumptionCode(block.id));
            }
            Terminator::SuspendCall { dst, .. } => {
                if !proc.attrs.woven {
                    return Err(GraphError::ResumptionCode(block.id));
                }
                if let Some(dst) = dst {
                    check_local(*dst)?;
                }
            }
            _ => {}
        }
        for used in block.terminator.uses() {
            check_local(used)?;
        }
    }
    Ok(())
}

fn rvalue_locals(rvalue: &RValue) -> impl Iterator<Item = LocalId> + '_ {
    rvalue.operands().into_iter().filter_map(Operand::as_local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_ir::{BlockBuilder, ProcId, Ty};

    fn proc_with(term: Terminator) -> Procedure {
        let mut b = BlockBuilder::new(ProcId::new("app.T", "f", "()"), Ty::Void);
        b.terminate(term);
        b.finish()
    }

    #[test]
    fn well_formed_procedure_passes() {
        let mut b = BlockBuilder::new(ProcId::new("app.T", "f", "(int)->int"), Ty::Int);
        let x = b.add_param("x", Ty::Int);
        let next = b.create_block();
        b.terminate(Terminator::Goto { target: next });
        b.switch_to_block(next);
        b.terminate(Terminator::Return { value: Some(x.into()) });
        assert_eq!(validate_procedure(&b.finish()), Ok(()));
    }

    #[test]
    fn dangling_edge_is_reported() {
        let proc = proc_with(Terminator::Goto { target: BlockId(9) });
        assert_eq!(
            validate_procedure(&proc),
            Err(GraphError::DanglingEdge { from: BlockId(0), to: BlockId(9) })
        );
    }

    #[test]
    fn undeclared_local_is_reported() {
        let proc = proc_with(Terminator::Return { value: Some(Operand::Local(LocalId(4))) });
        assert_eq!(
            validate_procedure(&proc),
            Err(GraphError::UndeclaredLocal { block: BlockId(0), local: LocalId(4) })
        );
    }

    #[test]
    fn resumption_code_needs_woven_marker() {
        let proc = proc_with(Terminator::Dispatch { fresh: BlockId(0), states: vec![] });
        assert_eq!(validate_procedure(&proc), Err(GraphError::ResumptionCode(BlockId(0))));
    }

    #[test]
    fn missing_entry_is_reported() {
        let mut proc = proc_with(Terminator::Return { value: None });
        proc.entry_block = BlockId(3);
        assert_eq!(validate_procedure(&proc), Err(GraphError::MissingEntry(BlockId(3))));
    }
}
