// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! BlockBuilder - helper for CFG construction by front ends and tests.

use crate::{
    Block, BlockId, FunctionRef, Handler, Local, LocalId, Operand, ProcAttrs, ProcId, Procedure,
    RValue, Stmt, Terminator, Ty,
};

pub struct BlockBuilder {
    procedure: Procedure,
    current_block: BlockId,
    next_local_id: u32,
    next_block_id: u32,
}

impl BlockBuilder {
    pub fn new(id: ProcId, ret_ty: Ty) -> Self {
        let entry_block = BlockId(0);
        let procedure = Procedure {
            id,
            params: Vec::new(),
            ret_ty,
            locals: Vec::new(),
            blocks: vec![Block::new(entry_block)],
            entry_block,
            attrs: ProcAttrs::default(),
            states: Vec::new(),
        };

        Self {
            procedure,
            current_block: entry_block,
            next_local_id: 0,
            next_block_id: 1,
        }
    }

    /// Declaration without a body.
    pub fn declaration(id: ProcId, ret_ty: Ty) -> Procedure {
        let mut procedure = Self::new(id, ret_ty).finish();
        procedure.blocks.clear();
        procedure.attrs.is_abstract = true;
        procedure
    }

    pub fn create_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block_id);
        self.next_block_id += 1;
        self.procedure.blocks.push(Block::new(id));
        id
    }

    pub fn switch_to_block(&mut self, block: BlockId) {
        self.current_block = block;
    }

    pub fn current_block(&self) -> BlockId {
        self.current_block
    }

    pub fn alloc_temp(&mut self, ty: Ty) -> LocalId {
        self.push_local(None, ty, false)
    }

    pub fn alloc_local(&mut self, name: impl Into<String>, ty: Ty) -> LocalId {
        self.push_local(Some(name.into()), ty, false)
    }

    pub fn add_param(&mut self, name: impl Into<String>, ty: Ty) -> LocalId {
        let id = self.push_local(Some(name.into()), ty, true);
        let local = self.procedure.locals[id.0 as usize].clone();
        self.procedure.params.push(local);
        id
    }

    fn push_local(&mut self, name: Option<String>, ty: Ty, is_param: bool) -> LocalId {
        let id = LocalId(self.next_local_id);
        self.next_local_id += 1;
        self.procedure.locals.push(Local { id, name, ty, is_param });
        id
    }

    pub fn push_stmt(&mut self, stmt: Stmt) {
        self.block_mut().statements.push(stmt);
    }

    pub fn assign(&mut self, dst: LocalId, rvalue: RValue) {
        self.push_stmt(Stmt::Assign { dst, rvalue });
    }

    pub fn call(&mut self, dst: Option<LocalId>, func: FunctionRef, args: Vec<Operand>) {
        self.push_stmt(Stmt::Call { dst, func, args });
    }

    pub fn terminate(&mut self, term: Terminator) {
        self.block_mut().terminator = term;
    }

    /// Put the current block inside an exception handler scope.
    pub fn set_handler(&mut self, target: BlockId, bind: LocalId) {
        self.block_mut().handler = Some(Handler { target, bind });
    }

    /// Check if the current block still has the default Unreachable terminator.
    pub fn current_block_unterminated(&self) -> bool {
        matches!(
            self.procedure.blocks[self.current_block.0 as usize].terminator,
            Terminator::Unreachable
        )
    }

    pub fn mark_suspending(&mut self) -> &mut Self {
        self.procedure.attrs.suspend_marker = true;
        self
    }

    pub fn mark_bridge(&mut self) -> &mut Self {
        self.procedure.attrs.bridge = true;
        self
    }

    fn block_mut(&mut self) -> &mut Block {
        &mut self.procedure.blocks[self.current_block.0 as usize]
    }

    pub fn finish(self) -> Procedure {
        self.procedure
    }
}
