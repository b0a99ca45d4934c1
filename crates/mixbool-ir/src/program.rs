//! Program handle.

use smallvec::SmallVec;

use crate::context::{BlockData, IrContext};
use crate::ops::Opcode;
use crate::refs::{BlockRef, OpRef, ValueRef};
use crate::types::Type;

/// A named program: one entry block whose arguments are the inputs.
///
/// The handle only names storage inside an `IrContext`; cloning the context
/// clones the program, and the same handle stays valid for the copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program {
    name: String,
    entry: BlockRef,
}

impl Program {
    /// Create an empty program with the given input types.
    pub fn new(ctx: &mut IrContext, name: impl Into<String>, inputs: &[Type]) -> Self {
        let entry = ctx.create_block(BlockData {
            args: inputs.to_vec(),
            ops: SmallVec::new(),
        });
        Self {
            name: name.into(),
            entry,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> BlockRef {
        self.entry
    }

    /// Input values (entry block arguments).
    pub fn inputs<'a>(&self, ctx: &'a IrContext) -> &'a [ValueRef] {
        ctx.block_args(self.entry)
    }

    pub fn input_types(&self, ctx: &IrContext) -> Vec<Type> {
        ctx.block(self.entry).args.clone()
    }

    /// Snapshot of the operations in program order.
    pub fn ops(&self, ctx: &IrContext) -> Vec<OpRef> {
        ctx.block(self.entry).ops.to_vec()
    }

    pub fn len(&self, ctx: &IrContext) -> usize {
        ctx.block(self.entry).ops.len()
    }

    pub fn is_empty(&self, ctx: &IrContext) -> bool {
        ctx.block(self.entry).ops.is_empty()
    }

    /// The trailing `return`, if the program has one.
    pub fn terminator(&self, ctx: &IrContext) -> Option<OpRef> {
        ctx.block(self.entry)
            .ops
            .last()
            .copied()
            .filter(|&op| matches!(ctx.op(op).opcode, Opcode::Return))
    }
}
