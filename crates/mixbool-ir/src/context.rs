//! Instruction storage for mixbool programs.
//!
//! A program is one flat block with no regions or successors. Ops, values
//! and blocks live in `PrimaryMap` arenas inside [`IrContext`] and are
//! addressed by the entity handles from [`crate::refs`]. An op produces at
//! most one value, so results are stored as `Option<ValueRef>` rather than
//! as a list.
//!
//! Every value keeps its use-chain up to date, which is what lets a rewrite
//! redirect consumers with [`IrContext::replace_all_uses`].

use cranelift_entity::{EntityList, ListPool, PrimaryMap, SecondaryMap};
use smallvec::SmallVec;
use tracing::trace;

use crate::ops::Opcode;
use crate::refs::{BlockRef, OpRef, ValueDef, ValueRef};
use crate::types::Type;

/// Operand slot `operand_index` of `user` reads the value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: OpRef,
    pub operand_index: u32,
}

#[derive(Clone, Debug)]
pub struct OperationData {
    pub opcode: Opcode,
    /// Operand values, backed by the context's list pool.
    pub operands: EntityList<ValueRef>,
    /// `Some` for value-producing opcodes; `return` has no result.
    pub result_ty: Option<Type>,
    /// The block holding this op, `None` once it is unlinked.
    pub parent_block: Option<BlockRef>,
}

#[derive(Clone, Debug)]
pub struct ValueData {
    pub def: ValueDef,
    pub ty: Type,
}

/// A straight-line op list. For the entry block, `args` are the program
/// input types.
#[derive(Clone, Debug, Default)]
pub struct BlockData {
    pub args: Vec<Type>,
    pub ops: SmallVec<[OpRef; 8]>,
}

/// Owner of every op, value and block of one or more programs.
#[derive(Clone)]
pub struct IrContext {
    ops: PrimaryMap<OpRef, OperationData>,
    values: PrimaryMap<ValueRef, ValueData>,
    blocks: PrimaryMap<BlockRef, BlockData>,
    uses: SecondaryMap<ValueRef, SmallVec<[Use; 2]>>,
    value_pool: ListPool<ValueRef>,
    results: SecondaryMap<OpRef, Option<ValueRef>>,
    inputs: SecondaryMap<BlockRef, EntityList<ValueRef>>,
}

impl IrContext {
    pub fn new() -> Self {
        Self {
            ops: PrimaryMap::new(),
            values: PrimaryMap::new(),
            blocks: PrimaryMap::new(),
            uses: SecondaryMap::new(),
            value_pool: ListPool::new(),
            results: SecondaryMap::new(),
            inputs: SecondaryMap::new(),
        }
    }

    /// Allocate an unlinked op and its result value, recording a use for
    /// each operand.
    ///
    /// The op does not appear in any program until it is linked with
    /// [`push_op`](Self::push_op) or [`insert_op_before`](Self::insert_op_before).
    ///
    /// # Panics
    ///
    /// Panics if `data.parent_block` is already set.
    pub fn create_op(&mut self, data: OperationData) -> OpRef {
        assert!(
            data.parent_block.is_none(),
            "create_op: new ops start unlinked, got one with a parent block",
        );

        let operands: SmallVec<[ValueRef; 4]> = data.operands.as_slice(&self.value_pool).into();
        let result_ty = data.result_ty;
        let op = self.ops.push(data);

        for (index, &value) in operands.iter().enumerate() {
            self.uses[value].push(Use {
                user: op,
                operand_index: index as u32,
            });
        }
        self.results[op] = result_ty.map(|ty| {
            self.values.push(ValueData {
                def: ValueDef::OpResult(op),
                ty,
            })
        });
        op
    }

    pub fn op(&self, op: OpRef) -> &OperationData {
        &self.ops[op]
    }

    pub fn op_operands(&self, op: OpRef) -> &[ValueRef] {
        self.ops[op].operands.as_slice(&self.value_pool)
    }

    /// The value `op` defines, if any.
    pub fn op_result(&self, op: OpRef) -> Option<ValueRef> {
        self.results[op]
    }

    pub fn is_attached(&self, op: OpRef) -> bool {
        self.ops[op].parent_block.is_some()
    }

    /// Drop `op`'s operand uses and release its operand list. The arena slot
    /// stays allocated, so existing handles remain valid but dead.
    ///
    /// # Panics
    ///
    /// Panics if `op` is still linked into a block or its result is still
    /// read somewhere.
    pub fn remove_op(&mut self, op: OpRef) {
        assert!(
            self.ops[op].parent_block.is_none(),
            "remove_op: unlink {op} with remove_op_from_block before removing it",
        );
        if let Some(result) = self.results[op] {
            let live = self.uses[result].len();
            assert!(
                live == 0,
                "remove_op: {result} still has {live} use(s), rebind them first",
            );
        }

        let operands: SmallVec<[ValueRef; 4]> =
            self.ops[op].operands.as_slice(&self.value_pool).into();
        for (index, &value) in operands.iter().enumerate() {
            self.uses[value].retain(|u| !(u.user == op && u.operand_index == index as u32));
        }
        self.ops[op].operands.clear(&mut self.value_pool);
    }

    pub fn value(&self, v: ValueRef) -> &ValueData {
        &self.values[v]
    }

    pub fn value_ty(&self, v: ValueRef) -> Type {
        self.values[v].ty
    }

    pub fn value_def(&self, v: ValueRef) -> ValueDef {
        self.values[v].def
    }

    pub fn is_valid_value(&self, v: ValueRef) -> bool {
        self.values.is_valid(v)
    }

    /// Allocate a block and one input value per entry of `data.args`.
    pub fn create_block(&mut self, data: BlockData) -> BlockRef {
        let arg_types = data.args.clone();
        let block = self.blocks.push(data);

        let mut inputs = EntityList::new();
        for (index, ty) in arg_types.into_iter().enumerate() {
            let value = self.values.push(ValueData {
                def: ValueDef::BlockArg(block, index as u32),
                ty,
            });
            inputs.push(value, &mut self.value_pool);
        }
        self.inputs[block] = inputs;
        block
    }

    pub fn block(&self, b: BlockRef) -> &BlockData {
        &self.blocks[b]
    }

    /// Input values of `b`, in declaration order.
    pub fn block_args(&self, b: BlockRef) -> &[ValueRef] {
        self.inputs[b].as_slice(&self.value_pool)
    }

    pub fn op_position(&self, block: BlockRef, op: OpRef) -> Option<usize> {
        self.blocks[block].ops.iter().position(|&o| o == op)
    }

    /// Link an unlinked `op` at the end of `block`.
    pub fn push_op(&mut self, block: BlockRef, op: OpRef) {
        assert!(
            self.ops[op].parent_block.is_none(),
            "push_op: {op} is already linked",
        );
        self.ops[op].parent_block = Some(block);
        self.blocks[block].ops.push(op);
    }

    /// Link an unlinked `op` directly in front of `before`.
    ///
    /// # Panics
    ///
    /// Panics if `op` is already linked or `before` is not in `block`.
    pub fn insert_op_before(&mut self, block: BlockRef, before: OpRef, op: OpRef) {
        assert!(
            self.ops[op].parent_block.is_none(),
            "insert_op_before: {op} is already linked",
        );
        let Some(pos) = self.op_position(block, before) else {
            panic!("insert_op_before: {before} is not in {block}");
        };
        self.blocks[block].ops.insert(pos, op);
        self.ops[op].parent_block = Some(block);
    }

    /// Unlink `op` from `block`. Its uses and result are left alone.
    pub fn remove_op_from_block(&mut self, block: BlockRef, op: OpRef) {
        self.blocks[block].ops.retain(|o| *o != op);
        if self.ops[op].parent_block == Some(block) {
            self.ops[op].parent_block = None;
        }
    }

    pub fn uses(&self, v: ValueRef) -> &[Use] {
        &self.uses[v]
    }

    pub fn has_uses(&self, v: ValueRef) -> bool {
        !self.uses[v].is_empty()
    }

    /// Point every operand reading `old` at `new` and move the use-chain
    /// entries along. Returns how many operands changed.
    pub fn replace_all_uses(&mut self, old: ValueRef, new: ValueRef) -> usize {
        if old == new {
            return 0;
        }
        let moved = std::mem::take(&mut self.uses[old]);
        for u in &moved {
            let slot = &mut self.ops[u.user].operands.as_mut_slice(&mut self.value_pool)
                [u.operand_index as usize];
            debug_assert_eq!(*slot, old);
            *slot = new;
        }
        self.uses[new].extend(moved.iter().copied());

        trace!(%old, %new, count = moved.len(), "replaced all uses");
        moved.len()
    }
}

impl Default for IrContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Assembles an [`OperationData`], packing operands into the context's pool.
pub struct OperationDataBuilder {
    opcode: Opcode,
    operands: SmallVec<[ValueRef; 4]>,
    result_ty: Option<Type>,
}

impl OperationDataBuilder {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            operands: SmallVec::new(),
            result_ty: None,
        }
    }

    pub fn operand(mut self, v: ValueRef) -> Self {
        self.operands.push(v);
        self
    }

    pub fn operands(mut self, vs: impl IntoIterator<Item = ValueRef>) -> Self {
        self.operands.extend(vs);
        self
    }

    pub fn result(mut self, ty: Type) -> Self {
        self.result_ty = Some(ty);
        self
    }

    pub fn build(self, ctx: &mut IrContext) -> OperationData {
        let mut operands = EntityList::new();
        operands.extend(self.operands, &mut ctx.value_pool);
        OperationData {
            opcode: self.opcode,
            operands,
            result_ty: self.result_ty,
            parent_block: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::BinaryOperator;

    fn block_with_args(ctx: &mut IrContext, args: Vec<Type>) -> BlockRef {
        ctx.create_block(BlockData {
            args,
            ops: SmallVec::new(),
        })
    }

    fn binary(ctx: &mut IrContext, op: BinaryOperator, lhs: ValueRef, rhs: ValueRef) -> OpRef {
        let data = OperationDataBuilder::new(Opcode::Binary(op))
            .operand(lhs)
            .operand(rhs)
            .result(Type::I32)
            .build(ctx);
        ctx.create_op(data)
    }

    #[test]
    fn create_op_registers_uses_and_result() {
        let mut ctx = IrContext::new();
        let block = block_with_args(&mut ctx, vec![Type::I32, Type::I32]);
        let (a, b) = (ctx.block_args(block)[0], ctx.block_args(block)[1]);

        let op = binary(&mut ctx, BinaryOperator::Add, a, a);
        ctx.push_op(block, op);

        assert_eq!(ctx.uses(a).len(), 2);
        assert!(!ctx.has_uses(b));
        let result = ctx.op_result(op).unwrap();
        assert_eq!(ctx.value_def(result), ValueDef::OpResult(op));
        assert_eq!(ctx.value_ty(result), Type::I32);
    }

    #[test]
    fn replace_all_uses_moves_every_operand() {
        let mut ctx = IrContext::new();
        let block = block_with_args(&mut ctx, vec![Type::I32, Type::I32]);
        let (a, b) = (ctx.block_args(block)[0], ctx.block_args(block)[1]);

        let op1 = binary(&mut ctx, BinaryOperator::Sub, a, b);
        let op2 = binary(&mut ctx, BinaryOperator::Xor, a, a);
        ctx.push_op(block, op1);
        ctx.push_op(block, op2);

        let replaced = ctx.replace_all_uses(a, b);
        assert_eq!(replaced, 3);
        assert!(!ctx.has_uses(a));
        assert_eq!(ctx.uses(b).len(), 4);
        assert_eq!(ctx.op_operands(op1), &[b, b]);
        assert_eq!(ctx.op_operands(op2), &[b, b]);
    }

    #[test]
    fn remove_op_clears_operand_uses() {
        let mut ctx = IrContext::new();
        let block = block_with_args(&mut ctx, vec![Type::I32, Type::I32]);
        let (a, b) = (ctx.block_args(block)[0], ctx.block_args(block)[1]);

        let op = binary(&mut ctx, BinaryOperator::Add, a, b);
        ctx.push_op(block, op);
        ctx.remove_op_from_block(block, op);
        ctx.remove_op(op);

        assert!(!ctx.has_uses(a));
        assert!(!ctx.has_uses(b));
        assert!(ctx.block(block).ops.is_empty());
        assert!(!ctx.is_attached(op));
    }

    #[test]
    #[should_panic(expected = "still has 1 use")]
    fn remove_op_refuses_live_results() {
        let mut ctx = IrContext::new();
        let block = block_with_args(&mut ctx, vec![Type::I32]);
        let a = ctx.block_args(block)[0];

        let op1 = binary(&mut ctx, BinaryOperator::Add, a, a);
        let v1 = ctx.op_result(op1).unwrap();
        let op2 = binary(&mut ctx, BinaryOperator::Add, v1, a);
        ctx.push_op(block, op1);
        ctx.push_op(block, op2);

        ctx.remove_op_from_block(block, op1);
        ctx.remove_op(op1);
    }

    #[test]
    fn insert_before_keeps_order() {
        let mut ctx = IrContext::new();
        let block = block_with_args(&mut ctx, vec![Type::I32]);
        let a = ctx.block_args(block)[0];

        let first = binary(&mut ctx, BinaryOperator::Add, a, a);
        let last = binary(&mut ctx, BinaryOperator::Mul, a, a);
        ctx.push_op(block, last);
        ctx.insert_op_before(block, last, first);

        assert_eq!(ctx.block(block).ops.as_slice(), &[first, last]);
        assert_eq!(ctx.op_position(block, last), Some(1));
    }

    #[test]
    fn return_has_no_result_value() {
        let mut ctx = IrContext::new();
        let block = block_with_args(&mut ctx, vec![Type::I32]);
        let a = ctx.block_args(block)[0];

        let data = OperationDataBuilder::new(Opcode::Return).operand(a).build(&mut ctx);
        let ret = ctx.create_op(data);
        ctx.push_op(block, ret);

        assert_eq!(ctx.op_result(ret), None);
        assert_eq!(ctx.uses(a), &[Use { user: ret, operand_index: 0 }]);
        ctx.remove_op_from_block(block, ret);
        ctx.remove_op(ret);
        assert!(!ctx.has_uses(a));
    }

    #[test]
    #[should_panic(expected = "is not in block")]
    fn insert_before_requires_a_linked_anchor() {
        let mut ctx = IrContext::new();
        let block = block_with_args(&mut ctx, vec![Type::I32]);
        let a = ctx.block_args(block)[0];

        let anchor = binary(&mut ctx, BinaryOperator::Add, a, a);
        let op = binary(&mut ctx, BinaryOperator::Mul, a, a);
        ctx.insert_op_before(block, anchor, op);
    }
}
