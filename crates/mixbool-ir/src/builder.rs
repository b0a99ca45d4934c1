//! Instruction-stream builder.
//!
//! `ProgramBuilder` appends typed operations at an insertion point: either
//! the end of a block or just before an existing operation. Values used as
//! operands must be adopted first, which checks that they are defined
//! before the insertion point.

use derive_more::{Display, Error};

use crate::context::{IrContext, OperationDataBuilder};
use crate::ops::{BinaryOperator, Comparator, Opcode, UnaryOperator};
use crate::program::Program;
use crate::refs::{BlockRef, OpRef, ValueDef, ValueRef};
use crate::types::Type;

/// Error raised when an emitted operation would be ill-formed.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum BuildError {
    #[display("value {_0} is not defined before the insertion point")]
    NotVisible(#[error(not(source))] ValueRef),
    #[display("operation {_0} is not attached to a block")]
    Detached(#[error(not(source))] OpRef),
    #[display("`{opcode}` expects {expected} operands, found {found}")]
    OperandTypes {
        opcode: String,
        expected: String,
        found: String,
    },
}

/// Where new operations are placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertPoint {
    /// Append at the end of the block.
    End(BlockRef),
    /// Insert immediately before the given (attached) operation.
    Before(BlockRef, OpRef),
}

impl InsertPoint {
    pub fn block(self) -> BlockRef {
        match self {
            InsertPoint::End(block) | InsertPoint::Before(block, _) => block,
        }
    }
}

/// Emits operations at an insertion point and records what it emitted.
pub struct ProgramBuilder<'a> {
    ctx: &'a mut IrContext,
    point: InsertPoint,
    emitted: Vec<OpRef>,
}

impl<'a> ProgramBuilder<'a> {
    /// Builder appending at the end of the program.
    pub fn at_end(ctx: &'a mut IrContext, program: &Program) -> Self {
        Self::new(ctx, InsertPoint::End(program.entry()))
    }

    /// Builder inserting before `op`, which must be attached to a block.
    pub fn before(ctx: &'a mut IrContext, op: OpRef) -> Result<Self, BuildError> {
        let block = ctx.op(op).parent_block.ok_or(BuildError::Detached(op))?;
        Ok(Self::new(ctx, InsertPoint::Before(block, op)))
    }

    pub fn new(ctx: &'a mut IrContext, point: InsertPoint) -> Self {
        Self {
            ctx,
            point,
            emitted: Vec::new(),
        }
    }

    pub fn ctx(&self) -> &IrContext {
        &*self.ctx
    }

    /// Operations emitted so far, in emission order.
    pub fn emitted(&self) -> &[OpRef] {
        &self.emitted
    }

    pub fn into_emitted(self) -> Vec<OpRef> {
        self.emitted
    }

    /// Result of the most recently emitted operation.
    pub fn last_value(&self) -> Option<ValueRef> {
        self.emitted
            .last()
            .and_then(|&op| self.ctx.op_result(op))
    }

    /// Re-reference an existing value for use in newly emitted operations.
    ///
    /// Succeeds only if the value is an argument of the insertion block or
    /// the result of an attached operation placed before the insertion point.
    pub fn adopt(&self, v: ValueRef) -> Result<ValueRef, BuildError> {
        if !self.ctx.is_valid_value(v) {
            return Err(BuildError::NotVisible(v));
        }
        let block = self.point.block();
        let visible = match self.ctx.value_def(v) {
            ValueDef::BlockArg(b, _) => b == block,
            ValueDef::OpResult(def) => {
                let Some(def_pos) = self
                    .ctx
                    .op(def)
                    .parent_block
                    .filter(|&b| b == block)
                    .and_then(|b| self.ctx.op_position(b, def))
                else {
                    return Err(BuildError::NotVisible(v));
                };
                match self.point {
                    InsertPoint::End(_) => true,
                    InsertPoint::Before(_, before) => self
                        .ctx
                        .op_position(block, before)
                        .is_some_and(|pos| def_pos < pos),
                }
            }
        };
        if visible {
            Ok(v)
        } else {
            Err(BuildError::NotVisible(v))
        }
    }

    /// Materialize an integer literal of the given integer type.
    pub fn load_int(&mut self, ty: Type, value: i64) -> Result<ValueRef, BuildError> {
        let width = ty.int_width().ok_or_else(|| BuildError::OperandTypes {
            opcode: "const".to_owned(),
            expected: "an integer result type".to_owned(),
            found: ty.to_string(),
        })?;
        let op = self.emit(
            OperationDataBuilder::new(Opcode::Const(width.from_i64(value))).result(ty),
        );
        Ok(self.result_of(op))
    }

    /// Materialize a float literal.
    pub fn load_float(&mut self, value: f64) -> ValueRef {
        let op = self
            .emit(OperationDataBuilder::new(Opcode::FConst(value.to_bits())).result(Type::F64));
        self.result_of(op)
    }

    pub fn unary(&mut self, op: UnaryOperator, operand: ValueRef) -> Result<ValueRef, BuildError> {
        let ty = self.ctx.value_ty(operand);
        let ok = match op {
            UnaryOperator::BitwiseNot => ty.is_int(),
            UnaryOperator::Neg => ty.is_int() || ty == Type::F64,
        };
        if !ok {
            return Err(BuildError::OperandTypes {
                opcode: op.to_string(),
                expected: "a numeric".to_owned(),
                found: ty.to_string(),
            });
        }
        let new_op = self.emit(
            OperationDataBuilder::new(Opcode::Unary(op))
                .operand(operand)
                .result(ty),
        );
        Ok(self.result_of(new_op))
    }

    pub fn binary(
        &mut self,
        op: BinaryOperator,
        lhs: ValueRef,
        rhs: ValueRef,
    ) -> Result<ValueRef, BuildError> {
        let ty = self.check_same_type(&op.to_string(), lhs, rhs)?;
        let ok = if op.is_bitwise() {
            ty.is_int()
        } else {
            ty.is_int() || ty == Type::F64
        };
        if !ok {
            return Err(BuildError::OperandTypes {
                opcode: op.to_string(),
                expected: if op.is_bitwise() { "integer" } else { "numeric" }.to_owned(),
                found: ty.to_string(),
            });
        }
        let new_op = self.emit(
            OperationDataBuilder::new(Opcode::Binary(op))
                .operands([lhs, rhs])
                .result(ty),
        );
        Ok(self.result_of(new_op))
    }

    pub fn compare(
        &mut self,
        cmp: Comparator,
        lhs: ValueRef,
        rhs: ValueRef,
    ) -> Result<ValueRef, BuildError> {
        self.check_same_type(&cmp.to_string(), lhs, rhs)?;
        let new_op = self.emit(
            OperationDataBuilder::new(Opcode::Compare(cmp))
                .operands([lhs, rhs])
                .result(Type::Bool),
        );
        Ok(self.result_of(new_op))
    }

    /// Emit the program terminator.
    pub fn ret(&mut self, values: impl IntoIterator<Item = ValueRef>) -> OpRef {
        self.emit(OperationDataBuilder::new(Opcode::Return).operands(values))
    }

    fn check_same_type(
        &self,
        opcode: &str,
        lhs: ValueRef,
        rhs: ValueRef,
    ) -> Result<Type, BuildError> {
        let (lt, rt) = (self.ctx.value_ty(lhs), self.ctx.value_ty(rhs));
        if lt != rt {
            return Err(BuildError::OperandTypes {
                opcode: opcode.to_owned(),
                expected: "two same-typed".to_owned(),
                found: format!("{lt} and {rt}"),
            });
        }
        Ok(lt)
    }

    fn emit(&mut self, builder: OperationDataBuilder) -> OpRef {
        let data = builder.build(self.ctx);
        let op = self.ctx.create_op(data);
        match self.point {
            InsertPoint::End(block) => self.ctx.push_op(block, op),
            InsertPoint::Before(block, before) => self.ctx.insert_op_before(block, before, op),
        }
        self.emitted.push(op);
        op
    }

    fn result_of(&self, op: OpRef) -> ValueRef {
        self.ctx
            .op_result(op)
            .expect("value-producing opcode always allocates a result")
    }
}
