//! Program well-formedness and use-chain validation.
//!
//! Three kinds of checks:
//!
//! 1. **Dataflow**: every operand refers to a block argument or to the
//!    result of an attached operation placed earlier in the program.
//! 2. **Typing**: operand and result types agree with the opcode, and the
//!    program ends in exactly one `return`.
//! 3. **Use-chain consistency**: the use-chain stored in `IrContext`
//!    exactly matches the actual operands of the program's operations.

use std::collections::HashSet;
use std::fmt;

use derive_more::Display;

use crate::context::IrContext;
use crate::ops::{Opcode, UnaryOperator};
use crate::program::Program;
use crate::refs::{OpRef, ValueDef, ValueRef};
use crate::types::Type;

/// A single well-formedness violation.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
pub enum ValidationError {
    #[display("operand #{operand_index} of {op} uses {value}, which is not defined before it")]
    UseBeforeDef {
        op: OpRef,
        operand_index: usize,
        value: ValueRef,
    },
    #[display("operand #{operand_index} of {op} uses {value}, whose definition was removed")]
    StaleValue {
        op: OpRef,
        operand_index: usize,
        value: ValueRef,
    },
    #[display("{op} (`{opcode}`): {message}")]
    Type {
        op: OpRef,
        opcode: String,
        message: String,
    },
    #[display("{op} is listed in the program but its parent block is {parent}")]
    ParentMismatch { op: OpRef, parent: String },
    #[display("`return` at {_0} is not the last operation")]
    MisplacedReturn(OpRef),
    #[display("program does not end in `return`")]
    MissingReturn,
    #[display("{_0}")]
    UseChain(String),
}

/// Result of validation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), ValidationResult> {
        if self.is_ok() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "validation passed");
        }
        writeln!(f, "{} validation error(s) found:", self.errors.len())?;
        for err in &self.errors {
            writeln!(f, "  - {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationResult {}

// ============================================================================
// Dataflow and typing
// ============================================================================

fn check_dataflow_and_types(ctx: &IrContext, program: &Program, errors: &mut Vec<ValidationError>) {
    let entry = program.entry();
    let mut defined: HashSet<ValueRef> = program.inputs(ctx).iter().copied().collect();
    let ops = program.ops(ctx);

    for (pos, &op) in ops.iter().enumerate() {
        let data = ctx.op(op);
        if data.parent_block != Some(entry) {
            errors.push(ValidationError::ParentMismatch {
                op,
                parent: data
                    .parent_block
                    .map_or_else(|| "unset".to_owned(), |b| b.to_string()),
            });
        }

        for (operand_index, &value) in ctx.op_operands(op).iter().enumerate() {
            if defined.contains(&value) {
                continue;
            }
            let stale = ctx.is_valid_value(value)
                && matches!(ctx.value_def(value), ValueDef::OpResult(def) if !ctx.is_attached(def));
            errors.push(if stale {
                ValidationError::StaleValue {
                    op,
                    operand_index,
                    value,
                }
            } else {
                ValidationError::UseBeforeDef {
                    op,
                    operand_index,
                    value,
                }
            });
        }

        if let Err(message) = check_op_types(ctx, op) {
            errors.push(ValidationError::Type {
                op,
                opcode: data.opcode.mnemonic(),
                message,
            });
        }

        if matches!(data.opcode, Opcode::Return) && pos + 1 != ops.len() {
            errors.push(ValidationError::MisplacedReturn(op));
        }

        if let Some(result) = ctx.op_result(op) {
            defined.insert(result);
        }
    }

    if program.terminator(ctx).is_none() {
        errors.push(ValidationError::MissingReturn);
    }
}

fn check_op_types(ctx: &IrContext, op: OpRef) -> Result<(), String> {
    let data = ctx.op(op);
    let operands = ctx.op_operands(op);
    if let Some(arity) = data.opcode.arity()
        && operands.len() != arity
    {
        return Err(format!("expected {arity} operand(s), found {}", operands.len()));
    }
    if data.opcode.has_result() != data.result_ty.is_some() {
        return Err("result presence does not match the opcode".to_owned());
    }
    let operand_tys: Vec<Type> = operands
        .iter()
        .filter(|&&v| ctx.is_valid_value(v))
        .map(|&v| ctx.value_ty(v))
        .collect();
    if operand_tys.len() != operands.len() {
        return Err("operand refers to an unallocated value".to_owned());
    }
    let result_ty = data.result_ty;

    let ok = match data.opcode {
        Opcode::Const(_) => result_ty.is_some_and(Type::is_int),
        Opcode::FConst(_) => result_ty == Some(Type::F64),
        Opcode::Unary(unary) => {
            let ty = operand_tys[0];
            let numeric = match unary {
                UnaryOperator::BitwiseNot => ty.is_int(),
                UnaryOperator::Neg => ty.is_int() || ty == Type::F64,
            };
            numeric && result_ty == Some(ty)
        }
        Opcode::Binary(binary) => {
            let ty = operand_tys[0];
            let numeric = if binary.is_bitwise() {
                ty.is_int()
            } else {
                ty.is_int() || ty == Type::F64
            };
            numeric && operand_tys[1] == ty && result_ty == Some(ty)
        }
        Opcode::Compare(_) => operand_tys[0] == operand_tys[1] && result_ty == Some(Type::Bool),
        Opcode::Return => true,
    };
    if ok {
        Ok(())
    } else {
        let tys: Vec<String> = operand_tys.iter().map(Type::to_string).collect();
        Err(format!(
            "ill-typed: operands ({}) -> {}",
            tys.join(", "),
            result_ty.map_or_else(|| "none".to_owned(), |t| t.to_string())
        ))
    }
}

// ============================================================================
// Use-chain consistency
// ============================================================================

fn check_use_chains(ctx: &IrContext, program: &Program, errors: &mut Vec<ValidationError>) {
    let ops = program.ops(ctx);

    // Collect all (value, use) pairs from actual operands
    let mut actual_uses: HashSet<(ValueRef, OpRef, u32)> = HashSet::new();
    for &op in &ops {
        for (idx, &operand) in ctx.op_operands(op).iter().enumerate() {
            actual_uses.insert((operand, op, idx as u32));
        }
    }

    // Direction 1: actual operand -> use-chain entry must exist
    for &(val, op, idx) in &actual_uses {
        if !ctx.is_valid_value(val) {
            continue;
        }
        let found = ctx
            .uses(val)
            .iter()
            .any(|u| u.user == op && u.operand_index == idx);
        if !found {
            errors.push(ValidationError::UseChain(format!(
                "operand #{idx} of {op} uses {val} but no use-chain entry exists"
            )));
        }
    }

    // Direction 2: use-chain entry -> actual operand must exist
    let mut checked_values: HashSet<ValueRef> = program.inputs(ctx).iter().copied().collect();
    checked_values.extend(actual_uses.iter().map(|&(val, _, _)| val));
    checked_values.extend(ops.iter().filter_map(|&op| ctx.op_result(op)));
    checked_values.retain(|&v| ctx.is_valid_value(v));

    for &val in &checked_values {
        for u in ctx.uses(val) {
            if !actual_uses.contains(&(val, u.user, u.operand_index)) {
                errors.push(ValidationError::UseChain(format!(
                    "use-chain entry for {val} claims use by {} operand #{}, \
                     but no such operand exists in the program",
                    u.user, u.operand_index
                )));
            }
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Run every check on `program`.
pub fn validate_program(ctx: &IrContext, program: &Program) -> ValidationResult {
    let mut errors = Vec::new();
    check_dataflow_and_types(ctx, program, &mut errors);
    check_use_chains(ctx, program, &mut errors);
    ValidationResult { errors }
}
