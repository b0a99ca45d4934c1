//! Reference interpreter.
//!
//! Executes a program on concrete inputs. Used to check that rewrites
//! preserve observable behavior, so integer semantics come straight from
//! [`BinaryOperator::eval`] and [`UnaryOperator::eval`].

use std::collections::HashMap;
use std::fmt;

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};

use crate::context::IrContext;
use crate::ops::{BinaryOperator, Opcode, UnaryOperator};
use crate::program::Program;
use crate::refs::{OpRef, ValueRef};
use crate::types::{IntWidth, Type};

/// A runtime value.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum Value {
    /// Integer bits, masked to the width.
    Int(IntWidth, u64),
    Float(f64),
    Bool(bool),
}

impl Value {
    /// Integer value of the given type, wrapping `value` to its width.
    pub fn int(ty: Type, value: i64) -> Option<Value> {
        let width = ty.int_width()?;
        Some(Value::Int(width, width.from_i64(value)))
    }

    pub fn ty(&self) -> Type {
        match self {
            Value::Int(width, _) => Type::int(*width),
            Value::Float(_) => Type::F64,
            Value::Bool(_) => Type::Bool,
        }
    }

    /// Signed interpretation of an integer value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(width, bits) => Some(width.sign_extend(*bits)),
            _ => None,
        }
    }

    /// Parse a value of type `ty` from text (`-3`, `0x7f`, `1.5`, `true`).
    ///
    /// Decimal integers must lie in the signed range of the type, as `const`
    /// literals do. Unsigned hex is a bit pattern and must fit the width.
    pub fn parse(ty: Type, text: &str) -> Option<Value> {
        match ty {
            Type::Bool => text.parse().ok().map(Value::Bool),
            Type::F64 => text.parse().ok().map(Value::Float),
            _ => {
                let width = ty.int_width()?;
                let (negative, digits) = match text.strip_prefix('-') {
                    Some(rest) => (true, rest),
                    None => (false, text),
                };
                let (hex, magnitude) = match digits.strip_prefix("0x") {
                    Some(hex) => (true, u64::from_str_radix(hex, 16).ok()?),
                    None => (false, digits.parse::<u64>().ok()?),
                };
                if hex && !negative {
                    return (magnitude <= width.mask()).then_some(Value::Int(width, magnitude));
                }
                let value = if negative {
                    0i64.checked_sub_unsigned(magnitude)?
                } else {
                    i64::try_from(magnitude).ok()?
                };
                let bits = width.from_i64(value);
                (width.sign_extend(bits) == value).then_some(Value::Int(width, bits))
            }
        }
    }
}

impl PartialEq for Value {
    /// Floats compare by bit pattern so that `NaN` results still match.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(w1, b1), Value::Int(w2, b2)) => w1 == w2 && b1 == b2,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(width, bits) => write!(f, "{}", width.sign_extend(*bits)),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Runtime failure while executing a program.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum EvalError {
    #[display("program expects {expected} argument(s), got {found}")]
    ArgumentCount { expected: usize, found: usize },
    #[display("argument {index} should be {expected}, got {found}")]
    ArgumentType {
        index: usize,
        expected: Type,
        found: Type,
    },
    #[display("division by zero in {_0}")]
    DivisionByZero(#[error(not(source))] OpRef),
    #[display("operands of {_0} have unsupported types")]
    TypeMismatch(#[error(not(source))] OpRef),
    #[display("value {_0} is used before it is defined")]
    Undefined(#[error(not(source))] ValueRef),
    #[display("program ends without `return`")]
    MissingReturn,
}

/// Run `program` on `args` and return the values passed to `return`.
pub fn run_program(
    ctx: &IrContext,
    program: &Program,
    args: &[Value],
) -> Result<Vec<Value>, EvalError> {
    let inputs = program.inputs(ctx);
    if inputs.len() != args.len() {
        return Err(EvalError::ArgumentCount {
            expected: inputs.len(),
            found: args.len(),
        });
    }

    let mut env: HashMap<ValueRef, Value> = HashMap::with_capacity(program.len(ctx) + args.len());
    for (index, (&input, &arg)) in inputs.iter().zip(args).enumerate() {
        let expected = ctx.value_ty(input);
        if arg.ty() != expected {
            return Err(EvalError::ArgumentType {
                index,
                expected,
                found: arg.ty(),
            });
        }
        env.insert(input, arg);
    }

    let lookup = |env: &HashMap<ValueRef, Value>, v: ValueRef| {
        env.get(&v).copied().ok_or(EvalError::Undefined(v))
    };

    for op in program.ops(ctx) {
        let data = ctx.op(op);
        let operands = ctx.op_operands(op);
        let value = match data.opcode {
            Opcode::Const(bits) => {
                let width = data
                    .result_ty
                    .and_then(Type::int_width)
                    .ok_or(EvalError::TypeMismatch(op))?;
                Value::Int(width, width.wrap(bits))
            }
            Opcode::FConst(bits) => Value::Float(f64::from_bits(bits)),
            Opcode::Unary(unary) => {
                let operand = lookup(&env, operands[0])?;
                eval_unary(op, unary, operand)?
            }
            Opcode::Binary(binary) => {
                let lhs = lookup(&env, operands[0])?;
                let rhs = lookup(&env, operands[1])?;
                eval_binary(op, binary, lhs, rhs)?
            }
            Opcode::Compare(cmp) => {
                let lhs = lookup(&env, operands[0])?;
                let rhs = lookup(&env, operands[1])?;
                let result = match (lhs, rhs) {
                    (Value::Int(w1, a), Value::Int(w2, b)) if w1 == w2 => {
                        cmp.eval(w1.sign_extend(a), w2.sign_extend(b))
                    }
                    (Value::Float(a), Value::Float(b)) => cmp.eval(a, b),
                    (Value::Bool(a), Value::Bool(b)) => cmp.eval(a, b),
                    _ => return Err(EvalError::TypeMismatch(op)),
                };
                Value::Bool(result)
            }
            Opcode::Return => {
                return operands.iter().map(|&v| lookup(&env, v)).collect();
            }
        };
        if let Some(result) = ctx.op_result(op) {
            env.insert(result, value);
        }
    }

    Err(EvalError::MissingReturn)
}

fn eval_unary(op: OpRef, unary: UnaryOperator, operand: Value) -> Result<Value, EvalError> {
    match (unary, operand) {
        (_, Value::Int(width, bits)) => Ok(Value::Int(width, unary.eval(bits, width))),
        (UnaryOperator::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        _ => Err(EvalError::TypeMismatch(op)),
    }
}

fn eval_binary(
    op: OpRef,
    binary: BinaryOperator,
    lhs: Value,
    rhs: Value,
) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Int(w1, a), Value::Int(w2, b)) if w1 == w2 => binary
            .eval(a, b, w1)
            .map(|bits| Value::Int(w1, bits))
            .ok_or(EvalError::DivisionByZero(op)),
        (Value::Float(a), Value::Float(b)) => {
            let x = match binary {
                BinaryOperator::Add => a + b,
                BinaryOperator::Sub => a - b,
                BinaryOperator::Mul => a * b,
                BinaryOperator::Div => a / b,
                BinaryOperator::Rem => a % b,
                _ => return Err(EvalError::TypeMismatch(op)),
            };
            Ok(Value::Float(x))
        }
        _ => Err(EvalError::TypeMismatch(op)),
    }
}
