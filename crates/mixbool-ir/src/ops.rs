//! Opcodes and operators.
//!
//! Integer semantics are defined here once and shared by the interpreter
//! and by anything that needs to evaluate operators on raw bits.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::types::IntWidth;

/// Binary arithmetic and bitwise operators.
#[derive(
    Clone, Copy, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum BinaryOperator {
    #[display("add")]
    Add,
    #[display("sub")]
    Sub,
    #[display("mul")]
    Mul,
    #[display("div")]
    Div,
    #[display("rem")]
    Rem,
    #[display("and")]
    BitAnd,
    #[display("or")]
    BitOr,
    #[display("xor")]
    Xor,
    #[display("shl")]
    Shl,
    #[display("shr")]
    Shr,
}

impl BinaryOperator {
    pub const ALL: [BinaryOperator; 10] = [
        BinaryOperator::Add,
        BinaryOperator::Sub,
        BinaryOperator::Mul,
        BinaryOperator::Div,
        BinaryOperator::Rem,
        BinaryOperator::BitAnd,
        BinaryOperator::BitOr,
        BinaryOperator::Xor,
        BinaryOperator::Shl,
        BinaryOperator::Shr,
    ];

    /// Infix symbol, as used in template formulas.
    pub const fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Rem => "%",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::Xor => "^",
            BinaryOperator::Shl => "<<",
            BinaryOperator::Shr => ">>",
        }
    }

    pub fn from_mnemonic(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.to_string() == name)
    }

    /// Whether the operator is only defined on integers.
    pub const fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOperator::BitAnd
                | BinaryOperator::BitOr
                | BinaryOperator::Xor
                | BinaryOperator::Shl
                | BinaryOperator::Shr
        )
    }

    /// Evaluate on masked integer bits of the given width.
    ///
    /// Division and remainder are signed and return `None` on a zero
    /// divisor. Shift amounts are taken modulo the width; `shr` is
    /// arithmetic.
    pub fn eval(self, lhs: u64, rhs: u64, width: IntWidth) -> Option<u64> {
        let bits = match self {
            BinaryOperator::Add => lhs.wrapping_add(rhs),
            BinaryOperator::Sub => lhs.wrapping_sub(rhs),
            BinaryOperator::Mul => lhs.wrapping_mul(rhs),
            BinaryOperator::Div | BinaryOperator::Rem => {
                let (l, r) = (width.sign_extend(lhs), width.sign_extend(rhs));
                if r == 0 {
                    return None;
                }
                let value = if self == BinaryOperator::Div {
                    l.wrapping_div(r)
                } else {
                    l.wrapping_rem(r)
                };
                value as u64
            }
            BinaryOperator::BitAnd => lhs & rhs,
            BinaryOperator::BitOr => lhs | rhs,
            BinaryOperator::Xor => lhs ^ rhs,
            BinaryOperator::Shl => lhs << (rhs % u64::from(width.bits())),
            BinaryOperator::Shr => {
                let amount = rhs % u64::from(width.bits());
                (width.sign_extend(lhs) >> amount) as u64
            }
        };
        Some(width.wrap(bits))
    }
}

/// Unary operators.
#[derive(
    Clone, Copy, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum UnaryOperator {
    #[display("not")]
    BitwiseNot,
    #[display("neg")]
    Neg,
}

impl UnaryOperator {
    pub const ALL: [UnaryOperator; 2] = [UnaryOperator::BitwiseNot, UnaryOperator::Neg];

    pub fn from_mnemonic(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.to_string() == name)
    }

    pub fn eval(self, operand: u64, width: IntWidth) -> u64 {
        match self {
            UnaryOperator::BitwiseNot => width.wrap(!operand),
            UnaryOperator::Neg => width.wrap(operand.wrapping_neg()),
        }
    }
}

/// Signed comparisons producing `bool`.
#[derive(
    Clone, Copy, Debug, Display, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Comparator {
    #[display("cmp.eq")]
    Eq,
    #[display("cmp.ne")]
    Ne,
    #[display("cmp.lt")]
    Lt,
    #[display("cmp.le")]
    Le,
    #[display("cmp.gt")]
    Gt,
    #[display("cmp.ge")]
    Ge,
}

impl Comparator {
    pub const ALL: [Comparator; 6] = [
        Comparator::Eq,
        Comparator::Ne,
        Comparator::Lt,
        Comparator::Le,
        Comparator::Gt,
        Comparator::Ge,
    ];

    pub fn from_mnemonic(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.to_string() == name)
    }

    pub fn eval<T: PartialOrd>(self, lhs: T, rhs: T) -> bool {
        match self {
            Comparator::Eq => lhs == rhs,
            Comparator::Ne => lhs != rhs,
            Comparator::Lt => lhs < rhs,
            Comparator::Le => lhs <= rhs,
            Comparator::Gt => lhs > rhs,
            Comparator::Ge => lhs >= rhs,
        }
    }
}

/// Operation kind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Opcode {
    /// Integer literal, stored as bits masked to the result width.
    Const(u64),
    /// Float literal, stored as raw `f64` bits.
    FConst(u64),
    Unary(UnaryOperator),
    Binary(BinaryOperator),
    Compare(Comparator),
    /// Program terminator listing the outputs.
    Return,
}

impl Opcode {
    /// Whether operations with this opcode define a result value.
    pub const fn has_result(&self) -> bool {
        !matches!(self, Opcode::Return)
    }

    /// Expected operand count.
    pub const fn arity(&self) -> Option<usize> {
        match self {
            Opcode::Const(_) | Opcode::FConst(_) => Some(0),
            Opcode::Unary(_) => Some(1),
            Opcode::Binary(_) | Opcode::Compare(_) => Some(2),
            Opcode::Return => None,
        }
    }

    pub fn mnemonic(&self) -> String {
        match self {
            Opcode::Const(_) => "const".to_owned(),
            Opcode::FConst(_) => "fconst".to_owned(),
            Opcode::Unary(op) => op.to_string(),
            Opcode::Binary(op) => op.to_string(),
            Opcode::Compare(cmp) => cmp.to_string(),
            Opcode::Return => "return".to_owned(),
        }
    }
}
