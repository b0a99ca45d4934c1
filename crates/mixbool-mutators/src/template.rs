//! Rewrite templates.
//!
//! A template is a straight-line recipe over the two operands of the
//! original instruction. Each step applies one operator to `x`, `y`, an
//! integer literal, or the result of an earlier step; the last step yields
//! the replacement value.

use derive_more::{Display, Error};
use mixbool_ir::{BinaryOperator, IntWidth, UnaryOperator};
use smallvec::SmallVec;

/// Input to a template step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Left operand of the rewritten instruction.
    X,
    /// Right operand of the rewritten instruction.
    Y,
    /// Integer literal, wrapped to the operand width when materialized.
    Lit(i64),
    /// Result of the step at this index.
    Tmp(usize),
}

/// One emitted instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Step {
    Unary(UnaryOperator, Operand),
    Binary(BinaryOperator, Operand, Operand),
}

impl Step {
    pub fn operands(&self) -> SmallVec<[Operand; 2]> {
        match *self {
            Step::Unary(_, a) => SmallVec::from_slice(&[a]),
            Step::Binary(_, a, b) => SmallVec::from_slice(&[a, b]),
        }
    }
}

/// Operators a template step may use.
const STEP_BINARY_OPERATORS: [BinaryOperator; 6] = [
    BinaryOperator::Add,
    BinaryOperator::Sub,
    BinaryOperator::Mul,
    BinaryOperator::BitAnd,
    BinaryOperator::BitOr,
    BinaryOperator::Xor,
];

/// Structural defect in a template.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[display("template `{_0}` has no steps")]
    Empty(#[error(not(source))] &'static str),
    #[display("step {step} of `{formula}` reads step {read}, which is not computed yet")]
    ForwardReference {
        formula: &'static str,
        step: usize,
        read: usize,
    },
    #[display("step {step} of `{formula}` uses `{operator}`, which templates may not emit")]
    ForbiddenOperator {
        formula: &'static str,
        step: usize,
        operator: String,
    },
}

/// A cataloged rewrite: a human-readable formula and the steps computing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Template {
    formula: &'static str,
    steps: &'static [Step],
}

impl Template {
    pub const fn new(formula: &'static str, steps: &'static [Step]) -> Self {
        Self { formula, steps }
    }

    /// The identity in infix notation over `x` and `y`.
    pub fn formula(&self) -> &'static str {
        self.formula
    }

    pub fn steps(&self) -> &'static [Step] {
        self.steps
    }

    /// Number of literal operands; each becomes its own `const` instruction.
    pub fn literal_count(&self) -> usize {
        self.steps
            .iter()
            .flat_map(Step::operands)
            .filter(|operand| matches!(operand, Operand::Lit(_)))
            .count()
    }

    /// Instructions appended when this template is applied.
    pub fn instruction_count(&self) -> usize {
        self.steps.len() + self.literal_count()
    }

    /// Check that the steps form a well-ordered, integer-only recipe.
    pub fn check_shape(&self) -> Result<(), TemplateError> {
        if self.steps.is_empty() {
            return Err(TemplateError::Empty(self.formula));
        }
        for (step, s) in self.steps.iter().enumerate() {
            match *s {
                Step::Unary(UnaryOperator::BitwiseNot, _) => {}
                Step::Unary(op, _) => {
                    return Err(TemplateError::ForbiddenOperator {
                        formula: self.formula,
                        step,
                        operator: op.to_string(),
                    });
                }
                Step::Binary(op, _, _) if !STEP_BINARY_OPERATORS.contains(&op) => {
                    return Err(TemplateError::ForbiddenOperator {
                        formula: self.formula,
                        step,
                        operator: op.to_string(),
                    });
                }
                Step::Binary(..) => {}
            }
            for operand in s.operands() {
                if let Operand::Tmp(read) = operand
                    && read >= step
                {
                    return Err(TemplateError::ForwardReference {
                        formula: self.formula,
                        step,
                        read,
                    });
                }
            }
        }
        Ok(())
    }

    /// Evaluate the template on raw integer bits of the given width.
    ///
    /// This is the reference semantics the emitted instructions must match.
    /// Returns `None` only for malformed templates.
    pub fn evaluate(&self, x: u64, y: u64, width: IntWidth) -> Option<u64> {
        let mut temps: SmallVec<[u64; 12]> = SmallVec::with_capacity(self.steps.len());
        let read = |operand: Operand, temps: &[u64]| match operand {
            Operand::X => Some(width.wrap(x)),
            Operand::Y => Some(width.wrap(y)),
            Operand::Lit(value) => Some(width.from_i64(value)),
            Operand::Tmp(index) => temps.get(index).copied(),
        };
        for step in self.steps {
            let value = match *step {
                Step::Unary(op, a) => op.eval(read(a, temps.as_slice())?, width),
                Step::Binary(op, a, b) => {
                    op.eval(read(a, temps.as_slice())?, read(b, temps.as_slice())?, width)?
                }
            };
            temps.push(value);
        }
        temps.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::Operand::{Lit, Tmp as T, X, Y};
    use mixbool_ir::BinaryOperator::{Add, Div, Sub};
    use mixbool_ir::UnaryOperator::{BitwiseNot as Not, Neg};

    const SUB_VIA_NOT: Template = Template::new(
        "x + ~y + 1",
        &[Step::Unary(Not, Y), Step::Binary(Add, X, T(0)), Step::Binary(Add, T(1), Lit(1))],
    );

    #[test]
    fn counts_steps_and_literals() {
        assert_eq!(SUB_VIA_NOT.steps().len(), 3);
        assert_eq!(SUB_VIA_NOT.literal_count(), 1);
        assert_eq!(SUB_VIA_NOT.instruction_count(), 4);
        assert_eq!(SUB_VIA_NOT.check_shape(), Ok(()));
    }

    #[test]
    fn evaluates_with_wraparound() {
        let w = IntWidth::W8;
        assert_eq!(SUB_VIA_NOT.evaluate(5, 3, w), Some(2));
        assert_eq!(SUB_VIA_NOT.evaluate(3, 5, w), Some(w.from_i64(-2)));
        assert_eq!(SUB_VIA_NOT.evaluate(0, 0x80, w), Some(0x80));
        assert_eq!(
            SUB_VIA_NOT.evaluate(1, 2, IntWidth::W64),
            Some(u64::MAX)
        );
    }

    #[test]
    fn rejects_malformed_shapes() {
        let empty = Template::new("x", &[]);
        assert_eq!(empty.check_shape(), Err(TemplateError::Empty("x")));
        assert_eq!(empty.evaluate(1, 2, IntWidth::W8), None);

        let forward = Template::new("?", &[Step::Binary(Sub, X, T(0))]);
        assert!(matches!(
            forward.check_shape(),
            Err(TemplateError::ForwardReference { step: 0, read: 0, .. })
        ));
        assert_eq!(forward.evaluate(1, 2, IntWidth::W8), None);

        let div = Template::new("x / y", &[Step::Binary(Div, X, Y)]);
        assert!(matches!(
            div.check_shape(),
            Err(TemplateError::ForbiddenOperator { .. })
        ));
        let neg = Template::new("-x", &[Step::Unary(Neg, X)]);
        assert!(neg.check_shape().is_err());
    }
}
