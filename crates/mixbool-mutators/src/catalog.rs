//! Template catalog.
//!
//! Maps each supported operator to an ordered list of identities. Every
//! entry is a linear MBA identity: it holds at every width exactly when it
//! holds on the bitwise truth table, which the exhaustive 8-bit test below
//! covers.

use std::collections::BTreeMap;
use std::fmt;

use mixbool_ir::{BinaryOperator, IntWidth};

use crate::template::Operand::{Lit, Tmp as T, X, Y};
use crate::template::Step::{Binary, Unary};
use crate::template::{Template, TemplateError};
use mixbool_ir::BinaryOperator::{Add, BitAnd, BitOr, Mul, Sub, Xor};
use mixbool_ir::UnaryOperator::BitwiseNot as Not;

// x - y
const SUB: &[Template] = &[
    Template::new(
        "x + ~y + 1",
        &[
            Unary(Not, Y),
            Binary(Add, X, T(0)),
            Binary(Add, T(1), Lit(1)),
        ],
    ),
    Template::new(
        "(x ^ y) + 2*(x | ~y) + 2",
        &[
            Binary(Xor, X, Y),
            Unary(Not, Y),
            Binary(BitOr, X, T(1)),
            Binary(Mul, Lit(2), T(2)),
            Binary(Add, T(0), T(3)),
            Binary(Add, T(4), Lit(2)),
        ],
    ),
    Template::new(
        "(x & ~y) - (~x & y)",
        &[
            Unary(Not, Y),
            Binary(BitAnd, X, T(0)),
            Unary(Not, X),
            Binary(BitAnd, T(2), Y),
            Binary(Sub, T(1), T(3)),
        ],
    ),
    Template::new(
        "(x ^ y) - 2*(~x & y)",
        &[
            Binary(Xor, X, Y),
            Unary(Not, X),
            Binary(BitAnd, T(1), Y),
            Binary(Mul, Lit(2), T(2)),
            Binary(Sub, T(0), T(3)),
        ],
    ),
];

// x ^ y
const XOR: &[Template] = &[
    Template::new(
        "(x | y) - y + (~x & y)",
        &[
            Unary(Not, X),
            Binary(BitOr, X, Y),
            Binary(BitAnd, T(0), Y),
            Binary(Sub, T(1), Y),
            Binary(Add, T(3), T(2)),
        ],
    ),
    Template::new(
        "(x | y) - (~x | y) + ~x",
        &[
            Binary(BitOr, X, Y),
            Unary(Not, X),
            Binary(BitOr, T(1), Y),
            Binary(Sub, T(0), T(2)),
            Binary(Add, T(3), T(1)),
        ],
    ),
    Template::new(
        "-(~x | y) + (~x & y) - 1",
        &[
            Unary(Not, X),
            Binary(BitOr, T(0), Y),
            Binary(BitAnd, T(0), Y),
            Binary(Sub, T(2), T(1)),
            Binary(Sub, T(3), Lit(1)),
        ],
    ),
    Template::new(
        "2*(x | y) - y - x",
        &[
            Binary(BitOr, X, Y),
            Binary(Mul, Lit(2), T(0)),
            Binary(Sub, T(1), Y),
            Binary(Sub, T(2), X),
        ],
    ),
    Template::new(
        "-(~x | y) - (x | ~y) - 2",
        &[
            Unary(Not, X),
            Binary(BitOr, T(0), Y),
            Binary(Sub, Lit(0), T(1)),
            Unary(Not, Y),
            Binary(BitOr, X, T(3)),
            Binary(Sub, T(2), T(4)),
            Binary(Sub, T(5), Lit(2)),
        ],
    ),
    Template::new(
        "-y + 2*(~x & y) + x",
        &[
            Unary(Not, X),
            Binary(BitAnd, T(0), Y),
            Binary(Mul, Lit(2), T(1)),
            Binary(Sub, T(2), Y),
            Binary(Add, T(3), X),
        ],
    ),
    Template::new(
        "x - y - 2*(x | ~y) - 2",
        &[
            Binary(Sub, X, Y),
            Unary(Not, Y),
            Binary(BitOr, X, T(1)),
            Binary(Mul, Lit(2), T(2)),
            Binary(Sub, T(0), T(3)),
            Binary(Sub, T(4), Lit(2)),
        ],
    ),
    Template::new(
        "-(~x | y) + 2*(~x & y) + (x | ~y)",
        &[
            Unary(Not, X),
            Binary(BitOr, T(0), Y),
            Binary(BitAnd, T(0), Y),
            Binary(Mul, Lit(2), T(2)),
            Binary(Sub, T(3), T(1)),
            Unary(Not, Y),
            Binary(BitOr, X, T(5)),
            Binary(Add, T(4), T(6)),
        ],
    ),
    Template::new(
        "y + (x & ~y) - (x & y)",
        &[
            Unary(Not, Y),
            Binary(BitAnd, X, T(0)),
            Binary(Add, Y, T(1)),
            Binary(BitAnd, X, Y),
            Binary(Sub, T(2), T(3)),
        ],
    ),
    Template::new(
        "y + ~y - ~(x ^ y)",
        &[
            Unary(Not, Y),
            Binary(Add, Y, T(0)),
            Binary(Xor, X, Y),
            Unary(Not, T(2)),
            Binary(Sub, T(1), T(3)),
        ],
    ),
    Template::new(
        "(x | ~y) + (~x | y) - 2*~(x | y) - 2*(x & y)",
        &[
            Unary(Not, Y),
            Binary(BitOr, X, T(0)),
            Unary(Not, X),
            Binary(BitOr, T(2), Y),
            Binary(Add, T(1), T(3)),
            Binary(BitOr, X, Y),
            Unary(Not, T(5)),
            Binary(Mul, Lit(2), T(6)),
            Binary(Sub, T(4), T(7)),
            Binary(BitAnd, X, Y),
            Binary(Mul, Lit(2), T(9)),
            Binary(Sub, T(8), T(10)),
        ],
    ),
    Template::new(
        "(x | ~y) - 3*~(x | y) + 2*~x - y",
        &[
            Unary(Not, Y),
            Binary(BitOr, X, T(0)),
            Binary(BitOr, X, Y),
            Unary(Not, T(2)),
            Binary(Mul, Lit(3), T(3)),
            Binary(Sub, T(1), T(4)),
            Unary(Not, X),
            Binary(Mul, Lit(2), T(6)),
            Binary(Add, T(5), T(7)),
            Binary(Sub, T(8), Y),
        ],
    ),
    Template::new(
        "(~x | y) + (x & ~y) - ~(x ^ y)",
        &[
            Unary(Not, X),
            Binary(BitOr, T(0), Y),
            Unary(Not, Y),
            Binary(BitAnd, X, T(2)),
            Binary(Add, T(1), T(3)),
            Binary(Xor, X, Y),
            Unary(Not, T(5)),
            Binary(Sub, T(4), T(6)),
        ],
    ),
    Template::new(
        "-(x | ~y) + (~x | y) - 2*~(x | y) + 2*~y",
        &[
            Unary(Not, Y),
            Binary(BitOr, X, T(0)),
            Unary(Not, X),
            Binary(BitOr, T(2), Y),
            Binary(Sub, T(3), T(1)),
            Binary(BitOr, X, Y),
            Unary(Not, T(5)),
            Binary(Mul, Lit(2), T(6)),
            Binary(Sub, T(4), T(7)),
            Binary(Mul, Lit(2), T(0)),
            Binary(Add, T(8), T(9)),
        ],
    ),
    Template::new(
        "-(x | ~y) + ~y + (x & ~y) + y",
        &[
            Unary(Not, Y),
            Binary(BitOr, X, T(0)),
            Binary(Sub, T(0), T(1)),
            Binary(BitAnd, X, T(0)),
            Binary(Add, T(2), T(3)),
            Binary(Add, T(4), Y),
        ],
    ),
];

// x + y
const ADD: &[Template] = &[
    Template::new(
        "(x | y) + y - (~x & y)",
        &[
            Binary(BitOr, X, Y),
            Binary(Add, T(0), Y),
            Unary(Not, X),
            Binary(BitAnd, T(2), Y),
            Binary(Sub, T(1), T(3)),
        ],
    ),
    Template::new(
        "(x | y) + (~x | y) - ~x",
        &[
            Binary(BitOr, X, Y),
            Unary(Not, X),
            Binary(BitOr, T(1), Y),
            Binary(Add, T(0), T(2)),
            Binary(Sub, T(3), T(1)),
        ],
    ),
    Template::new(
        "y - ~x - 1",
        &[
            Unary(Not, X),
            Binary(Sub, Y, T(0)),
            Binary(Sub, T(1), Lit(1)),
        ],
    ),
    Template::new(
        "2*(x | y) - (~x & y) - (x & ~y)",
        &[
            Binary(BitOr, X, Y),
            Binary(Mul, Lit(2), T(0)),
            Unary(Not, X),
            Binary(BitAnd, T(2), Y),
            Binary(Sub, T(1), T(3)),
            Unary(Not, Y),
            Binary(BitAnd, X, T(5)),
            Binary(Sub, T(4), T(6)),
        ],
    ),
    Template::new(
        "-~x - ~y - 2",
        &[
            Unary(Not, X),
            Binary(Sub, Lit(0), T(0)),
            Unary(Not, Y),
            Binary(Sub, T(1), T(2)),
            Binary(Sub, T(3), Lit(2)),
        ],
    ),
    Template::new(
        "(x ^ y) + 2*y - 2*(~x & y)",
        &[
            Binary(Xor, X, Y),
            Binary(Mul, Lit(2), Y),
            Binary(Add, T(0), T(1)),
            Unary(Not, X),
            Binary(BitAnd, T(3), Y),
            Binary(Mul, Lit(2), T(4)),
            Binary(Sub, T(2), T(5)),
        ],
    ),
    Template::new(
        "(x ^ y) + 2*(~x | y) - 2*~x",
        &[
            Binary(Xor, X, Y),
            Unary(Not, X),
            Binary(BitOr, T(1), Y),
            Binary(Mul, Lit(2), T(2)),
            Binary(Add, T(0), T(3)),
            Binary(Mul, Lit(2), T(1)),
            Binary(Sub, T(4), T(5)),
        ],
    ),
    Template::new(
        "-(x ^ y) + 2*y + 2*(x & ~y)",
        &[
            Binary(Xor, X, Y),
            Binary(Mul, Lit(2), Y),
            Binary(Sub, T(1), T(0)),
            Unary(Not, Y),
            Binary(BitAnd, X, T(3)),
            Binary(Mul, Lit(2), T(4)),
            Binary(Add, T(2), T(5)),
        ],
    ),
    Template::new(
        "y + (x & ~y) + (x & y)",
        &[
            Unary(Not, Y),
            Binary(BitAnd, X, T(0)),
            Binary(Add, Y, T(1)),
            Binary(BitAnd, X, Y),
            Binary(Add, T(2), T(3)),
        ],
    ),
    Template::new(
        "(~x & y) + (x & ~y) + 2*(x & y)",
        &[
            Unary(Not, X),
            Binary(BitAnd, T(0), Y),
            Unary(Not, Y),
            Binary(BitAnd, X, T(2)),
            Binary(Add, T(1), T(3)),
            Binary(BitAnd, X, Y),
            Binary(Mul, Lit(2), T(5)),
            Binary(Add, T(4), T(6)),
        ],
    ),
    Template::new(
        "2*y - ~x + ~y",
        &[
            Binary(Mul, Lit(2), Y),
            Unary(Not, X),
            Binary(Sub, T(0), T(1)),
            Unary(Not, Y),
            Binary(Add, T(2), T(3)),
        ],
    ),
    Template::new(
        "-(x | ~y) - ~x + (x & y) - 2",
        &[
            Unary(Not, Y),
            Binary(BitOr, X, T(0)),
            Binary(Sub, Lit(0), T(1)),
            Unary(Not, X),
            Binary(Sub, T(2), T(3)),
            Binary(BitAnd, X, Y),
            Binary(Add, T(4), T(5)),
            Binary(Sub, T(6), Lit(2)),
        ],
    ),
    Template::new(
        "2*y - (~x & y) + (x & ~y)",
        &[
            Binary(Mul, Lit(2), Y),
            Unary(Not, X),
            Binary(BitAnd, T(1), Y),
            Binary(Sub, T(0), T(2)),
            Unary(Not, Y),
            Binary(BitAnd, X, T(4)),
            Binary(Add, T(3), T(5)),
        ],
    ),
    Template::new(
        "3*(x | ~y) + (~x | y) - 2*~y - 2*~(x ^ y)",
        &[
            Unary(Not, Y),
            Binary(BitOr, X, T(0)),
            Binary(Mul, Lit(3), T(1)),
            Unary(Not, X),
            Binary(BitOr, T(3), Y),
            Binary(Add, T(2), T(4)),
            Binary(Mul, Lit(2), T(0)),
            Binary(Sub, T(5), T(6)),
            Binary(Xor, X, Y),
            Unary(Not, T(8)),
            Binary(Mul, Lit(2), T(9)),
            Binary(Sub, T(7), T(10)),
        ],
    ),
    Template::new(
        "(x | ~y) + (~x & y) - ~(x & y) + (x | y)",
        &[
            Unary(Not, Y),
            Binary(BitOr, X, T(0)),
            Unary(Not, X),
            Binary(BitAnd, T(2), Y),
            Binary(Add, T(1), T(3)),
            Binary(BitAnd, X, Y),
            Unary(Not, T(5)),
            Binary(Sub, T(4), T(6)),
            Binary(BitOr, X, Y),
            Binary(Add, T(7), T(8)),
        ],
    ),
    Template::new(
        "2*~(x ^ y) + 3*(~x & y) + 3*(x & ~y) - 2*~(x & y)",
        &[
            Binary(Xor, X, Y),
            Unary(Not, T(0)),
            Binary(Mul, Lit(2), T(1)),
            Unary(Not, X),
            Binary(BitAnd, T(3), Y),
            Binary(Mul, Lit(3), T(4)),
            Binary(Add, T(2), T(5)),
            Unary(Not, Y),
            Binary(BitAnd, X, T(7)),
            Binary(Mul, Lit(3), T(8)),
            Binary(Add, T(6), T(9)),
            Binary(BitAnd, X, Y),
            Unary(Not, T(11)),
            Binary(Mul, Lit(2), T(12)),
            Binary(Sub, T(10), T(13)),
        ],
    ),
];

// x & y
const BIT_AND: &[Template] = &[
    Template::new(
        "-(x | y) + x + y",
        &[
            Binary(BitOr, X, Y),
            Binary(Sub, X, T(0)),
            Binary(Add, T(1), Y),
        ],
    ),
    Template::new(
        "(x | ~y) + y + 1",
        &[
            Unary(Not, Y),
            Binary(BitOr, X, T(0)),
            Binary(Add, T(1), Y),
            Binary(Add, T(2), Lit(1)),
        ],
    ),
    Template::new(
        "(x | y) - (~x & y) - (x & ~y)",
        &[
            Binary(BitOr, X, Y),
            Unary(Not, X),
            Binary(BitAnd, T(1), Y),
            Binary(Sub, T(0), T(2)),
            Unary(Not, Y),
            Binary(BitAnd, X, T(4)),
            Binary(Sub, T(3), T(5)),
        ],
    ),
    Template::new(
        "-(~x & y) - ~y - 1",
        &[
            Unary(Not, X),
            Binary(BitAnd, T(0), Y),
            Binary(Sub, Lit(0), T(1)),
            Unary(Not, Y),
            Binary(Sub, T(2), T(3)),
            Binary(Sub, T(4), Lit(1)),
        ],
    ),
    Template::new(
        "-(x ^ y) + y + (x & ~y)",
        &[
            Binary(Xor, X, Y),
            Binary(Sub, Y, T(0)),
            Unary(Not, Y),
            Binary(BitAnd, X, T(2)),
            Binary(Add, T(1), T(3)),
        ],
    ),
    Template::new(
        "-~(x & y) + y + ~y",
        &[
            Binary(BitAnd, X, Y),
            Unary(Not, T(0)),
            Binary(Sub, Y, T(1)),
            Unary(Not, Y),
            Binary(Add, T(2), T(3)),
        ],
    ),
    Template::new(
        "-~(x & y) + (~x | y) + (x & ~y)",
        &[
            Binary(BitAnd, X, Y),
            Unary(Not, T(0)),
            Unary(Not, X),
            Binary(BitOr, T(2), Y),
            Binary(Sub, T(3), T(1)),
            Unary(Not, Y),
            Binary(BitAnd, X, T(5)),
            Binary(Add, T(4), T(6)),
        ],
    ),
];

// x | y
const BIT_OR: &[Template] = &[
    Template::new(
        "(x ^ y) + y - (~x & y)",
        &[
            Binary(Xor, X, Y),
            Binary(Add, T(0), Y),
            Unary(Not, X),
            Binary(BitAnd, T(2), Y),
            Binary(Sub, T(1), T(3)),
        ],
    ),
    Template::new(
        "(x ^ y) + (~x | y) - ~x",
        &[
            Binary(Xor, X, Y),
            Unary(Not, X),
            Binary(BitOr, T(1), Y),
            Binary(Add, T(0), T(2)),
            Binary(Sub, T(3), T(1)),
        ],
    ),
    Template::new(
        "~(x & y) + y - ~x",
        &[
            Binary(BitAnd, X, Y),
            Unary(Not, T(0)),
            Binary(Add, T(1), Y),
            Unary(Not, X),
            Binary(Sub, T(2), T(3)),
        ],
    ),
    Template::new(
        "x + y - (x & y)",
        &[
            Binary(Add, X, Y),
            Binary(BitAnd, X, Y),
            Binary(Sub, T(0), T(1)),
        ],
    ),
    Template::new(
        "y + (x | ~y) - ~(x ^ y)",
        &[
            Unary(Not, Y),
            Binary(BitOr, X, T(0)),
            Binary(Add, Y, T(1)),
            Binary(Xor, X, Y),
            Unary(Not, T(3)),
            Binary(Sub, T(2), T(4)),
        ],
    ),
    Template::new(
        "(~x & y) + (x & ~y) + (x & y)",
        &[
            Unary(Not, X),
            Binary(BitAnd, T(0), Y),
            Unary(Not, Y),
            Binary(BitAnd, X, T(2)),
            Binary(Add, T(1), T(3)),
            Binary(BitAnd, X, Y),
            Binary(Add, T(4), T(5)),
        ],
    ),
];

/// Mapping from operator to its rewrite templates.
///
/// Templates in a catalog always pass [`Template::check_shape`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Catalog {
    entries: BTreeMap<BinaryOperator, Vec<Template>>,
}

impl Catalog {
    /// A catalog with no templates.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// The built-in catalog.
    pub fn standard() -> Self {
        let tables: [(BinaryOperator, &[Template]); 5] = [
            (Sub, SUB),
            (Xor, XOR),
            (Add, ADD),
            (BitAnd, BIT_AND),
            (BitOr, BIT_OR),
        ];
        let entries = tables
            .into_iter()
            .map(|(op, templates)| (op, templates.to_vec()))
            .collect();
        Self { entries }
    }

    /// Append a template for `operator`.
    pub fn register(
        &mut self,
        operator: BinaryOperator,
        template: Template,
    ) -> Result<(), TemplateError> {
        template.check_shape()?;
        self.entries.entry(operator).or_default().push(template);
        Ok(())
    }

    /// Templates for `operator`, in registration order. Empty if none.
    pub fn templates(&self, operator: BinaryOperator) -> &[Template] {
        self.entries
            .get(&operator)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Operators with at least one template.
    pub fn operators(&self) -> impl Iterator<Item = BinaryOperator> + '_ {
        self.entries
            .iter()
            .filter(|(_, templates)| !templates.is_empty())
            .map(|(&op, _)| op)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BinaryOperator, &[Template])> + '_ {
        self.entries
            .iter()
            .map(|(&op, templates)| (op, templates.as_slice()))
    }

    /// Total number of templates.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

/// An input on which a template disagrees with its operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Counterexample {
    pub x: u64,
    pub y: u64,
    pub expected: u64,
    pub actual: Option<u64>,
}

impl fmt::Display for Counterexample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x = {:#x}, y = {:#x}: expected {:#x}, ", self.x, self.y, self.expected)?;
        match self.actual {
            Some(actual) => write!(f, "got {:#x}", actual),
            None => write!(f, "evaluation failed"),
        }
    }
}

/// Check `template` against `operator` on every pair of 8-bit inputs.
pub fn verify_exhaustive(
    operator: BinaryOperator,
    template: &Template,
) -> Result<(), Counterexample> {
    let width = IntWidth::W8;
    for x in 0..=width.mask() {
        for y in 0..=width.mask() {
            check_point(operator, template, x, y, width)?;
        }
    }
    Ok(())
}

/// Compare `template` with `operator` at a single input.
pub fn check_point(
    operator: BinaryOperator,
    template: &Template,
    x: u64,
    y: u64,
    width: IntWidth,
) -> Result<(), Counterexample> {
    let (x, y) = (width.wrap(x), width.wrap(y));
    let expected = operator.eval(x, y, width).unwrap_or_default();
    let actual = template.evaluate(x, y, width);
    if actual == Some(expected) {
        Ok(())
    } else {
        Err(Counterexample {
            x,
            y,
            expected,
            actual,
        })
    }
}
