//! Text format parser.
//!
//! Parses the format produced by [`crate::printer`] back into a
//! [`Program`].
//!
//! # Two-stage parsing
//!
//! 1. **Raw parse**: winnow combinators turn text into `Raw*` structures
//!    that still refer to values by name.
//! 2. **IR build**: `IrBuilder` resolves names and emits typed operations
//!    through [`ProgramBuilder`], so every operand is type-checked.

use std::collections::HashMap;

use derive_more::{Display, Error};
use winnow::ascii;
use winnow::combinator::{delimited, opt, preceded, separated};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::{one_of, take_while};

use crate::builder::ProgramBuilder;
use crate::context::IrContext;
use crate::ops::{BinaryOperator, Comparator, UnaryOperator};
use crate::program::Program;
use crate::refs::ValueRef;
use crate::types::Type;

/// Parse error for the IR text format.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
#[display("parse error at offset {offset}: {message}")]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

// ============================================================================
// Raw (unresolved) structures
// ============================================================================

#[derive(Debug, Clone)]
struct RawHeader<'a> {
    name: &'a str,
    params: Vec<(&'a str, &'a str)>,
}

#[derive(Debug, Clone, Copy)]
enum RawLiteral {
    Int(i64),
    Float(f64),
}

#[derive(Debug, Clone)]
struct RawOperation<'a> {
    result: Option<&'a str>,
    mnemonic: &'a str,
    literal: Option<RawLiteral>,
    operands: Vec<&'a str>,
    ty: Option<&'a str>,
}

// ============================================================================
// Winnow parsers
// ============================================================================

/// Skip whitespace.
fn ws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., |c: char| c.is_ascii_whitespace())
        .void()
        .parse_next(input)
}

/// Skip blanks without crossing a line break.
fn blank(input: &mut &str) -> ModalResult<()> {
    take_while(0.., |c: char| c == ' ' || c == '\t')
        .void()
        .parse_next(input)
}

/// Parse an identifier: [a-zA-Z_][a-zA-Z0-9_]*
fn ident<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)
}

/// Parse an opcode mnemonic such as `add` or `cmp.lt`.
fn mnemonic<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    (ident, opt(('.', ident))).take().parse_next(input)
}

/// Parse a value reference: %name or %number
fn value_ref<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    preceded(
        '%',
        take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
    .parse_next(input)
}

/// Parse a signed 64-bit integer literal.
fn integer_lit(input: &mut &str) -> ModalResult<i64> {
    let negative = opt('-').parse_next(input)?.is_some();
    let magnitude: u64 = ascii::dec_uint(input)?;
    let i64_min_magnitude = i64::MAX as u64 + 1;
    match (negative, magnitude) {
        (true, m) if m == i64_min_magnitude => Ok(i64::MIN),
        (true, m) if m < i64_min_magnitude => Ok(-(m as i64)),
        (false, m) if m <= i64::MAX as u64 => Ok(m as i64),
        _ => Err(ErrMode::Backtrack(ContextError::new())),
    }
}

/// Parse a float literal in any form `f64::from_str` accepts
/// (`1.5`, `-2.0`, `1e20`, `inf`, `NaN`).
fn float_lit(input: &mut &str) -> ModalResult<f64> {
    let s = take_while(1.., |c: char| {
        c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+')
    })
    .parse_next(input)?;
    s.parse::<f64>()
        .map_err(|_| ErrMode::Backtrack(ContextError::new()))
}

/// Parse the program header: `program @name(%a: i32, ...) {`
fn raw_header<'a>(input: &mut &'a str) -> ModalResult<RawHeader<'a>> {
    ws.parse_next(input)?;
    "program".parse_next(input)?;
    ws.parse_next(input)?;
    '@'.parse_next(input)?;
    let name = ident.parse_next(input)?;
    let params = delimited(
        ('(', ws),
        separated(
            0..,
            (ws, value_ref, ws, ':', ws, ident, ws).map(|(_, name, _, _, _, ty, _)| (name, ty)),
            ',',
        ),
        (ws, ')'),
    )
    .parse_next(input)?;
    (ws, '{').void().parse_next(input)?;
    Ok(RawHeader { name, params })
}

/// Parse one operation line: `[%r =] mnemonic [literal] [operands] [: type]`
fn raw_operation<'a>(input: &mut &'a str) -> ModalResult<RawOperation<'a>> {
    let result = opt((value_ref, blank, '=', blank).map(|(r, _, _, _)| r)).parse_next(input)?;
    let mnemonic = mnemonic.parse_next(input)?;
    blank.parse_next(input)?;
    let literal = match mnemonic {
        "const" => Some(RawLiteral::Int(integer_lit.parse_next(input)?)),
        "fconst" => Some(RawLiteral::Float(float_lit.parse_next(input)?)),
        _ => None,
    };
    blank.parse_next(input)?;
    let operands: Vec<&str> = opt(separated(
        1..,
        (blank, value_ref, blank).map(|(_, v, _)| v),
        ',',
    ))
    .parse_next(input)?
    .unwrap_or_default();
    let ty = opt(preceded((blank, ':', blank), ident)).parse_next(input)?;
    blank.parse_next(input)?;
    Ok(RawOperation {
        result,
        mnemonic,
        literal,
        operands,
        ty,
    })
}

// ============================================================================
// IrBuilder (Raw -> IR)
// ============================================================================

struct IrBuilder<'a> {
    ctx: &'a mut IrContext,
    program: Program,
    /// Maps value name (without %) -> ValueRef
    value_map: HashMap<&'a str, ValueRef>,
}

impl<'a> IrBuilder<'a> {
    fn new(ctx: &'a mut IrContext, header: &RawHeader<'a>) -> Result<Self, ParseError> {
        let mut types = Vec::with_capacity(header.params.len());
        for &(_, ty) in &header.params {
            types.push(parse_type(ty, 0)?);
        }
        let program = Program::new(ctx, header.name, &types);
        let mut value_map = HashMap::new();
        for (&(name, _), &v) in header.params.iter().zip(program.inputs(ctx)) {
            if value_map.insert(name, v).is_some() {
                return Err(ParseError::new(format!("duplicate parameter %{name}"), 0));
            }
        }
        Ok(Self {
            ctx,
            program,
            value_map,
        })
    }

    fn resolve(&self, name: &str, offset: usize) -> Result<ValueRef, ParseError> {
        self.value_map
            .get(name)
            .copied()
            .ok_or_else(|| ParseError::new(format!("undefined value %{name}"), offset))
    }

    fn build_operation(&mut self, raw: &RawOperation<'a>, offset: usize) -> Result<(), ParseError> {
        let operands = raw
            .operands
            .iter()
            .map(|name| self.resolve(name, offset))
            .collect::<Result<Vec<_>, _>>()?;
        let annotated = raw.ty.map(|ty| parse_type(ty, offset)).transpose()?;
        let expect_operands = |n: usize| {
            if operands.len() == n {
                Ok(())
            } else {
                Err(ParseError::new(
                    format!(
                        "`{}` expects {n} operand(s), found {}",
                        raw.mnemonic,
                        operands.len()
                    ),
                    offset,
                ))
            }
        };

        let mut builder = ProgramBuilder::at_end(&mut *self.ctx, &self.program);
        let build_err = |e: crate::builder::BuildError| ParseError::new(e.to_string(), offset);

        let value = match (raw.mnemonic, raw.literal) {
            ("const", Some(RawLiteral::Int(value))) => {
                expect_operands(0)?;
                let ty = annotated
                    .ok_or_else(|| ParseError::new("`const` requires a result type", offset))?;
                if let Some(width) = ty.int_width()
                    && width.sign_extend(width.from_i64(value)) != value
                {
                    return Err(ParseError::new(
                        format!("literal {value} does not fit in {ty}"),
                        offset,
                    ));
                }
                Some(builder.load_int(ty, value).map_err(build_err)?)
            }
            ("fconst", Some(RawLiteral::Float(value))) => {
                expect_operands(0)?;
                Some(builder.load_float(value))
            }
            ("return", _) => {
                builder.ret(operands.iter().copied());
                None
            }
            (name, _) => {
                if let Some(op) = UnaryOperator::from_mnemonic(name) {
                    expect_operands(1)?;
                    Some(builder.unary(op, operands[0]).map_err(build_err)?)
                } else if let Some(op) = BinaryOperator::from_mnemonic(name) {
                    expect_operands(2)?;
                    Some(
                        builder
                            .binary(op, operands[0], operands[1])
                            .map_err(build_err)?,
                    )
                } else if let Some(cmp) = Comparator::from_mnemonic(name) {
                    expect_operands(2)?;
                    Some(
                        builder
                            .compare(cmp, operands[0], operands[1])
                            .map_err(build_err)?,
                    )
                } else {
                    return Err(ParseError::new(format!("unknown opcode `{name}`"), offset));
                }
            }
        };

        match (raw.result, value) {
            (Some(name), Some(v)) => {
                let ty = self.ctx.value_ty(v);
                if let Some(annotated) = annotated
                    && annotated != ty
                {
                    return Err(ParseError::new(
                        format!("`{}` produces {ty}, annotated as {annotated}", raw.mnemonic),
                        offset,
                    ));
                }
                if self.value_map.insert(name, v).is_some() {
                    return Err(ParseError::new(format!("value %{name} redefined"), offset));
                }
                Ok(())
            }
            (None, None) => Ok(()),
            (None, Some(_)) => Err(ParseError::new(
                format!("`{}` result must be named", raw.mnemonic),
                offset,
            )),
            (Some(name), None) => Err(ParseError::new(
                format!("`{}` has no result to bind to %{name}", raw.mnemonic),
                offset,
            )),
        }
    }
}

fn parse_type(name: &str, offset: usize) -> Result<Type, ParseError> {
    Type::from_name(name).ok_or_else(|| ParseError::new(format!("unknown type `{name}`"), offset))
}

// ============================================================================
// Public API
// ============================================================================

/// Parse a program from its textual representation.
pub fn parse_program(ctx: &mut IrContext, input: &str) -> Result<Program, ParseError> {
    let offset_of = |rest: &str| input.len() - rest.len();
    let mut remaining = input;

    let header = raw_header.parse_next(&mut remaining).map_err(|e| {
        ParseError::new(format!("invalid program header: {e}"), offset_of(remaining))
    })?;

    let mut ops = Vec::new();
    loop {
        ws.parse_next(&mut remaining)
            .map_err(|e| ParseError::new(format!("lexer error: {e}"), offset_of(remaining)))?;
        if remaining.is_empty() {
            return Err(ParseError::new("missing closing `}`", offset_of(remaining)));
        }
        if remaining.starts_with('}') {
            remaining = &remaining[1..];
            break;
        }
        let offset = offset_of(remaining);
        let op = raw_operation
            .parse_next(&mut remaining)
            .map_err(|e| ParseError::new(format!("invalid operation: {e}"), offset))?;
        if !(remaining.starts_with('\n') || remaining.starts_with("\r\n") || remaining.is_empty()) {
            return Err(ParseError::new(
                "unexpected input after operation",
                offset_of(remaining),
            ));
        }
        ops.push((offset, op));
    }

    // Reject trailing input
    ws.parse_next(&mut remaining)
        .map_err(|e| ParseError::new(format!("lexer error: {e}"), offset_of(remaining)))?;
    if !remaining.is_empty() {
        return Err(ParseError::new(
            "trailing input after program",
            offset_of(remaining),
        ));
    }

    let mut builder = IrBuilder::new(ctx, &header)?;
    for (offset, op) in &ops {
        builder.build_operation(op, *offset)?;
    }
    Ok(builder.program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::print_program;
    use proptest::prelude::*;

    fn assert_roundtrip(input: &str) {
        let mut ctx = IrContext::new();
        let program = parse_program(&mut ctx, input).unwrap_or_else(|e| {
            panic!(
                "parse failed at offset {}:\n  {}\n\nInput:\n{}",
                e.offset, e.message, input
            )
        });
        assert_eq!(print_program(&ctx, &program), input, "round-trip mismatch");
    }

    #[test]
    fn round_trips_printed_programs() {
        assert_roundtrip(
            "program @f(%0: i32, %1: i32) {\n  %2 = const -7 : i32\n  %3 = sub %0, %1 : i32\n  %4 = xor %3, %2 : i32\n  return %4\n}\n",
        );
        assert_roundtrip(
            "program @g(%0: f64, %1: i8) {\n  %2 = fconst 1e20 : f64\n  %3 = mul %0, %2 : f64\n  %4 = neg %1 : i8\n  %5 = cmp.ge %4, %1 : bool\n  return %3, %5\n}\n",
        );
        assert_roundtrip("program @empty() {\n  return\n}\n");
    }

    #[test]
    fn accepts_named_values_and_loose_spacing() {
        let mut ctx = IrContext::new();
        let program = parse_program(
            &mut ctx,
            "program @h( %a : i16 , %b: i16 ) {\n\n   %sum = add %a,%b\n  return %sum\n}",
        )
        .unwrap();

        insta::assert_snapshot!(print_program(&ctx, &program), @r"
        program @h(%0: i16, %1: i16) {
          %2 = add %0, %1 : i16
          return %2
        }
        ");
    }

    #[test]
    fn reports_undefined_values_with_offset() {
        let mut ctx = IrContext::new();
        let input = "program @f(%0: i32) {\n  %1 = add %0, %9 : i32\n  return %1\n}\n";
        let err = parse_program(&mut ctx, input).unwrap_err();
        assert_eq!(err.message, "undefined value %9");
        assert_eq!(err.offset, input.find("%1 =").unwrap());
    }

    #[test]
    fn rejects_ill_formed_programs() {
        let cases = [
            ("program @f(%0: i32) {\n  %1 = add %0 : i32\n}\n", "expects 2"),
            ("program @f(%0: i32) {\n  %1 = frob %0 : i32\n}\n", "unknown opcode"),
            ("program @f(%0: u7) {\n}\n", "unknown type"),
            ("program @f(%0: i8) {\n  %1 = const 300 : i8\n}\n", "does not fit"),
            ("program @f(%0: i8) {\n  %1 = add %0, %0 : i32\n}\n", "annotated as"),
            ("program @f(%0: i8) {\n  %0 = add %0, %0 : i8\n}\n", "redefined"),
            ("program @f(%0: i8) {\n  add %0, %0\n}\n", "must be named"),
            ("program @f(%0: i8) {\n  return %0\n", "missing closing"),
            ("program @f() {\n}\n}\n", "trailing input"),
        ];
        for (input, expected) in cases {
            let mut ctx = IrContext::new();
            let err = parse_program(&mut ctx, input).unwrap_err();
            assert!(
                err.message.contains(expected),
                "{input:?}: expected {expected:?}, got {err}"
            );
        }
    }

    proptest! {
        #[test]
        fn const_literals_round_trip(value in any::<i64>()) {
            let input = format!("program @c() {{\n  %0 = const {value} : i64\n  return %0\n}}\n");
            let mut ctx = IrContext::new();
            let program = parse_program(&mut ctx, &input).unwrap();
            prop_assert_eq!(print_program(&ctx, &program), input);
        }
    }
}
