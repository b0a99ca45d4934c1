//! Applicability filter: which instructions the MBA rewriter may touch.

use derive_more::Display;
use mixbool_ir::{BinaryOperator, IrContext, OpRef, Opcode, Type};
use serde::{Deserialize, Serialize};

/// Operators with at least one cataloged MBA identity.
pub const SUPPORTED_OPERATORS: [BinaryOperator; 5] = [
    BinaryOperator::Sub,
    BinaryOperator::Xor,
    BinaryOperator::Add,
    BinaryOperator::BitAnd,
    BinaryOperator::BitOr,
];

/// Why an instruction was rejected.
#[derive(Clone, Debug, Display, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ineligibility {
    #[display("`{_0}` is not a binary operation")]
    NotBinary(String),
    #[display("`{_0}` has no MBA templates")]
    UnsupportedOperator(BinaryOperator),
    #[display("operands are {lhs} and {rhs}, expected one integer type")]
    OperandTypes { lhs: Type, rhs: Type },
    #[display("result type {_0} differs from the operand type")]
    ResultType(String),
}

/// Classify `op`, returning its operator when it can be rewritten.
///
/// Eligible instructions are binary operations whose operator is in
/// [`SUPPORTED_OPERATORS`] and whose operands and result share a single
/// integer type. The identities only hold over fixed-width integers.
pub fn eligibility(ctx: &IrContext, op: OpRef) -> Result<BinaryOperator, Ineligibility> {
    let data = ctx.op(op);
    let Opcode::Binary(operator) = data.opcode else {
        return Err(Ineligibility::NotBinary(data.opcode.mnemonic()));
    };
    if !SUPPORTED_OPERATORS.contains(&operator) {
        return Err(Ineligibility::UnsupportedOperator(operator));
    }

    let &[lhs, rhs] = ctx.op_operands(op) else {
        return Err(Ineligibility::NotBinary(data.opcode.mnemonic()));
    };
    let (lhs, rhs) = (ctx.value_ty(lhs), ctx.value_ty(rhs));
    if lhs != rhs || !lhs.is_int() {
        return Err(Ineligibility::OperandTypes { lhs, rhs });
    }
    if data.result_ty != Some(lhs) {
        return Err(Ineligibility::ResultType(
            data.result_ty
                .map_or_else(|| "none".to_owned(), |ty| ty.to_string()),
        ));
    }
    Ok(operator)
}

/// Whether `op` can be rewritten. Pure: never touches the program.
pub fn is_eligible(ctx: &IrContext, op: OpRef) -> bool {
    eligibility(ctx, op).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixbool_ir::{Program, parse_program, print_program};

    fn parse(source: &str) -> (IrContext, Program) {
        let mut ctx = IrContext::new();
        let program = parse_program(&mut ctx, source).unwrap();
        (ctx, program)
    }

    #[test]
    fn accepts_supported_integer_operators() {
        for operator in SUPPORTED_OPERATORS {
            for ty in ["i8", "i16", "i32", "i64"] {
                let (ctx, program) = parse(&format!(
                    "program @f(%0: {ty}, %1: {ty}) {{\n  %2 = {operator} %0, %1 : {ty}\n  return %2\n}}\n"
                ));
                let op = program.ops(&ctx)[0];
                assert_eq!(eligibility(&ctx, op), Ok(operator), "{operator} {ty}");
            }
        }
    }

    #[test]
    fn rejects_everything_else() {
        let (ctx, program) = parse(
            "program @f(%0: i32, %1: i32, %2: f64) {
              %3 = mul %0, %1 : i32
              %4 = add %2, %2 : f64
              %5 = not %0 : i32
              %6 = cmp.lt %0, %1 : bool
              %7 = const 1 : i32
              %8 = shl %0, %1 : i32
              return %3, %4, %5, %6, %7, %8
            }",
        );
        let ops = program.ops(&ctx);
        let reasons: Vec<String> = ops
            .iter()
            .map(|&op| eligibility(&ctx, op).unwrap_err().to_string())
            .collect();

        assert_eq!(
            reasons,
            vec![
                "`mul` has no MBA templates",
                "operands are f64 and f64, expected one integer type",
                "`not` is not a binary operation",
                "`cmp.lt` is not a binary operation",
                "`const` is not a binary operation",
                "`shl` has no MBA templates",
                "`return` is not a binary operation",
            ]
        );
    }

    #[test]
    fn eligibility_is_pure() {
        let (ctx, program) = parse(
            "program @f(%0: i8, %1: i8) {
              %2 = xor %0, %1 : i8
              %3 = mul %2, %1 : i8
              return %3
            }",
        );
        let before = print_program(&ctx, &program);
        let ops = program.ops(&ctx);
        for _ in 0..3 {
            assert!(is_eligible(&ctx, ops[0]));
            assert!(!is_eligible(&ctx, ops[1]));
        }
        assert_eq!(print_program(&ctx, &program), before);
    }
}
