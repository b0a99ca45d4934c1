//! Rewrite executor: materializes a template in front of the instruction
//! it replaces.

use mixbool_ir::{BinaryOperator, IrContext, OpRef, ProgramBuilder, Type, ValueRef};
use rand::Rng;
use smallvec::SmallVec;
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::{MutationError, MutationResult};
use crate::filter::{Ineligibility, eligibility};
use crate::template::{Operand, Step, Template};

/// Outcome of materializing one template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rewrite {
    /// The instruction being replaced. Still in place until rebound.
    pub original: OpRef,
    pub operator: BinaryOperator,
    pub template_index: usize,
    pub template: Template,
    /// Value equal to the original instruction's result.
    pub result: ValueRef,
    /// Newly appended instructions, in program order.
    pub emitted: Vec<OpRef>,
}

/// Rewrite `op` with a template drawn uniformly from the catalog.
///
/// New instructions are inserted immediately before `op`; nothing else in
/// the program changes. Call [`crate::rebind`] afterwards to redirect the
/// original result and remove `op`.
pub fn apply<R: Rng + ?Sized>(
    ctx: &mut IrContext,
    op: OpRef,
    catalog: &Catalog,
    rng: &mut R,
) -> MutationResult<Rewrite> {
    let operator = eligibility(ctx, op).map_err(|reason| MutationError::Ineligible { op, reason })?;
    let count = catalog.templates(operator).len();
    if count == 0 {
        return Err(MutationError::MissingTemplates(operator));
    }
    let index = rng.random_range(0..count);
    apply_template(ctx, op, catalog, index)
}

/// Rewrite `op` with the catalog's template at `index`.
pub fn apply_template(
    ctx: &mut IrContext,
    op: OpRef,
    catalog: &Catalog,
    index: usize,
) -> MutationResult<Rewrite> {
    let operator = eligibility(ctx, op).map_err(|reason| MutationError::Ineligible { op, reason })?;
    let templates = catalog.templates(operator);
    if templates.is_empty() {
        return Err(MutationError::MissingTemplates(operator));
    }
    let template = *templates
        .get(index)
        .ok_or(MutationError::TemplateIndexOutOfRange {
            operator,
            index,
            len: templates.len(),
        })?;

    template.check_shape()?;

    let &[x, y] = ctx.op_operands(op) else {
        return Err(MutationError::Ineligible {
            op,
            reason: Ineligibility::NotBinary(ctx.op(op).opcode.mnemonic()),
        });
    };
    let ty = ctx.value_ty(x);

    let mut builder = ProgramBuilder::before(ctx, op)?;
    let x = builder.adopt(x)?;
    let y = builder.adopt(y)?;

    let mut temps: SmallVec<[ValueRef; 12]> = SmallVec::with_capacity(template.steps().len());
    let mut result = x;
    for step in template.steps() {
        let value = match *step {
            Step::Unary(unary, a) => {
                let a = materialize(&mut builder, a, x, y, ty, &temps)?;
                builder.unary(unary, a)?
            }
            Step::Binary(binary, a, b) => {
                let a = materialize(&mut builder, a, x, y, ty, &temps)?;
                let b = materialize(&mut builder, b, x, y, ty, &temps)?;
                builder.binary(binary, a, b)?
            }
        };
        temps.push(value);
        result = value;
    }

    let emitted = builder.into_emitted();
    debug!(
        %operator,
        template = index,
        formula = template.formula(),
        emitted = emitted.len(),
        "materialized MBA template"
    );

    Ok(Rewrite {
        original: op,
        operator,
        template_index: index,
        template,
        result,
        emitted,
    })
}

/// Resolve a template operand to a value, emitting a `const` for literals.
fn materialize(
    builder: &mut ProgramBuilder<'_>,
    operand: Operand,
    x: ValueRef,
    y: ValueRef,
    ty: Type,
    temps: &[ValueRef],
) -> MutationResult<ValueRef> {
    Ok(match operand {
        Operand::X => x,
        Operand::Y => y,
        Operand::Lit(value) => builder.load_int(ty, value)?,
        // Shape-checked: only earlier steps are read.
        Operand::Tmp(index) => temps[index],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixbool_ir::{Program, Value, parse_program, print_program, run_program};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const SUB_PROGRAM: &str = "program @f(%0: i32, %1: i32) {
      %2 = sub %0, %1 : i32
      %3 = mul %2, %2 : i32
      return %2, %3
    }";

    fn parse(source: &str) -> (IrContext, Program) {
        let mut ctx = IrContext::new();
        let program = parse_program(&mut ctx, source).unwrap();
        (ctx, program)
    }

    #[test]
    fn emits_sub_template_before_the_original() {
        let (mut ctx, program) = parse(SUB_PROGRAM);
        let sub = program.ops(&ctx)[0];

        let rewrite = apply_template(&mut ctx, sub, &Catalog::standard(), 0).unwrap();
        assert_eq!(rewrite.template.formula(), "x + ~y + 1");
        assert_eq!(rewrite.emitted.len(), rewrite.template.instruction_count());

        insta::assert_snapshot!(print_program(&ctx, &program), @r"
        program @f(%0: i32, %1: i32) {
          %2 = not %1 : i32
          %3 = add %0, %2 : i32
          %4 = const 1 : i32
          %5 = add %3, %4 : i32
          %6 = sub %0, %1 : i32
          %7 = mul %6, %6 : i32
          return %6, %7
        }
        ");
        assert_eq!(ctx.op_result(*rewrite.emitted.last().unwrap()), Some(rewrite.result));
    }

    #[test]
    fn emitted_value_matches_the_original_result() {
        let catalog = Catalog::standard();
        for operator in catalog.operators().collect::<Vec<_>>() {
            for index in 0..catalog.templates(operator).len() {
                let source = format!(
                    "program @f(%0: i16, %1: i16) {{\n  %2 = {operator} %0, %1 : i16\n  return %2\n}}\n"
                );
                let (mut ctx, program) = parse(&source);
                let op = program.ops(&ctx)[0];
                let original = ctx.op_result(op).unwrap();
                let rewrite = apply_template(&mut ctx, op, &catalog, index).unwrap();

                // Return both values so the interpreter computes them side by side.
                let ret = program.terminator(&ctx).unwrap();
                ctx.remove_op_from_block(program.entry(), ret);
                ctx.remove_op(ret);
                ProgramBuilder::at_end(&mut ctx, &program).ret([original, rewrite.result]);

                for (a, b) in [(5, 3), (-1, 7), (i16::MIN as i64, -1), (0x1234, 0x00ff)] {
                    let args = [
                        Value::int(Type::I16, a).unwrap(),
                        Value::int(Type::I16, b).unwrap(),
                    ];
                    let out = run_program(&ctx, &program, &args).unwrap();
                    assert_eq!(out[0], out[1], "{operator} #{index} on ({a}, {b})");
                }
            }
        }
    }

    #[test]
    fn uniform_draw_reaches_every_template() {
        let catalog = Catalog::standard();
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = vec![false; catalog.templates(BinaryOperator::Xor).len()];
        for _ in 0..500 {
            let (mut ctx, program) =
                parse("program @f(%0: i8, %1: i8) {\n  %2 = xor %0, %1 : i8\n  return %2\n}\n");
            let op = program.ops(&ctx)[0];
            let rewrite = apply(&mut ctx, op, &catalog, &mut rng).unwrap();
            seen[rewrite.template_index] = true;
        }
        assert!(seen.iter().all(|&s| s), "{seen:?}");
    }

    #[test]
    fn same_seed_same_template() {
        let catalog = Catalog::standard();
        let run = |seed: u64| {
            let (mut ctx, program) = parse(SUB_PROGRAM);
            let op = program.ops(&ctx)[0];
            let mut rng = StdRng::seed_from_u64(seed);
            let rewrite = apply(&mut ctx, op, &catalog, &mut rng).unwrap();
            (rewrite.template_index, print_program(&ctx, &program))
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn rejects_ineligible_and_uncatalogued_instructions() {
        let (mut ctx, program) = parse(
            "program @f(%0: i32, %1: i32) {
              %2 = mul %0, %1 : i32
              %3 = add %0, %1 : i32
              return %2, %3
            }",
        );
        let ops = program.ops(&ctx);
        let before = print_program(&ctx, &program);
        let mut rng = StdRng::seed_from_u64(0);

        let err = apply(&mut ctx, ops[0], &Catalog::standard(), &mut rng).unwrap_err();
        assert!(matches!(err, MutationError::Ineligible { .. }));
        assert!(err.is_contract_violation());

        let err = apply(&mut ctx, ops[1], &Catalog::empty(), &mut rng).unwrap_err();
        assert_eq!(err, MutationError::MissingTemplates(BinaryOperator::Add));

        let err = apply_template(&mut ctx, ops[1], &Catalog::standard(), 99).unwrap_err();
        assert_eq!(
            err,
            MutationError::TemplateIndexOutOfRange {
                operator: BinaryOperator::Add,
                index: 99,
                len: 16,
            }
        );
        assert_eq!(print_program(&ctx, &program), before);
    }
}
