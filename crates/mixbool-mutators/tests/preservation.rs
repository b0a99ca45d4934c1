//! Mutated programs compute the same outputs as the originals.

use mixbool_ir::{
    BinaryOperator, IrContext, Program, ProgramBuilder, Type, UnaryOperator, Value, ValueRef,
    print_program, run_program, validate_program,
};
use mixbool_mutators::{MbaMutator, MutatorConfig, mutate_program};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

const OPERATORS: [BinaryOperator; 6] = [
    BinaryOperator::Add,
    BinaryOperator::Sub,
    BinaryOperator::Mul,
    BinaryOperator::Xor,
    BinaryOperator::BitAnd,
    BinaryOperator::BitOr,
];

/// One instruction of a generated program: an operator (or `not` when
/// `None`) and two picks among the values defined so far.
type Shape = (Option<usize>, usize, usize);

fn build(ty: Type, shapes: &[Shape]) -> (IrContext, Program) {
    let mut ctx = IrContext::new();
    let program = Program::new(&mut ctx, "random", &[ty, ty, ty]);
    let mut values: Vec<ValueRef> = program.inputs(&ctx).to_vec();
    let mut builder = ProgramBuilder::at_end(&mut ctx, &program);
    for &(operator, a, b) in shapes {
        let lhs = values[a % values.len()];
        let rhs = values[b % values.len()];
        let value = match operator {
            Some(index) => builder
                .binary(OPERATORS[index % OPERATORS.len()], lhs, rhs)
                .unwrap(),
            None => builder.unary(UnaryOperator::BitwiseNot, lhs).unwrap(),
        };
        values.push(value);
    }
    // Return the last few values so intermediate results are observed too.
    let outputs: Vec<ValueRef> = values.iter().rev().take(3).copied().collect();
    builder.ret(outputs);
    (ctx, program)
}

fn shapes() -> impl Strategy<Value = Vec<Shape>> {
    prop::collection::vec(
        (prop::option::weighted(0.85, 0..OPERATORS.len()), any::<usize>(), any::<usize>()),
        1..24,
    )
}

fn int_type() -> impl Strategy<Value = Type> {
    prop::sample::select(vec![Type::I8, Type::I16, Type::I32, Type::I64])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn rounds_preserve_outputs(
        ty in int_type(),
        shapes in shapes(),
        inputs in prop::collection::vec(prop::array::uniform3(any::<i64>()), 1..6),
        seed in any::<u64>(),
    ) {
        let (mut ctx, program) = build(ty, &shapes);
        let args: Vec<Vec<Value>> = inputs
            .iter()
            .map(|row| row.iter().map(|&v| Value::int(ty, v).unwrap()).collect())
            .collect();
        let expected: Vec<Vec<Value>> = args
            .iter()
            .map(|row| run_program(&ctx, &program, row).unwrap())
            .collect();

        let mutator = MbaMutator::default();
        let config = MutatorConfig::default().with_validation(true);
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..4 {
            mutate_program(&mut ctx, &program, &mutator, &config, &mut rng).unwrap();
        }

        prop_assert!(validate_program(&ctx, &program).is_ok());
        for (row, expected) in args.iter().zip(&expected) {
            let actual = run_program(&ctx, &program, row).unwrap();
            prop_assert_eq!(
                &actual,
                expected,
                "inputs {:?}\n{}",
                row,
                print_program(&ctx, &program)
            );
        }
    }
}

#[test]
fn repeated_rounds_keep_growing_the_program() {
    let shapes: Vec<Shape> = vec![(Some(0), 0, 1), (Some(1), 3, 2), (Some(3), 4, 0)];
    let (mut ctx, program) = build(Type::I32, &shapes);
    let mutator = MbaMutator::default();
    let config = MutatorConfig::default().with_validation(true);
    let mut rng = StdRng::seed_from_u64(2024);

    let mut len = program.len(&ctx);
    for _ in 0..5 {
        let report = mutate_program(&mut ctx, &program, &mutator, &config, &mut rng)
            .unwrap()
            .unwrap();
        assert!(!report.records.is_empty());
        assert!(program.len(&ctx) > len);
        len = program.len(&ctx);
    }

    let args = [
        Value::int(Type::I32, 1234).unwrap(),
        Value::int(Type::I32, -77).unwrap(),
        Value::int(Type::I32, 9).unwrap(),
    ];
    let out = run_program(&ctx, &program, &args).unwrap();
    let a: i32 = 1234;
    let b: i32 = -77;
    let c: i32 = 9;
    let v3 = a.wrapping_add(b);
    let v4 = v3.wrapping_sub(c);
    let v5 = v4 ^ a;
    assert_eq!(out[0].as_i64(), Some(v5 as i64));
    assert_eq!(out[1].as_i64(), Some(v4 as i64));
    assert_eq!(out[2].as_i64(), Some(v3 as i64));
}
