//! Instruction mutators and the driver that applies them to a program.
//!
//! The driver follows the usual single-instruction mutator loop: collect
//! every instruction the mutator accepts, pick a random number of them and
//! rewrite each in program order.

use std::collections::BTreeSet;

use mixbool_ir::{BinaryOperator, IrContext, OpRef, Program, print_op, validate_program};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::catalog::Catalog;
use crate::config::MutatorConfig;
use crate::error::MutationResult;
use crate::executor::apply;
use crate::filter::eligibility;
use crate::rebind::rebind;

/// A mutation strategy that rewrites one instruction at a time.
pub trait InstructionMutator {
    fn name(&self) -> &'static str;

    /// Whether `op` is a candidate. Must not change the program.
    fn can_mutate(&self, ctx: &IrContext, op: OpRef) -> bool;

    /// Rewrite `op`, leaving the program well-formed.
    fn mutate(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        rng: &mut dyn RngCore,
    ) -> MutationResult<MutationRecord>;
}

/// One applied rewrite.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// The replaced instruction, as printed before the rewrite.
    pub original: String,
    pub operator: BinaryOperator,
    pub template_index: usize,
    pub formula: String,
    /// Instructions appended in place of the original.
    pub emitted: usize,
    /// Operands redirected to the new value.
    pub rebound_uses: usize,
}

/// Everything one driver round did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationReport {
    pub mutator: String,
    /// Instructions the mutator could have rewritten.
    pub candidates: usize,
    pub records: Vec<MutationRecord>,
}

/// Rewrites eligible instructions into equivalent MBA expressions.
#[derive(Clone, Debug, Default)]
pub struct MbaMutator {
    catalog: Catalog,
}

impl MbaMutator {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

impl InstructionMutator for MbaMutator {
    fn name(&self) -> &'static str {
        "mba"
    }

    fn can_mutate(&self, ctx: &IrContext, op: OpRef) -> bool {
        match eligibility(ctx, op) {
            Ok(_) => true,
            Err(reason) => {
                trace!(%op, %reason, "not a candidate");
                false
            }
        }
    }

    fn mutate(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        rng: &mut dyn RngCore,
    ) -> MutationResult<MutationRecord> {
        let original = print_op(ctx, op);
        let rewrite = apply(ctx, op, &self.catalog, rng)?;
        let rebound_uses = rebind(ctx, op, rewrite.result)?;
        Ok(MutationRecord {
            original,
            operator: rewrite.operator,
            template_index: rewrite.template_index,
            formula: rewrite.template.formula().to_owned(),
            emitted: rewrite.emitted.len(),
            rebound_uses,
        })
    }
}

/// Run one mutation round over `program`.
///
/// Returns `Ok(None)` when the mutator accepts no instruction. Otherwise
/// draws `n` in `1..=max_simultaneous_mutations`, picks `n` candidates
/// uniformly with replacement, and mutates the distinct picks in program
/// order.
pub fn mutate_program<R: RngCore>(
    ctx: &mut IrContext,
    program: &Program,
    mutator: &dyn InstructionMutator,
    config: &MutatorConfig,
    rng: &mut R,
) -> MutationResult<Option<MutationReport>> {
    let candidates: Vec<OpRef> = program
        .ops(ctx)
        .into_iter()
        .filter(|&op| mutator.can_mutate(ctx, op))
        .collect();
    if candidates.is_empty() {
        trace!(mutator = mutator.name(), "no candidates");
        return Ok(None);
    }

    let count = rng.random_range(1..=config.max_simultaneous_mutations.max(1));
    let picked: BTreeSet<usize> = (0..count)
        .map(|_| rng.random_range(0..candidates.len()))
        .collect();

    let mut report = MutationReport {
        mutator: mutator.name().to_owned(),
        candidates: candidates.len(),
        records: Vec::with_capacity(picked.len()),
    };
    for index in picked {
        let op = candidates[index];
        if !mutator.can_mutate(ctx, op) {
            trace!(%op, "candidate no longer applies");
            continue;
        }
        report.records.push(mutator.mutate(ctx, op, &mut *rng)?);
    }

    if config.validate_after_mutation {
        validate_program(ctx, program).into_result()?;
    }
    debug!(
        mutator = mutator.name(),
        candidates = report.candidates,
        applied = report.records.len(),
        "mutation round finished"
    );
    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MutationError;
    use mixbool_ir::{parse_program, print_program};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const PROGRAM: &str = "program @f(%0: i32, %1: i32, %2: i32) {
      %3 = add %0, %1 : i32
      %4 = mul %3, %2 : i32
      %5 = xor %4, %0 : i32
      %6 = sub %5, %1 : i32
      %7 = and %6, %2 : i32
      %8 = or %7, %3 : i32
      return %8
    }";

    fn parse(source: &str) -> (IrContext, Program) {
        let mut ctx = IrContext::new();
        let program = parse_program(&mut ctx, source).unwrap();
        (ctx, program)
    }

    fn config() -> MutatorConfig {
        MutatorConfig::default().with_validation(true)
    }

    #[test]
    fn no_candidates_means_no_mutation() {
        let (mut ctx, program) = parse(
            "program @f(%0: i32, %1: i32) {
              %2 = mul %0, %1 : i32
              return %2
            }",
        );
        let before = print_program(&ctx, &program);
        let mut rng = StdRng::seed_from_u64(1);
        let report =
            mutate_program(&mut ctx, &program, &MbaMutator::default(), &config(), &mut rng)
                .unwrap();
        assert_eq!(report, None);
        assert_eq!(print_program(&ctx, &program), before);
    }

    #[test]
    fn candidates_are_the_eligible_instructions() {
        let (ctx, program) = parse(PROGRAM);
        let mutator = MbaMutator::default();
        for op in program.ops(&ctx) {
            assert_eq!(mutator.can_mutate(&ctx, op), crate::filter::is_eligible(&ctx, op));
        }
    }

    #[test]
    fn applies_between_one_and_max_rewrites() {
        for seed in 0..20 {
            let (mut ctx, program) = parse(PROGRAM);
            let len_before = program.len(&ctx);
            let mut rng = StdRng::seed_from_u64(seed);
            let report =
                mutate_program(&mut ctx, &program, &MbaMutator::default(), &config(), &mut rng)
                    .unwrap()
                    .unwrap();

            assert_eq!(report.mutator, "mba");
            assert_eq!(report.candidates, 5);
            assert!((1..=5).contains(&report.records.len()), "{report:?}");
            let growth: usize = report.records.iter().map(|r| r.emitted - 1).sum();
            assert_eq!(program.len(&ctx), len_before + growth);
            for record in &report.records {
                assert_ne!(record.operator, BinaryOperator::Mul);
                assert!(record.rebound_uses >= 1);
            }
        }
    }

    #[test]
    fn single_mutation_limit() {
        let (mut ctx, program) = parse(PROGRAM);
        let mut rng = StdRng::seed_from_u64(3);
        let config = config().with_max_simultaneous_mutations(1);
        let report = mutate_program(&mut ctx, &program, &MbaMutator::default(), &config, &mut rng)
            .unwrap()
            .unwrap();
        assert_eq!(report.records.len(), 1);
    }

    #[test]
    fn same_seed_same_program() {
        let run = |seed: u64| {
            let (mut ctx, program) = parse(PROGRAM);
            let mut rng = StdRng::seed_from_u64(seed);
            let report =
                mutate_program(&mut ctx, &program, &MbaMutator::default(), &config(), &mut rng)
                    .unwrap();
            (report, print_program(&ctx, &program))
        };
        assert_eq!(run(99), run(99));
    }

    #[test]
    fn catalog_gaps_surface_as_contract_violations() {
        let (mut ctx, program) = parse(PROGRAM);
        let mut rng = StdRng::seed_from_u64(0);
        let mutator = MbaMutator::new(Catalog::empty());
        let err = mutate_program(&mut ctx, &program, &mutator, &config(), &mut rng).unwrap_err();
        assert!(matches!(err, MutationError::MissingTemplates(_)));
        assert!(err.is_contract_violation());
    }

    #[test]
    fn report_serializes_to_json() {
        let report = MutationReport {
            mutator: "mba".to_owned(),
            candidates: 1,
            records: vec![MutationRecord {
                original: "%2 = sub %0, %1 : i32".to_owned(),
                operator: BinaryOperator::Sub,
                template_index: 0,
                formula: "x + ~y + 1".to_owned(),
                emitted: 4,
                rebound_uses: 1,
            }],
        };
        let json = serde_json::to_string(&report).unwrap();
        insta::assert_snapshot!(json, @r#"{"mutator":"mba","candidates":1,"records":[{"original":"%2 = sub %0, %1 : i32","operator":"Sub","template_index":0,"formula":"x + ~y + 1","emitted":4,"rebound_uses":1}]}"#);
        let back: MutationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
