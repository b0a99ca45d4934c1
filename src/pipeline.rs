//! End-to-end mutation pipeline.
//!
//! ```text
//! source text
//!     │
//!     ▼
//! load_program ─► Program (parsed and validated)
//!     │
//!     ├─► record_cases ─► reference outputs on random inputs
//!     │
//!     ▼
//! mutate_program × rounds ─► MutationReport per round
//!     │
//!     ▼
//! check_equivalence ─► outputs unchanged on every recorded case
//! ```
//!
//! The CLI is a thin layer over these functions.

use std::fmt;

use derive_more::{Display, Error, From};
use mixbool_ir::{
    BinaryOperator, EvalError, IrContext, ParseError, Program, Type, ValidationResult, Value,
    parse_program, print_program, run_program, validate_program,
};
use mixbool_mutators::{
    Catalog, Counterexample, InstructionMutator, MbaMutator, MutationError, MutationReport,
    MutatorConfig, mutate_program, verify_exhaustive,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

/// Errors surfaced by the pipeline.
#[derive(Debug, Display, Error, From)]
pub enum PipelineError {
    #[display("{_0}")]
    Parse(ParseError),

    #[display("{_0}")]
    Eval(EvalError),

    #[display("{_0}")]
    Mutation(MutationError),

    #[display("invalid program:\n{_0}")]
    Validation(ValidationResult),

    #[display("{_0}")]
    Io(std::io::Error),

    #[from(ignore)]
    #[display("argument {index}: `{text}` is not a valid {ty}")]
    Argument {
        index: usize,
        text: String,
        ty: Type,
    },

    #[from(ignore)]
    #[display("mutation changed behaviour: {_0}")]
    Mismatch(#[error(not(source))] Box<Mismatch>),
}

/// A recorded input together with the original program's behaviour on it.
#[derive(Clone, Debug, PartialEq)]
pub struct Case {
    pub inputs: Vec<Value>,
    pub expected: Result<Vec<Value>, EvalError>,
}

/// An input on which the mutated program disagrees with the original.
#[derive(Clone, Debug, PartialEq)]
pub struct Mismatch {
    pub inputs: Vec<Value>,
    pub expected: Result<Vec<Value>, EvalError>,
    pub actual: Result<Vec<Value>, EvalError>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "on ({}) expected ", join(&self.inputs))?;
        write_outcome(f, &self.expected)?;
        write!(f, ", got ")?;
        write_outcome(f, &self.actual)
    }
}

fn write_outcome(f: &mut fmt::Formatter<'_>, outcome: &Result<Vec<Value>, EvalError>) -> fmt::Result {
    match outcome {
        Ok(values) => write!(f, "({})", join(values)),
        Err(err) => write!(f, "error `{err}`"),
    }
}

/// Comma-separated values, as printed by `mixbool run`.
pub fn join(values: &[Value]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Options for [`mutate_source`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutateOptions {
    pub seed: u64,
    pub rounds: usize,
    /// Random inputs to check equivalence on. Zero disables the check.
    pub check: usize,
    pub config: MutatorConfig,
}

impl Default for MutateOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            rounds: 1,
            check: 0,
            config: MutatorConfig::default(),
        }
    }
}

/// What [`mutate_source`] produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MutateOutcome {
    /// The mutated program in textual form.
    pub program: String,
    /// One entry per round that found something to rewrite.
    pub reports: Vec<MutationReport>,
    /// Inputs on which equivalence was checked.
    pub checked: usize,
}

/// Parse `source` and reject programs that are not well-formed.
pub fn load_program(ctx: &mut IrContext, source: &str) -> Result<Program, PipelineError> {
    let program = parse_program(ctx, source)?;
    validate_program(ctx, &program).into_result()?;
    Ok(program)
}

/// Draw one random value for each input type.
pub fn random_inputs<R: Rng + ?Sized>(types: &[Type], rng: &mut R) -> Vec<Value> {
    types
        .iter()
        .map(|&ty| match ty.int_width() {
            Some(width) => Value::Int(width, width.wrap(rng.random())),
            None if ty == Type::F64 => Value::Float(rng.random()),
            None => Value::Bool(rng.random()),
        })
        .collect()
}

/// Run `program` on `count` random inputs and record what it returns.
pub fn record_cases<R: Rng + ?Sized>(
    ctx: &IrContext,
    program: &Program,
    count: usize,
    rng: &mut R,
) -> Vec<Case> {
    let types = program.input_types(ctx);
    (0..count)
        .map(|_| {
            let inputs = random_inputs(&types, &mut *rng);
            let expected = run_program(ctx, program, &inputs);
            Case { inputs, expected }
        })
        .collect()
}

/// Check that `program` still behaves as recorded in `cases`.
pub fn check_equivalence(
    ctx: &IrContext,
    program: &Program,
    cases: &[Case],
) -> Result<(), PipelineError> {
    for case in cases {
        let actual = run_program(ctx, program, &case.inputs);
        if actual != case.expected {
            return Err(PipelineError::Mismatch(Box::new(Mismatch {
                inputs: case.inputs.clone(),
                expected: case.expected.clone(),
                actual,
            })));
        }
    }
    debug!(cases = cases.len(), "equivalence check passed");
    Ok(())
}

/// Parse, mutate and print a program.
///
/// All randomness, including the equivalence inputs, comes from a single
/// generator seeded with `options.seed`, so the outcome is reproducible.
pub fn mutate_source(source: &str, options: &MutateOptions) -> Result<MutateOutcome, PipelineError> {
    let mut ctx = IrContext::new();
    let program = load_program(&mut ctx, source)?;
    let mut rng = StdRng::seed_from_u64(options.seed);
    let cases = record_cases(&ctx, &program, options.check, &mut rng);

    let mutator = MbaMutator::default();
    let mut reports = Vec::new();
    for round in 0..options.rounds {
        match mutate_program(&mut ctx, &program, &mutator, &options.config, &mut rng)? {
            Some(report) => reports.push(report),
            None => {
                info!(round, mutator = mutator.name(), "nothing left to mutate");
                break;
            }
        }
    }

    check_equivalence(&ctx, &program, &cases)?;
    Ok(MutateOutcome {
        program: print_program(&ctx, &program),
        reports,
        checked: cases.len(),
    })
}

/// Parse a program and run it on textual arguments.
pub fn run_source(source: &str, args: &[String]) -> Result<Vec<Value>, PipelineError> {
    let mut ctx = IrContext::new();
    let program = load_program(&mut ctx, source)?;
    let types = program.input_types(&ctx);
    if types.len() != args.len() {
        return Err(EvalError::ArgumentCount {
            expected: types.len(),
            found: args.len(),
        }
        .into());
    }
    let values = types
        .iter()
        .zip(args)
        .enumerate()
        .map(|(index, (&ty, text))| {
            Value::parse(ty, text).ok_or_else(|| PipelineError::Argument {
                index,
                text: text.clone(),
                ty,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(run_program(&ctx, &program, &values)?)
}

/// One catalog entry, optionally verified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogEntry {
    pub operator: BinaryOperator,
    pub index: usize,
    pub formula: &'static str,
    pub instructions: usize,
    /// `None` when verification was not requested.
    pub verdict: Option<Result<(), Counterexample>>,
}

impl fmt::Display for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<4} #{:<2} {:>2} ops  x {} y = {}",
            self.operator.to_string(),
            self.index,
            self.instructions,
            self.operator.symbol(),
            self.formula
        )?;
        match &self.verdict {
            None => Ok(()),
            Some(Ok(())) => write!(f, "  ok"),
            Some(Err(counterexample)) => write!(f, "  FAILED ({counterexample})"),
        }
    }
}

/// List every template in `catalog`, checking each exhaustively at 8 bits
/// when `verify` is set.
pub fn describe_catalog(catalog: &Catalog, verify: bool) -> Vec<CatalogEntry> {
    catalog
        .iter()
        .flat_map(|(operator, templates)| {
            templates
                .iter()
                .enumerate()
                .map(move |(index, template)| CatalogEntry {
                    operator,
                    index,
                    formula: template.formula(),
                    instructions: template.instruction_count(),
                    verdict: verify.then(|| verify_exhaustive(operator, template)),
                })
        })
        .collect()
}
