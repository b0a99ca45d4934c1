//! mixbool: semantics-preserving MBA rewriting for program fuzzers.
//!
//! The engine lives in [`mixbool_mutators`]; the host IR in [`mixbool_ir`].
//! This crate wires them into a load, mutate and check pipeline used by the
//! `mixbool` binary.

pub mod pipeline;

pub use mixbool_ir as ir;
pub use mixbool_mutators as mutators;
pub use pipeline::{
    Case, CatalogEntry, Mismatch, MutateOptions, MutateOutcome, PipelineError, check_equivalence,
    describe_catalog, load_program, mutate_source, random_inputs, record_cases, run_source,
};
