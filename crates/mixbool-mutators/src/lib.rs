//! Mixed Boolean-Arithmetic instruction mutators.
//!
//! Rewrites a single arithmetic or bitwise instruction into an equivalent
//! sequence of instructions drawn from a catalog of MBA identities. All
//! identities hold modulo 2^n for every integer width, so a rewritten
//! program computes exactly what it did before.
//!
//! The pipeline for one instruction is:
//!
//! 1. [`filter`] decides whether the instruction can be rewritten.
//! 2. [`executor`] picks a template from the [`catalog`] and emits its
//!    steps in front of the instruction.
//! 3. [`rebind`] redirects every consumer to the new result and removes
//!    the original.
//!
//! [`mutate_program`] drives this over a whole program.

pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod filter;
pub mod mutator;
pub mod rebind;
pub mod template;

pub use catalog::{Catalog, Counterexample, check_point, verify_exhaustive};
pub use config::MutatorConfig;
pub use error::{MutationError, MutationResult};
pub use executor::{Rewrite, apply, apply_template};
pub use filter::{Ineligibility, SUPPORTED_OPERATORS, eligibility, is_eligible};
pub use mutator::{InstructionMutator, MbaMutator, MutationRecord, MutationReport, mutate_program};
pub use rebind::rebind;
pub use template::{Operand, Step, Template, TemplateError};
