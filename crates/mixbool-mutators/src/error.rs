//! Error types for instruction mutation.

use derive_more::{Display, Error, From};
use mixbool_ir::{BinaryOperator, BuildError, OpRef, ValidationResult, ValueRef};

use crate::filter::Ineligibility;
use crate::template::TemplateError;

pub type MutationResult<T> = Result<T, MutationError>;

/// Errors raised by the MBA engine.
///
/// Every variant is a broken caller contract (an ineligible instruction,
/// a filter and catalog that disagree, a template index from the wrong
/// catalog). None of them is a transient condition worth retrying.
#[derive(Clone, Debug, Display, Error, From, PartialEq, Eq)]
pub enum MutationError {
    #[from(ignore)]
    #[display("{op} cannot be rewritten: {reason}")]
    Ineligible {
        op: OpRef,
        reason: Ineligibility,
    },

    #[from(ignore)]
    #[display("catalog has no templates for `{_0}`")]
    MissingTemplates(#[error(not(source))] BinaryOperator),

    #[from(ignore)]
    #[display("template #{index} requested for `{operator}`, but only {len} exist")]
    TemplateIndexOutOfRange {
        operator: BinaryOperator,
        index: usize,
        len: usize,
    },

    #[display("malformed template: {_0}")]
    Template(TemplateError),

    #[display("emission failed: {_0}")]
    Build(BuildError),

    #[from(ignore)]
    #[display("{value} still has {remaining} use(s) after rebinding")]
    DanglingUses { value: ValueRef, remaining: usize },

    #[from(ignore)]
    #[display("{_0} defines no value to rebind")]
    NoResult(#[error(not(source))] OpRef),

    #[display("program is ill-formed after mutation:\n{_0}")]
    InvalidProgram(ValidationResult),
}

impl MutationError {
    /// Whether the error reports a broken caller contract rather than a
    /// recoverable condition. Currently true for every variant.
    pub fn is_contract_violation(&self) -> bool {
        match self {
            MutationError::Ineligible { .. }
            | MutationError::MissingTemplates(_)
            | MutationError::TemplateIndexOutOfRange { .. }
            | MutationError::Template(_)
            | MutationError::Build(_)
            | MutationError::DanglingUses { .. }
            | MutationError::NoResult(_)
            | MutationError::InvalidProgram(_) => true,
        }
    }
}
