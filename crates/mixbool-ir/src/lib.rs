//! mixbool IR crate.
//!
//! A small arena-allocated instruction IR used as the host program
//! representation for mixbool's mutators. Programs are a single entry block
//! whose arguments are the program inputs and whose final `return` lists the
//! outputs. Every value keeps a use-chain, so rewrites can splice in new
//! instructions and redirect consumers with RAUW (replace all uses with).

pub mod builder;
pub mod context;
pub mod interp;
pub mod ops;
pub mod parser;
pub mod printer;
pub mod program;
pub mod refs;
pub mod types;
pub mod validation;

pub use builder::{BuildError, InsertPoint, ProgramBuilder};
pub use context::{BlockData, IrContext, OperationData, OperationDataBuilder, Use, ValueData};
pub use interp::{EvalError, Value, run_program};
pub use ops::{BinaryOperator, Comparator, Opcode, UnaryOperator};
pub use parser::{ParseError, parse_program};
pub use printer::{print_op, print_program};
pub use program::Program;
pub use refs::{BlockRef, OpRef, ValueDef, ValueRef};
pub use types::{IntWidth, Type};
pub use validation::{ValidationError, ValidationResult, validate_program};
