//! Text format printer.
//!
//! ```text
//! program @name(%0: i32, %1: i32) {
//!   %2 = const 1 : i32
//!   %3 = sub %0, %1 : i32
//!   return %3
//! }
//! ```
//!
//! Values are renumbered densely in program order, so printing is stable
//! across rewrites that allocate fresh arena entries.

use std::collections::HashMap;
use std::fmt::{self, Write};

use crate::context::IrContext;
use crate::ops::Opcode;
use crate::program::Program;
use crate::refs::{OpRef, ValueRef};
use crate::types::Type;

/// Print state for value numbering.
struct PrintState<'a> {
    ctx: &'a IrContext,
    value_names: HashMap<ValueRef, String>,
    next_value_num: usize,
}

impl<'a> PrintState<'a> {
    fn new(ctx: &'a IrContext) -> Self {
        Self {
            ctx,
            value_names: HashMap::new(),
            next_value_num: 0,
        }
    }

    fn assign_value_name(&mut self, v: ValueRef) -> String {
        let name = format!("%{}", self.next_value_num);
        self.next_value_num += 1;
        self.value_names.insert(v, name.clone());
        name
    }

    fn get_value_name(&self, v: ValueRef) -> String {
        self.value_names
            .get(&v)
            .cloned()
            .unwrap_or_else(|| format!("%?{}", v))
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Print a whole program as IR text.
pub fn print_program(ctx: &IrContext, program: &Program) -> String {
    let mut state = PrintState::new(ctx);
    let mut out = String::new();
    write_program(&mut state, &mut out, program).expect("fmt::Write to String never fails");
    out
}

/// Print a single operation, naming values by their arena index.
pub fn print_op(ctx: &IrContext, op: OpRef) -> String {
    let mut state = PrintState::new(ctx);
    let mut out = String::new();
    write_operation(&mut state, &mut out, op, true).expect("fmt::Write to String never fails");
    out
}

// ============================================================================
// Printing
// ============================================================================

fn write_program(state: &mut PrintState<'_>, f: &mut impl Write, program: &Program) -> fmt::Result {
    let ctx = state.ctx;
    write!(f, "program @{}(", program.name())?;
    for (i, &arg) in program.inputs(ctx).iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        let name = state.assign_value_name(arg);
        write!(f, "{}: {}", name, ctx.value_ty(arg))?;
    }
    f.write_str(") {\n")?;
    for op in program.ops(ctx) {
        f.write_str("  ")?;
        write_operation(state, f, op, false)?;
        f.write_char('\n')?;
    }
    f.write_str("}\n")
}

fn write_operation(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    op: OpRef,
    raw_names: bool,
) -> fmt::Result {
    let ctx = state.ctx;
    let data = ctx.op(op);

    let operand_names: Vec<String> = ctx
        .op_operands(op)
        .iter()
        .map(|&v| {
            if raw_names {
                format!("%{}", v.as_u32())
            } else {
                state.get_value_name(v)
            }
        })
        .collect();

    if let Some(result) = ctx.op_result(op) {
        let name = if raw_names {
            format!("%{}", result.as_u32())
        } else {
            state.assign_value_name(result)
        };
        write!(f, "{} = ", name)?;
    }

    f.write_str(&data.opcode.mnemonic())?;
    match data.opcode {
        Opcode::Const(bits) => {
            let ty = data.result_ty.and_then(Type::int_width);
            match ty {
                Some(width) => write!(f, " {}", width.sign_extend(bits))?,
                None => write!(f, " {}", bits)?,
            }
        }
        Opcode::FConst(bits) => write!(f, " {:?}", f64::from_bits(bits))?,
        _ => {}
    }
    if !operand_names.is_empty() {
        write!(f, " {}", operand_names.join(", "))?;
    }
    if let Some(ty) = data.result_ty {
        write!(f, " : {}", ty)?;
    }
    Ok(())
}
