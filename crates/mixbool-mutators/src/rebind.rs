//! Dataflow rebinder: splices a rewrite into the program.

use mixbool_ir::{BuildError, IrContext, OpRef, ValueRef};
use tracing::trace;

use crate::error::{MutationError, MutationResult};

/// Redirect every use of `original`'s result to `new_value`, then remove
/// `original` from the program.
///
/// Returns the number of operands that were redirected. On success the old
/// result has no uses left anywhere in the program.
pub fn rebind(ctx: &mut IrContext, original: OpRef, new_value: ValueRef) -> MutationResult<usize> {
    let old = ctx
        .op_result(original)
        .ok_or(MutationError::NoResult(original))?;
    let block = ctx
        .op(original)
        .parent_block
        .ok_or(BuildError::Detached(original))?;

    let rebound = ctx.replace_all_uses(old, new_value);
    let remaining = ctx.uses(old).len();
    if remaining > 0 {
        return Err(MutationError::DanglingUses {
            value: old,
            remaining,
        });
    }

    ctx.remove_op_from_block(block, original);
    ctx.remove_op(original);
    trace!(%original, %old, %new_value, rebound, "rebound uses and removed original");
    Ok(rebound)
}
