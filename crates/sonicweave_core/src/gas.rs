//! Named gas charges (§5).
//!
//! Every cooperative-cancellation charge in the evaluator goes through one
//! of these functions rather than calling [`sonicweave_lang::Gas::spend`]
//! directly, so the charge sizes named in §5 live in one place and the
//! `OutOfGasError` they raise is pre-spanned and pre-worded consistently.

use sonicweave_base::EvalError;
use sonicweave_lang::{Gas, RootContext};

fn charge(gas: &Gas, n: u64) -> Result<(), EvalError> {
    gas.spend(n).map_err(|_| EvalError::out_of_gas())
}

/// One loop iteration (`while`, `for...of`, `for...in`).
pub fn loop_iteration(ctx: &RootContext) -> Result<(), EvalError> {
    charge(&ctx.gas, 1)
}

/// One element touched while broadcasting an operator over an array/record.
pub fn broadcast_element(ctx: &RootContext) -> Result<(), EvalError> {
    charge(&ctx.gas, 1)
}

/// One step of a harmonic segment or Farey-mediant expansion.
pub fn segment_step(ctx: &RootContext) -> Result<(), EvalError> {
    charge(&ctx.gas, 1)
}

/// `n` squared, for tensor products, constant-structure checks, and LLL
/// reduction, whose cost scales quadratically with interval count.
pub fn quadratic(ctx: &RootContext, n: u64) -> Result<(), EvalError> {
    charge(&ctx.gas, n.saturating_mul(n))
}

/// A function call, charged once per invocation regardless of body size.
pub fn call(ctx: &RootContext) -> Result<(), EvalError> {
    charge(&ctx.gas, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_iteration_exhausts_bounded_gas() {
        let ctx = RootContext::new(Default::default(), Gas::bounded(2));
        assert!(loop_iteration(&ctx).is_ok());
        assert!(loop_iteration(&ctx).is_ok());
        assert!(loop_iteration(&ctx).is_err());
    }

    #[test]
    fn quadratic_charge_scales() {
        let ctx = RootContext::new(Default::default(), Gas::bounded(99));
        assert!(quadratic(&ctx, 10).is_err());
        let ctx2 = RootContext::new(Default::default(), Gas::bounded(100));
        assert!(quadratic(&ctx2, 10).is_ok());
    }
}
