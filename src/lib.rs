//! Host-facing facade for the SonicWeave evaluator (§6.3, §6.4).
//!
//! This crate wires together the four library crates (`sonicweave-base`,
//! `sonicweave-numeric`, `sonicweave-lang`, `sonicweave-core`) into the
//! small surface a host application actually needs: run an already-parsed
//! program, inspect the scale it produced, and persist/restore a session's
//! `RootContext` between calls.
//!
//! `parse_ast(source) -> AST` is not implemented here. Producing an AST from
//! source text is the grammar/parser's job, an external collaborator this
//! workspace doesn't own or model (the AST shape it must produce is fixed
//! by [`sonicweave_lang::ast`]). A host pairs this crate with its own
//! parser and calls [`evaluate`] with the result.

pub use sonicweave_base::{EvalError, ErrorKind, Interner, Span, Symbol};
pub use sonicweave_core::{Flow, Interpreter, Prelude, Signal};
pub use sonicweave_lang::{
    ast, AssignOp, BinaryOp, Callable, Domain, Echelon, Gas, InflectionConfig, Interval, MosConfig, NativeArity, RootContext,
    RootContextConfig, Scope, Stmt, UnaryOp, Value,
};
pub use sonicweave_numeric::DEFAULT_PRIMES;

use serde::{Deserialize, Serialize};

/// Runs a parsed program against a fresh root context and returns the scale
/// it builds (the array bound to `$` in the root scope when evaluation
/// finishes, per §6.2).
///
/// `use_prelude` selects whether the program's scope is a child of a scope
/// with the host built-ins installed (§4.7) or runs bare; tests that probe
/// the interpreter in isolation from prelude names pass `false`.
pub fn evaluate<'a>(
    interner: &'a mut Interner,
    ctx: &'a RootContext,
    program: &'a [Stmt<'a>],
    use_prelude: bool,
) -> Result<Vec<Value<'a>>, Signal<'a>> {
    sonicweave_core::run_program(interner, ctx, program, use_prelude)
}

/// The persisted shape of a session's `RootContext` (§6.4): a tagged-object
/// representation with exactly the keys the specification names. A missing
/// `gas` key rehydrates to an unbounded budget, matching a host that never
/// configured one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub title: Option<String>,
    #[serde(rename = "unisonFrequency")]
    pub unison_frequency: Option<f64>,
    #[serde(rename = "C4")]
    pub c4: f64,
    pub up: f64,
    pub lift: f64,
    #[serde(default)]
    pub gas: Option<u64>,
    #[serde(rename = "trackingIndex")]
    pub tracking_index: u64,
    #[serde(rename = "mosConfig")]
    pub mos_config: Option<MosConfig>,
}

impl SessionState {
    /// Captures the persistable parts of `ctx` (§6.4). The process-only
    /// tracking-id counter is captured by value, not by reference: resuming
    /// from this snapshot restarts ids at `tracking_index`, it doesn't share
    /// state with the context that produced it.
    pub fn capture(ctx: &RootContext) -> Self {
        Self {
            title: ctx.config.title.clone(),
            unison_frequency: ctx.config.unison_frequency,
            c4: ctx.config.c4_hz,
            up: ctx.config.inflections.up_cents,
            lift: ctx.config.inflections.lift_cents,
            gas: ctx.gas.remaining(),
            tracking_index: ctx.tracking_index(),
            mos_config: ctx.config.mos_config.clone(),
        }
    }

    /// Rebuilds a `RootContext` from a persisted snapshot. A missing `gas`
    /// (deserialized as `None`) rehydrates to unbounded, per §6.4.
    pub fn restore(self) -> RootContext {
        let config = RootContextConfig {
            title: self.title,
            c4_hz: self.c4,
            unison_frequency: self.unison_frequency,
            inflections: InflectionConfig { up_cents: self.up, lift_cents: self.lift },
            mos_config: self.mos_config,
            num_components: DEFAULT_PRIMES.len(),
        };
        let gas = match self.gas {
            Some(amount) => Gas::bounded(amount),
            None => Gas::unbounded(),
        };
        let ctx = RootContext::new(config, gas);
        for _ in 0..self.tracking_index {
            ctx.next_tracking_id();
        }
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_state_round_trips_through_json() {
        let ctx = RootContext::unbounded();
        ctx.next_tracking_id();
        ctx.next_tracking_id();
        let snapshot = SessionState::capture(&ctx);
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tracking_index, 2);
        assert_eq!(back.gas, None);

        let restored = back.restore();
        assert_eq!(restored.tracking_index(), 2);
        assert_eq!(restored.gas.remaining(), None);
    }

    #[test]
    fn missing_gas_key_rehydrates_to_unbounded() {
        let json = r#"{
            "title": null,
            "unisonFrequency": null,
            "C4": 261.6255653005986,
            "up": 21.5,
            "lift": 64.5,
            "trackingIndex": 0,
            "mosConfig": null
        }"#;
        let state: SessionState = serde_json::from_str(json).unwrap();
        assert_eq!(state.gas, None);
        let ctx = state.restore();
        assert_eq!(ctx.gas.remaining(), None);
    }

    #[test]
    fn bare_program_evaluates_to_a_single_pushed_interval() {
        let mut interner = Interner::new();
        let ctx = RootContext::unbounded();
        let span = Span::default();
        let expr = ast::Expr::IntegerLiteral { value: 5, span };
        let stmts = [Stmt::ExprStmt { expr: &expr, span }];
        let scale = evaluate(&mut interner, &ctx, &stmts, false).unwrap();
        assert_eq!(scale.len(), 1);
    }
}
