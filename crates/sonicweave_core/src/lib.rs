//! Tree-walking evaluator, operator protocol, and prelude for SonicWeave
//! (§2 layers L5-L6).
//!
//! This crate consumes the shapes defined in `sonicweave-lang` (AST,
//! `Value`, `Scope`, `RootContext`) and the numeric tower in
//! `sonicweave-numeric`, and does the actual work of walking a program and
//! producing a scale. Host applications depend on this crate (directly, or
//! through the root `sonicweave` facade) to run SonicWeave source that has
//! already been parsed into an AST by an external collaborator (§6.1).

pub mod gas;
pub mod interpreter;
pub mod operators;
pub mod prelude;

pub use interpreter::{Flow, Interpreter, Signal};
pub use prelude::Prelude;

use sonicweave_base::Interner;
use sonicweave_lang::{RootContext, Scope, Stmt, Value};
use sonicweave_numeric::DEFAULT_PRIMES;

/// Runs a parsed program to completion and returns the scale it built.
///
/// `use_prelude` mirrors `evaluate_source`'s host-facing flag (§6.3): when
/// true, the program's scope is a child of a fresh scope with every host
/// built-in installed; when false, the program runs directly in a bare
/// root scope (used by tests that want to exercise the interpreter without
/// the prelude's names in play).
pub fn run_program<'a>(
    interner: &'a mut Interner,
    ctx: &'a RootContext,
    stmts: &'a [Stmt<'a>],
    use_prelude: bool,
) -> Result<Vec<Value<'a>>, Signal<'a>> {
    let basis_primes: &'a [u64] = DEFAULT_PRIMES;
    let root = Scope::root();
    if use_prelude {
        Prelude::install(&root, interner, ctx, basis_primes);
    }
    let program_scope = root.child();
    let interp = Interpreter::new(interner, ctx, basis_primes);
    interp.evaluate_program(&program_scope, stmts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonicweave_lang::{Expr, Stmt};

    #[test]
    fn bare_expression_statement_pushes_onto_the_scale() {
        let mut interner = Interner::new();
        let ctx = RootContext::unbounded();
        let expr = Expr::IntegerLiteral { value: 7, span: sonicweave_base::Span::default() };
        let stmts = [Stmt::ExprStmt { expr: &expr, span: sonicweave_base::Span::default() }];
        let scale = run_program(&mut interner, &ctx, &stmts, false).unwrap_or_else(|_| panic!("evaluation failed"));
        assert_eq!(scale.len(), 1);
    }

    #[test]
    fn gas_guard_halts_an_infinite_loop() {
        let mut interner = Interner::new();
        let ctx = RootContext::new(sonicweave_lang::RootContextConfig::default(), sonicweave_lang::Gas::bounded(100));
        let cond = Expr::BoolLiteral { value: true, span: sonicweave_base::Span::default() };
        let body: &[Stmt] = &[];
        let stmts = [Stmt::While {
            condition: &cond,
            body,
            else_branch: None,
            span: sonicweave_base::Span::default(),
        }];
        let result = run_program(&mut interner, &ctx, &stmts, false);
        assert!(result.is_err());
    }
}
