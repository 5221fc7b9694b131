//! Scenario tests from the literal input/output table: each builds its
//! program directly as an AST (no parser in this workspace) and checks the
//! resulting scale against the expected values.

use sonicweave_base::{Interner, Span};
use sonicweave_lang::ast::*;
use sonicweave_lang::{Gas, RootContext, RootContextConfig, Value};
use sonicweave_numeric::DEFAULT_PRIMES;

fn interval_cents(value: &Value) -> f64 {
    match value {
        Value::Interval(iv) => iv.magnitude.total_cents(DEFAULT_PRIMES),
        other => panic!("expected an interval, got {}", other.type_name()),
    }
}

fn fraction_cents(numer: i64, denom: i64) -> f64 {
    1200.0 * (numer as f64 / denom as f64).log2()
}

#[test]
fn harmonic_segment_four_to_eight_yields_four_ascending_intervals() {
    let mut interner = Interner::new();
    let ctx = RootContext::unbounded();
    let span = Span::default();
    let start = Expr::IntegerLiteral { value: 4, span };
    let end = Expr::IntegerLiteral { value: 8, span };
    let segment = Expr::HarmonicSegment { start: &start, end: &end, span };
    let stmts = [Stmt::ExprStmt { expr: &segment, span }];

    let scale = sonicweave::evaluate(&mut interner, &ctx, &stmts, false).unwrap_or_else(|_| panic!("evaluation failed"));

    assert_eq!(scale.len(), 4);
    let expected = [(5, 4), (6, 4), (7, 4), (8, 4)];
    for (value, (numer, denom)) in scale.iter().zip(expected) {
        let got = interval_cents(value);
        let want = fraction_cents(numer, denom);
        assert!((got - want).abs() < 1e-6, "got {got}c want {want}c");
    }
}

#[test]
fn gas_guard_halts_an_infinite_loop_before_underflow() {
    let mut interner = Interner::new();
    let ctx = RootContext::new(RootContextConfig::default(), Gas::bounded(100));
    let span = Span::default();
    let cond = Expr::BoolLiteral { value: true, span };
    let body: &[Stmt] = &[];
    let stmts = [Stmt::While { condition: &cond, body, else_branch: None, span }];

    let result = sonicweave::evaluate(&mut interner, &ctx, &stmts, false);

    assert!(result.is_err());
    assert_eq!(ctx.gas.remaining(), Some(0));
}

#[test]
fn riff_default_parameter_pushes_a_single_interval_for_its_side_effect() {
    // riff plusOne(x) { x ~+ 1 } ; plusOne(2)
    let mut interner = Interner::new();
    let ctx = RootContext::unbounded();
    let span = Span::default();
    let x_sym = interner.intern("x");
    let plus_one_sym = interner.intern("plusOne");

    let x_ref = Expr::Identifier { name: x_sym, span };
    let one = Expr::IntegerLiteral { value: 1, span };
    let body_expr = Expr::Binary { op: BinaryOp::TildeAdd, left: &x_ref, right: &one, span };
    let body_stmt = Stmt::ExprStmt { expr: &body_expr, span };
    let body: &[Stmt] = std::slice::from_ref(&body_stmt);

    let param_pattern = Pattern::Name(x_sym);
    let params = [Param { pattern: &param_pattern, default: None }];

    let decl = Stmt::FunctionDeclaration { name: plus_one_sym, params: &params, rest: None, body, span };

    let callee = Expr::Identifier { name: plus_one_sym, span };
    let two = Expr::IntegerLiteral { value: 2, span };
    let args = [two];
    let call = Expr::Call { callee: &callee, args: &args, span };
    let call_stmt = Stmt::ExprStmt { expr: &call, span };

    let stmts = [decl, call_stmt];
    let scale = sonicweave::evaluate(&mut interner, &ctx, &stmts, false).unwrap_or_else(|_| panic!("evaluation failed"));

    assert_eq!(scale.len(), 1);
    let got = interval_cents(&scale[0]);
    let want = fraction_cents(3, 1);
    assert!((got - want).abs() < 1e-6, "got {got}c want {want}c");
}

#[test]
fn implicit_tempering_retunes_the_scale_built_so_far() {
    // 5/4; 3/2; edo(12)
    let mut interner = Interner::new();
    let ctx = RootContext::unbounded();
    let span = Span::default();
    let third = Expr::FractionLiteral { numer: 5, denom: 4, span };
    let fifth = Expr::FractionLiteral { numer: 3, denom: 2, span };
    let edo_sym = interner.intern("edo");
    let edo_callee = Expr::Identifier { name: edo_sym, span };
    let twelve = Expr::IntegerLiteral { value: 12, span };
    let edo_args = [twelve];
    let edo_call = Expr::Call { callee: &edo_callee, args: &edo_args, span };

    let stmts = [
        Stmt::ExprStmt { expr: &third, span },
        Stmt::ExprStmt { expr: &fifth, span },
        Stmt::ExprStmt { expr: &edo_call, span },
    ];

    let scale = sonicweave::evaluate(&mut interner, &ctx, &stmts, true).unwrap_or_else(|_| panic!("evaluation failed"));

    assert_eq!(scale.len(), 2);
    let got_third = interval_cents(&scale[0]);
    let got_fifth = interval_cents(&scale[1]);
    assert!((got_third - 400.0).abs() < 1e-6, "expected 4\\12 (400c), got {got_third}c");
    assert!((got_fifth - 700.0).abs() < 1e-6, "expected 7\\12 (700c), got {got_fifth}c");
}

#[test]
fn defer_statements_run_in_lifo_order() {
    // { let x = 5; defer x += 2; defer x /= 2; }
    let mut interner = Interner::new();
    let ctx = RootContext::unbounded();
    let span = Span::default();
    let x_sym = interner.intern("x");

    let five = Expr::IntegerLiteral { value: 5, span };
    let pattern = Pattern::Name(x_sym);
    let let_stmt = Stmt::VariableDeclaration { pattern: &pattern, value: Some(&five), mutable: true, span };

    let x_ref_1 = Expr::Identifier { name: x_sym, span };
    let two = Expr::IntegerLiteral { value: 2, span };
    let defer1_body = Stmt::Assignment { target: &x_ref_1, op: AssignOp::Add, value: &two, span };
    let defer1 = Stmt::Defer { body: &defer1_body, span };

    let x_ref_2 = Expr::Identifier { name: x_sym, span };
    let defer2_body = Stmt::Assignment { target: &x_ref_2, op: AssignOp::Div, value: &two, span };
    let defer2 = Stmt::Defer { body: &defer2_body, span };

    // Defers run at the block's own exit, before control returns to the
    // statement after it — so the value is read back at the program level,
    // not inside the block where it would still be pre-defer.
    let block_body = [defer1, defer2];
    let block = Stmt::Block { body: &block_body, span };

    let x_ref_push = Expr::Identifier { name: x_sym, span };
    let push_stmt = Stmt::ExprStmt { expr: &x_ref_push, span };

    let stmts = [let_stmt, block, push_stmt];
    let scale = sonicweave::evaluate(&mut interner, &ctx, &stmts, false).unwrap_or_else(|_| panic!("evaluation failed"));

    assert_eq!(scale.len(), 1);
    let got = interval_cents(&scale[0]);
    let want = fraction_cents(9, 2);
    assert!((got - want).abs() < 1e-6, "expected x=4.5 (9/2), got {got}c");
}

