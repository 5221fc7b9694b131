//! Shared fixtures for the scenario and property tests in `tests/`.
//!
//! Since the grammar/parser is an external collaborator this workspace
//! doesn't own, every test here builds its AST directly with these
//! constructors rather than parsing source text. That keeps the tests
//! honest about what this crate is actually responsible for: the
//! evaluator, not the syntax.

use sonicweave_base::Span;
use sonicweave_lang::ast::*;

pub fn span() -> Span {
    Span::default()
}

pub fn int(value: i64) -> Expr<'static> {
    Expr::IntegerLiteral { value, span: span() }
}

pub fn frac(numer: i64, denom: i64) -> Expr<'static> {
    Expr::FractionLiteral { numer, denom, span: span() }
}

pub fn boolean(value: bool) -> Expr<'static> {
    Expr::BoolLiteral { value, span: span() }
}

pub fn expr_stmt<'a>(expr: &'a Expr<'a>) -> Stmt<'a> {
    Stmt::ExprStmt { expr, span: span() }
}
