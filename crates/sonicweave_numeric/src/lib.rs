#![cfg_attr(docsrs, feature(doc_cfg))]

//! The numeric tower: exact rationals, prime-factored monzos, lossy reals,
//! and the vals that temper one into the other.
//!
//! # Core Insight
//!
//! Every interval magnitude is one of two things:
//! - An exact [`TimeMonzo`]: a prime-exponent vector plus an unfactored
//!   residual, so arithmetic on it never loses precision.
//! - A lossy [`TimeReal`]: a plain `f64`, used once an operation (an
//!   irrational root, a transcendental function, a residual too big to
//!   factor within budget) can no longer stay exact.
//!
//! [`Magnitude`] is the union of the two and the type everything above this
//! crate actually holds; promotion from exact to real is one-way.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Magnitude                            │
//! │           exact/real dispatch for mul, div, pow              │
//! └─────────────────────────────────────────────────────────────┘
//!                ▲                              ▲
//! ┌──────────────┴──────────────┐ ┌─────────────┴─────────────┐
//! │          TimeMonzo          │ │          TimeReal          │
//! │  prime_exponents + residual │ │     (time_exponent, f64)   │
//! └──────────────────────────────┘ └─────────────────────────────┘
//!                ▲
//!                │ tempers through
//! ┌──────────────┴──────────────┐
//! │        Val / ValBasis        │
//! │   covector step mapping       │
//! └───────────────────────────────┘
//!                │
//! ┌──────────────┴──────────────┐
//! │            primes            │
//! │  budgeted trial-division      │
//! └───────────────────────────────┘
//! ```
//!
//! # No AST Dependency
//!
//! This crate has no path to the language layer. Adding a new expression
//! kind to the interpreter never triggers a recompile of the arithmetic
//! underneath it; the numeric tower is purely mathematical.

pub mod magnitude;
pub mod monzo;
pub mod primes;
pub mod rational;
pub mod real;
pub mod val;

pub use magnitude::Magnitude;
pub use monzo::{RequiresPromotion, TimeMonzo};
pub use primes::{nth_prime, BudgetExceeded, FactorBudget, DEFAULT_PRIMES};
pub use rational::Rational;
pub use real::TimeReal;
pub use val::{PrimeMapping, Val, ValBasis};
