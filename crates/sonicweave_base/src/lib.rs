#![cfg_attr(docsrs, feature(doc_cfg))]

//! # sonicweave-base
//!
//! Pure structural atoms for the SonicWeave evaluator.
//!
//! This crate provides the foundational types used throughout SonicWeave:
//!
//! - [`Arena`] — Bump allocation for stable AST references
//! - [`Interner`]/[`Symbol`] — String interning for O(1) equality
//! - [`Span`] — Source location tracking
//! - [`EvalError`]/[`ErrorKind`]/[`Result`] — Errors with source positions
//! - [`IdGenerator`] — Monotonic tracking-id and scope-id allocation
//!
//! # Design Principles
//!
//! This crate has **no knowledge of musical semantics**. It provides only
//! generic, reusable infrastructure that higher-level crates build upon.
//!
//! # Example
//!
//! ```
//! use sonicweave_base::{Arena, Interner, Span};
//!
//! let arena: Arena<&str> = Arena::new();
//! let mut interner = Interner::new();
//!
//! let hello = interner.intern("hello");
//! let span = Span::new(0, 5);
//!
//! let allocated = arena.alloc("hello");
//! assert_eq!(*allocated, "hello");
//! ```

pub mod arena;
pub mod error;
pub mod ids;
pub mod intern;
pub mod span;

pub use arena::Arena;
pub use error::{ErrorKind, EvalError, Result};
pub use ids::IdGenerator;
pub use intern::{Interner, Symbol, SymbolEq};
pub use span::Span;
