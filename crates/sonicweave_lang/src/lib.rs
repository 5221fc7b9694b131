//! AST, runtime values, scopes, and session state for SonicWeave (§3, §6).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                            ast                               │
//! │        arena-allocated Stmt/Expr tree, no evaluation          │
//! └─────────────────────────────────────────────────────────────┘
//!                               │ evaluated into
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           value                               │
//! │   Interval | Val | ValBasis | Temperament | Array | Record    │
//! │                     | Function | ...                          │
//! └─────────────────────────────────────────────────────────────┘
//!                               │ bound in
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           scope                               │
//! │       Rc<RefCell<...>> parent-chain, implicit scale,          │
//! │              defer stack (no evaluation logic)                │
//! └─────────────────────────────────────────────────────────────┘
//!                               │ alongside
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          context                              │
//! │      RootContext: gas, tracking ids, inflections, mos          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! This crate defines shapes, not behavior: no statement is ever executed
//! here. `sonicweave-core` walks the tree defined in [`ast`] and produces
//! the values defined in [`value`], using the scopes and context defined
//! here to do it.

pub mod ast;
pub mod callable;
pub mod context;
pub mod interval;
pub mod scope;
pub mod value;

pub use ast::{ArrowBody, AssignOp, BinaryOp, Block, Expr, Param, Pattern, Stmt, UnaryOp};
pub use callable::{Callable, NativeArity};
pub use context::{Gas, InflectionConfig, MosConfig, RootContext, RootContextConfig};
pub use interval::{Domain, Echelon, FormattingNode, Interval};
pub use scope::{AssignOutcome, Scope};
pub use value::{Temperament, Value};
