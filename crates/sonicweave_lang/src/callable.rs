//! `Callable` — riffs, arrow functions, and host-provided native builtins.

use std::fmt;
use std::rc::Rc;

use sonicweave_base::Symbol;

use crate::ast::{ArrowBody, Block, Param};
use crate::scope::Scope;
use crate::value::Value;

/// A user-defined or native function value.
pub enum Callable<'a> {
    /// `riff name(params) { body }`.
    Riff {
        name: Symbol,
        params: &'a [Param<'a>],
        rest: Option<Symbol>,
        body: Block<'a>,
        /// The scope the riff closes over — its defining scope, not its
        /// caller's.
        closure: Scope<'a>,
    },
    /// `(params) => body` or `(params) => { body }`.
    Arrow {
        params: &'a [Param<'a>],
        rest: Option<Symbol>,
        body: ArrowBody<'a>,
        closure: Scope<'a>,
    },
    /// A builtin implemented in Rust, registered into the prelude (§6.2).
    /// Takes already-evaluated positional arguments (defaults and rest
    /// binding are resolved by the caller before invoking a native).
    Native {
        name: &'static str,
        arity: NativeArity,
        func: Rc<dyn Fn(&[Value<'a>]) -> Result<Value<'a>, sonicweave_base::EvalError> + 'a>,
    },
}

/// Declared arity for a native builtin, checked before `func` runs so every
/// native gets the same `ArityError` message shape as user-defined riffs.
#[derive(Debug, Clone, Copy)]
pub struct NativeArity {
    pub min: usize,
    pub max: Option<usize>,
}

impl NativeArity {
    pub const fn exact(n: usize) -> Self {
        Self { min: n, max: Some(n) }
    }

    pub const fn at_least(n: usize) -> Self {
        Self { min: n, max: None }
    }

    pub fn contains(&self, n: usize) -> bool {
        n >= self.min && self.max.map_or(true, |max| n <= max)
    }
}

impl<'a> Callable<'a> {
    /// Declared parameter count, used to size up/trim argument lists
    /// before binding (native builtins report their own arity separately).
    pub fn declared_params(&self) -> Option<(&'a [Param<'a>], Option<Symbol>)> {
        match self {
            Callable::Riff { params, rest, .. } => Some((params, *rest)),
            Callable::Arrow { params, rest, .. } => Some((params, *rest)),
            Callable::Native { .. } => None,
        }
    }

    pub fn closure(&self) -> Option<&Scope<'a>> {
        match self {
            Callable::Riff { closure, .. } => Some(closure),
            Callable::Arrow { closure, .. } => Some(closure),
            Callable::Native { .. } => None,
        }
    }
}

impl<'a> fmt::Debug for Callable<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Riff { name, .. } => write!(f, "Callable::Riff({:?})", name),
            Callable::Arrow { .. } => write!(f, "Callable::Arrow"),
            Callable::Native { name, .. } => write!(f, "Callable::Native({name})"),
        }
    }
}

impl<'a> PartialEq for Callable<'a> {
    /// Functions compare by identity-ish shape only: two distinct riffs
    /// with identical source never compare equal. Good enough for `==` in
    /// user code, which almost never compares functions anyway.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Callable::Riff { name: a, .. }, Callable::Riff { name: b, .. }) => a == b,
            (Callable::Native { name: a, .. }, Callable::Native { name: b, .. }) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_arity_exact_rejects_wrong_count() {
        let arity = NativeArity::exact(2);
        assert!(arity.contains(2));
        assert!(!arity.contains(1));
        assert!(!arity.contains(3));
    }

    #[test]
    fn native_arity_at_least_has_no_upper_bound() {
        let arity = NativeArity::at_least(1);
        assert!(arity.contains(1));
        assert!(arity.contains(100));
        assert!(!arity.contains(0));
    }
}
