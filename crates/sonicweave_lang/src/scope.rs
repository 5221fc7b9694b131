//! Lexical scopes as an `Rc<RefCell<...>>` parent-chain tree.
//!
//! The interpreter this crate was grown from used a flat `Vec<HashMap>`
//! scope stack: fine for code that never captures an enclosing scope past
//! the statement that created it. SonicWeave's `riff`/arrow functions are
//! first-class closures that can outlive the block they were declared in,
//! so a flat stack won't do — popping scope N+1 while a closure from it is
//! still reachable would dangle. A parent-chain of reference-counted scopes
//! gives closures their own strong handle to every scope they need and lets
//! unreferenced scopes free themselves the moment nothing points at them
//! any more. Nothing in this tree can form a cycle (children hold a
//! `Rc` *up* to their parent, never the reverse), so plain `Rc` suffices —
//! no `Weak`, no cycle collector.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use sonicweave_base::Symbol;

use crate::ast::Stmt;
use crate::value::Value;

/// A deferred statement captured at `defer` time, run in LIFO order when
/// its owning scope exits (§3.6).
pub struct Deferred<'a> {
    pub body: &'a Stmt<'a>,
}

struct ScopeInner<'a> {
    parent: Option<Scope<'a>>,
    bindings: HashMap<Symbol, Binding<'a>>,
    /// The implicit scale being built by this block (`` ` `` array, §3.4).
    implicit_scale: Vec<Value<'a>>,
    /// Statements registered with `defer`, popped and run in reverse when
    /// this scope exits (§3.6).
    deferred: Vec<Deferred<'a>>,
}

struct Binding<'a> {
    value: Value<'a>,
    mutable: bool,
}

/// A handle to one lexical scope. Cheap to clone; clones share the same
/// underlying bindings.
#[derive(Clone)]
pub struct Scope<'a>(Rc<RefCell<ScopeInner<'a>>>);

impl<'a> Scope<'a> {
    /// A fresh root scope with no parent (the global scope).
    pub fn root() -> Self {
        Self(Rc::new(RefCell::new(ScopeInner {
            parent: None,
            bindings: HashMap::new(),
            implicit_scale: Vec::new(),
            deferred: Vec::new(),
        })))
    }

    /// A child scope, e.g. entering a block, function call, or loop body.
    pub fn child(&self) -> Self {
        Self(Rc::new(RefCell::new(ScopeInner {
            parent: Some(self.clone()),
            bindings: HashMap::new(),
            implicit_scale: Vec::new(),
            deferred: Vec::new(),
        })))
    }

    /// Binds `name` in this scope, shadowing any binding from an enclosing
    /// scope. `mutable` controls whether later `assign` calls succeed.
    pub fn declare(&self, name: Symbol, value: Value<'a>, mutable: bool) {
        self.0.borrow_mut().bindings.insert(name, Binding { value, mutable });
    }

    /// Looks up `name`, walking outward through parent scopes.
    pub fn get(&self, name: Symbol) -> Option<Value<'a>> {
        let inner = self.0.borrow();
        if let Some(b) = inner.bindings.get(&name) {
            return Some(b.value.clone());
        }
        inner.parent.as_ref().and_then(|p| p.get(name))
    }

    /// Reassigns the nearest enclosing binding of `name`.
    ///
    /// Returns `false` if `name` is unbound (a `NameError`, raised by the
    /// caller) or bound `const` (a `TypeError`, also raised by the caller —
    /// this method only reports which case happened via `AssignOutcome`).
    pub fn assign(&self, name: Symbol, value: Value<'a>) -> AssignOutcome {
        {
            let mut inner = self.0.borrow_mut();
            if let Some(b) = inner.bindings.get_mut(&name) {
                if !b.mutable {
                    return AssignOutcome::Immutable;
                }
                b.value = value;
                return AssignOutcome::Assigned;
            }
        }
        let parent = self.0.borrow().parent.clone();
        match parent {
            Some(p) => p.assign(name, value),
            None => AssignOutcome::Unbound,
        }
    }

    /// Pushes `value` onto this scope's implicit scale, the default action
    /// for a bare expression statement (§3.4).
    pub fn push_implicit(&self, value: Value<'a>) {
        self.0.borrow_mut().implicit_scale.push(value);
    }

    /// Pushes every element of `values` onto this scope's implicit scale,
    /// the "block/function-exit scale-spreading" rule: a nested block's
    /// implicit scale is spread into its parent's, not pushed as one array.
    pub fn extend_implicit(&self, values: Vec<Value<'a>>) {
        self.0.borrow_mut().implicit_scale.extend(values);
    }

    /// Snapshot of this scope's implicit scale so far.
    pub fn implicit_scale(&self) -> Vec<Value<'a>> {
        self.0.borrow().implicit_scale.clone()
    }

    /// Takes this scope's implicit scale, leaving it empty.
    pub fn take_implicit(&self) -> Vec<Value<'a>> {
        std::mem::take(&mut self.0.borrow_mut().implicit_scale)
    }

    /// Overwrites this scope's implicit scale wholesale, the primitive
    /// behind implicit tempering: a bare val pushed onto a scale retunes
    /// every interval already on it in place (§4.3, §8 scenario 3).
    pub fn set_implicit(&self, values: Vec<Value<'a>>) {
        self.0.borrow_mut().implicit_scale = values;
    }

    /// `$`: the current scope's implicit scale, read-only.
    pub fn current_scale(&self) -> Vec<Value<'a>> {
        self.implicit_scale()
    }

    /// `££` with `depth` repetitions: the implicit scale `depth` enclosing
    /// scopes out, or an empty scale past the root.
    pub fn parent_scale(&self, depth: u32) -> Vec<Value<'a>> {
        let mut cur = self.clone();
        for _ in 0..depth {
            let parent = cur.0.borrow().parent.clone();
            match parent {
                Some(p) => cur = p,
                None => return Vec::new(),
            }
        }
        cur.implicit_scale()
    }

    /// Registers a statement to run when this scope exits, LIFO (§3.6).
    pub fn defer(&self, body: &'a Stmt<'a>) {
        self.0.borrow_mut().deferred.push(Deferred { body });
    }

    /// Pops and returns this scope's deferred statements in run order
    /// (last registered, first run).
    pub fn take_deferred(&self) -> Vec<Deferred<'a>> {
        let mut deferred = std::mem::take(&mut self.0.borrow_mut().deferred);
        deferred.reverse();
        deferred
    }

    /// Whether `self` and `other` are the exact same scope (identity, not
    /// structural equality).
    pub fn is_same(&self, other: &Scope<'a>) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Outcome of [`Scope::assign`], letting the caller pick the right
/// `EvalError` kind without this module depending on `sonicweave-base`'s
/// error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOutcome {
    Assigned,
    Unbound,
    Immutable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonicweave_numeric::{FactorBudget, Magnitude, TimeMonzo, DEFAULT_PRIMES};

    fn unison() -> Value<'static> {
        let mut budget = FactorBudget::new(16);
        let m = TimeMonzo::from_fraction(1, 1, DEFAULT_PRIMES, &mut budget);
        Value::Interval(Rc::new(crate::interval::Interval::bare(
            Magnitude::Exact(m),
            crate::interval::Domain::Linear,
            crate::interval::Echelon::Relative,
        )))
    }

    #[test]
    fn child_scope_sees_parent_bindings() {
        let root = Scope::root();
        let x = Symbol::default();
        root.declare(x, unison(), false);
        let child = root.child();
        assert!(child.get(x).is_some());
    }

    #[test]
    fn assign_in_child_does_not_shadow_without_declare() {
        let root = Scope::root();
        let x = Symbol::default();
        root.declare(x, unison(), true);
        let child = root.child();
        assert_eq!(child.assign(x, unison()), AssignOutcome::Assigned);
    }

    #[test]
    fn assigning_immutable_binding_is_rejected() {
        let root = Scope::root();
        let x = Symbol::default();
        root.declare(x, unison(), false);
        assert_eq!(root.assign(x, unison()), AssignOutcome::Immutable);
    }

    #[test]
    fn assigning_unbound_name_is_reported() {
        let root = Scope::root();
        assert_eq!(root.assign(Symbol::default(), unison()), AssignOutcome::Unbound);
    }

    #[test]
    fn parent_scale_past_root_is_empty() {
        let root = Scope::root();
        assert!(root.parent_scale(1).is_empty());
    }
}
