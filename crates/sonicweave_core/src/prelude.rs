//! Host-native builtins registered into the root scope (§4.7).
//!
//! The DSL-level standard library (the "prelude" proper) is out of scope
//! here — it would be source text evaluated by a parser this crate doesn't
//! own. What this module provides instead is the fixed set of Rust-native
//! riffs that prelude source, and user programs, call directly: the
//! documented host built-ins §4.7 refers to. `install` registers them as
//! [`Callable::Native`] values into a scope, the same way a host would wire
//! up `PRELUDE_VOLATILES` hooks like `warn`.

use std::rc::Rc;

use sonicweave_base::EvalError;
use sonicweave_lang::{Callable, NativeArity, RootContext, Scope, Value};
use sonicweave_numeric::{FactorBudget, Magnitude, TimeMonzo, TimeReal};

use crate::operators;

/// Registers every host built-in into `scope`, a global scope a user
/// program's scope will be a child of.
pub struct Prelude;

impl Prelude {
    pub fn install<'a>(scope: &Scope<'a>, interner: &mut sonicweave_base::Interner, ctx: &'a RootContext, basis_primes: &'a [u64]) {
        Self::install_array_builtins(scope, interner, basis_primes);
        Self::install_numeric_builtins(scope, interner, basis_primes);
        Self::install_scale_builtins(scope, interner, ctx, basis_primes);
        Self::install_host_hooks(scope, interner);
    }

    fn declare_native<'a>(
        scope: &Scope<'a>,
        interner: &mut sonicweave_base::Interner,
        name: &'static str,
        arity: NativeArity,
        func: impl Fn(&[Value<'a>]) -> Result<Value<'a>, EvalError> + 'a,
    ) {
        let sym = interner.intern(name);
        let callable = Callable::Native { name, arity, func: Rc::new(func) };
        scope.declare(sym, Value::Function(Rc::new(callable)), false);
    }

    /// Array/collection utilities: `length`, `reversed`, `sorted`, `repeated`.
    fn install_array_builtins<'a>(scope: &Scope<'a>, interner: &mut sonicweave_base::Interner, basis_primes: &'a [u64]) {
        Self::declare_native(scope, interner, "length", NativeArity::exact(1), |args| match &args[0] {
            Value::Array(a) => Ok(integer_value(a.len() as i64)),
            Value::Record(r) => Ok(integer_value(r.len() as i64)),
            Value::String(s) => Ok(integer_value(s.chars().count() as i64)),
            other => Err(EvalError::type_error(format!("length() expects an array, got {}", other.type_name()))),
        });

        Self::declare_native(scope, interner, "reversed", NativeArity::exact(1), |args| match &args[0] {
            Value::Array(a) => {
                let mut out = a.as_ref().clone();
                out.reverse();
                Ok(Value::Array(Rc::new(out)))
            }
            other => Err(EvalError::type_error(format!("reversed() expects an array, got {}", other.type_name()))),
        });

        Self::declare_native(scope, interner, "sorted", NativeArity::exact(1), |args| match &args[0] {
            Value::Array(a) => {
                let mut out = a.as_ref().clone();
                out.sort_by(|x, y| interval_cents(x).partial_cmp(&interval_cents(y)).unwrap_or(std::cmp::Ordering::Equal));
                Ok(Value::Array(Rc::new(out)))
            }
            other => Err(EvalError::type_error(format!("sorted() expects an array, got {}", other.type_name()))),
        });

        Self::declare_native(scope, interner, "repeated", NativeArity::exact(2), move |args| {
            let Value::Array(a) = &args[0] else {
                return Err(EvalError::type_error("repeated() expects an array as its first argument"));
            };
            let n = as_count(&args[1], basis_primes)?;
            let mut out = Vec::with_capacity(a.len() * n);
            for _ in 0..n {
                out.extend(a.iter().cloned());
            }
            Ok(Value::Array(Rc::new(out)))
        });
    }

    /// Interval introspection: `cents`, `fraction`, `isExact`, `tenneyHeight`.
    fn install_numeric_builtins<'a>(scope: &Scope<'a>, interner: &mut sonicweave_base::Interner, basis_primes: &'a [u64]) {
        Self::declare_native(scope, interner, "cents", NativeArity::exact(1), move |args| match &args[0] {
            Value::Interval(iv) => Ok(Value::Interval(Rc::new(sonicweave_lang::Interval::bare(
                Magnitude::Real(TimeReal::relative(iv.magnitude.total_cents(basis_primes))),
                sonicweave_lang::Domain::Linear,
                sonicweave_lang::Echelon::Relative,
            )))),
            other => Err(EvalError::type_error(format!("cents() expects an interval, got {}", other.type_name()))),
        });

        Self::declare_native(scope, interner, "isExact", NativeArity::exact(1), |args| match &args[0] {
            Value::Interval(iv) => Ok(Value::Bool(iv.is_exact())),
            other => Err(EvalError::type_error(format!("isExact() expects an interval, got {}", other.type_name()))),
        });

        Self::declare_native(scope, interner, "tenneyHeight", NativeArity::exact(1), move |args| match &args[0] {
            Value::Interval(iv) => match &iv.magnitude {
                Magnitude::Exact(m) => {
                    let h = m
                        .tenney_height(basis_primes)
                        .ok_or_else(|| EvalError::value_error("tenneyHeight() requires a rational interval"))?;
                    Ok(Value::Interval(Rc::new(sonicweave_lang::Interval::bare(
                        Magnitude::Real(TimeReal::relative(h)),
                        sonicweave_lang::Domain::Linear,
                        sonicweave_lang::Echelon::Relative,
                    ))))
                }
                Magnitude::Real(_) => Err(EvalError::domain_error("tenneyHeight() requires an exact interval")),
            },
            other => Err(EvalError::type_error(format!("tenneyHeight() expects an interval, got {}", other.type_name()))),
        });

        // The grammar this crate pairs with is out of scope, so the `N@`
        // val-literal syntax (§4.3, §8 scenario 3) has no AST node to match
        // on here; `edo(n)` is the host-native builtin that plays its role,
        // building the patent val of n-EDO restricted to the default basis.
        Self::declare_native(scope, interner, "edo", NativeArity::exact(1), move |args| {
            let divisions = as_count(&args[0], basis_primes)? as i64;
            let mut budget = FactorBudget::new(16);
            let octave = TimeMonzo::from_fraction(2, 1, basis_primes, &mut budget);
            let basis = sonicweave_numeric::ValBasis::prime_power(basis_primes, basis_primes.len());
            let val = sonicweave_numeric::Val::patent(divisions, &octave, basis, basis_primes);
            Ok(Value::Val(Rc::new(val)))
        });
    }

    /// Scale-construction helpers that walk the implicit-scale protocol
    /// rather than a single value: `reduce`, `octaveReduce`, `flatten`.
    fn install_scale_builtins<'a>(scope: &Scope<'a>, interner: &mut sonicweave_base::Interner, ctx: &'a RootContext, basis_primes: &'a [u64]) {
        Self::declare_native(scope, interner, "octaveReduce", NativeArity::exact(1), move |args| {
            let Value::Interval(iv) = &args[0] else {
                return Err(EvalError::type_error("octaveReduce() expects an interval"));
            };
            let mut budget = FactorBudget::new(16);
            let equave = Magnitude::Exact(TimeMonzo::from_fraction(2, 1, basis_primes, &mut budget));
            let mut magnitude = iv.magnitude.clone();
            while magnitude.total_cents(basis_primes) >= 1200.0 {
                magnitude = magnitude.div(&equave, basis_primes);
            }
            while magnitude.total_cents(basis_primes) < 0.0 {
                magnitude = magnitude.mul(&equave, basis_primes);
            }
            Ok(Value::Interval(Rc::new(sonicweave_lang::Interval {
                magnitude,
                domain: iv.domain,
                echelon: iv.echelon,
                node: sonicweave_lang::FormattingNode::None,
                color: iv.color.clone(),
                label: None,
                tracking_ids: iv.tracking_ids.clone(),
            })))
        });

        Self::declare_native(scope, interner, "flatten", NativeArity::exact(1), |args| {
            let Value::Array(outer) = &args[0] else {
                return Err(EvalError::type_error("flatten() expects an array"));
            };
            let mut out = Vec::new();
            for item in outer.iter() {
                match item {
                    Value::Array(inner) => out.extend(inner.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Ok(Value::Array(Rc::new(out)))
        });

        Self::declare_native(scope, interner, "stack", NativeArity::exact(1), move |args| {
            let Value::Array(a) = &args[0] else {
                return Err(EvalError::type_error("stack() expects an array of intervals"));
            };
            let mut out = Vec::with_capacity(a.len());
            let mut running: Option<Value> = None;
            for item in a.iter() {
                let next = match &running {
                    Some(prev) => operators::apply_binary(
                        sonicweave_lang::BinaryOp::Mul,
                        prev.clone(),
                        item.clone(),
                        ctx,
                        basis_primes,
                        sonicweave_base::Span::default(),
                    )?,
                    None => item.clone(),
                };
                out.push(next.clone());
                running = Some(next);
            }
            Ok(Value::Array(Rc::new(out)))
        });
    }

    /// Hookable host integrations (§4.7's `PRELUDE_VOLATILES`): `warn` is
    /// the one named explicitly in the spec. A host embedding this crate
    /// replaces this registration with its own logging sink by re-declaring
    /// the name in a child scope after `install` runs.
    fn install_host_hooks<'a>(scope: &Scope<'a>, interner: &mut sonicweave_base::Interner) {
        Self::declare_native(scope, interner, "warn", NativeArity::at_least(1), |args| {
            let message = args.iter().map(describe).collect::<Vec<_>>().join(" ");
            tracing::warn!(target: "sonicweave::user", "{message}");
            Ok(Value::Niente)
        });
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Niente => "niente".to_string(),
        Value::Interval(iv) => format!("{}c", iv.magnitude.total_cents(&[])),
        other => other.type_name().to_string(),
    }
}

fn interval_cents(value: &Value) -> f64 {
    match value {
        Value::Interval(iv) => iv.magnitude.total_cents(&[]),
        _ => f64::NAN,
    }
}

fn as_count(value: &Value, basis_primes: &[u64]) -> Result<usize, EvalError> {
    use num_traits::{One, ToPrimitive};
    match value {
        Value::Interval(iv) => match &iv.magnitude {
            Magnitude::Exact(m) => {
                let fraction = m.as_fraction(basis_primes).ok_or_else(|| EvalError::value_error("expected an integer count"))?;
                if !fraction.denom().is_one() {
                    return Err(EvalError::value_error("expected an integer count"));
                }
                fraction.numer().to_i64().and_then(|n| usize::try_from(n).ok()).ok_or_else(|| EvalError::value_error("count out of range"))
            }
            Magnitude::Real(_) => Err(EvalError::type_error("expected an integer count")),
        },
        _ => Err(EvalError::type_error("expected an integer count")),
    }
}

fn integer_value<'a>(n: i64) -> Value<'a> {
    let mut budget = FactorBudget::new(16);
    let m = TimeMonzo::from_fraction(n, 1, &[], &mut budget);
    Value::Interval(Rc::new(sonicweave_lang::Interval::bare(
        Magnitude::Exact(m),
        sonicweave_lang::Domain::Linear,
        sonicweave_lang::Echelon::Relative,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonicweave_base::Interner;
    use sonicweave_numeric::{rational, DEFAULT_PRIMES};

    #[test]
    fn length_reports_array_size() {
        let ctx = RootContext::unbounded();
        let mut interner = Interner::new();
        let scope = Scope::root();
        Prelude::install(&scope, &mut interner, &ctx, DEFAULT_PRIMES);
        let length_sym = interner.lookup("length").unwrap();
        let Value::Function(callable) = scope.get(length_sym).unwrap() else { panic!("expected function") };
        let Callable::Native { func, .. } = callable.as_ref() else { panic!("expected native") };
        let arr = Value::Array(Rc::new(vec![Value::Niente, Value::Niente]));
        let result = func(&[arr]).unwrap();
        match result {
            Value::Interval(iv) => match &iv.magnitude {
                Magnitude::Exact(m) => assert_eq!(rational::to_f64(&m.residual), 2.0),
                _ => panic!("expected exact magnitude"),
            },
            _ => panic!("expected interval"),
        }
    }
}
