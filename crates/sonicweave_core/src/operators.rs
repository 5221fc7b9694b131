//! Operator protocol: arithmetic/comparison dispatch by `(domain, echelon)`,
//! tilde-coercion, and broadcasting over arrays and records (§4.4, §5).

use std::rc::Rc;

use sonicweave_base::{EvalError, Span};
use sonicweave_lang::{BinaryOp, Domain, Echelon, Interval, RootContext, Temperament, UnaryOp, Value};
use sonicweave_numeric::rational::{self, Rational};
use sonicweave_numeric::{Magnitude, TimeMonzo};

use crate::gas;

/// Applies a binary operator to two already-evaluated values, broadcasting
/// over arrays/records and charging one gas unit per broadcast element.
pub fn apply_binary<'a>(
    op: BinaryOp,
    left: Value<'a>,
    right: Value<'a>,
    ctx: &RootContext,
    basis_primes: &[u64],
    span: Span,
) -> Result<Value<'a>, EvalError> {
    match (&left, &right) {
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() {
                return Err(EvalError::value_error(format!(
                    "cannot broadcast arrays of different lengths ({} vs {})",
                    a.len(),
                    b.len()
                ))
                .with_span(span));
            }
            let mut out = Vec::with_capacity(a.len());
            for (x, y) in a.iter().zip(b.iter()) {
                gas::broadcast_element(ctx)?;
                out.push(apply_binary(op, x.clone(), y.clone(), ctx, basis_primes, span)?);
            }
            Ok(Value::Array(Rc::new(out)))
        }
        (Value::Array(a), _) => {
            let mut out = Vec::with_capacity(a.len());
            for x in a.iter() {
                gas::broadcast_element(ctx)?;
                out.push(apply_binary(op, x.clone(), right.clone(), ctx, basis_primes, span)?);
            }
            Ok(Value::Array(Rc::new(out)))
        }
        (_, Value::Array(b)) => {
            let mut out = Vec::with_capacity(b.len());
            for y in b.iter() {
                gas::broadcast_element(ctx)?;
                out.push(apply_binary(op, left.clone(), y.clone(), ctx, basis_primes, span)?);
            }
            Ok(Value::Array(Rc::new(out)))
        }
        (Value::Record(a), Value::Record(b)) => {
            let mut out = Vec::with_capacity(a.len());
            for (key, x) in a.iter() {
                let y = b
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| EvalError::value_error(format!("missing key '{key}' in right operand")).with_span(span))?;
                gas::broadcast_element(ctx)?;
                out.push((key.clone(), apply_binary(op, x.clone(), y, ctx, basis_primes, span)?));
            }
            Ok(Value::Record(Rc::new(out)))
        }
        _ => apply_binary_scalar(op, left, right, basis_primes, span),
    }
}

fn apply_binary_scalar<'a>(
    op: BinaryOp,
    left: Value<'a>,
    right: Value<'a>,
    basis_primes: &[u64],
    span: Span,
) -> Result<Value<'a>, EvalError> {
    use BinaryOp::*;
    match op {
        And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
        VectorAnd => Ok(Value::Bool(left.is_truthy() & right.is_truthy())),
        VectorOr => Ok(Value::Bool(left.is_truthy() | right.is_truthy())),
        Coalesce => Ok(if matches!(left, Value::Niente) { right } else { left }),
        Eq | Ne | Lt | Le | Gt | Ge => compare(op, &left, &right, basis_primes, span),
        _ => {
            let (l, r) = (as_interval(&left, span)?, as_interval(&right, span)?);
            let result = interval_binary(op, l, r, basis_primes, span)?;
            Ok(Value::Interval(Rc::new(result)))
        }
    }
}

fn as_interval<'a, 'b>(value: &'b Value<'a>, span: Span) -> Result<&'b Interval<'a>, EvalError> {
    match value {
        Value::Interval(iv) => Ok(iv),
        other => Err(EvalError::type_error(format!(
            "expected an interval, found {}",
            other.type_name()
        ))
        .with_span(span)),
    }
}

fn compare<'a>(op: BinaryOp, left: &Value<'a>, right: &Value<'a>, basis_primes: &[u64], span: Span) -> Result<Value<'a>, EvalError> {
    use BinaryOp::*;
    if let (Value::Interval(a), Value::Interval(b)) = (left, right) {
        let ca = a.magnitude.total_cents(basis_primes);
        let cb = b.magnitude.total_cents(basis_primes);
        let result = match op {
            Eq => (ca - cb).abs() < 1e-9,
            Ne => (ca - cb).abs() >= 1e-9,
            Lt => ca < cb,
            Le => ca <= cb,
            Gt => ca > cb,
            Ge => ca >= cb,
            _ => unreachable!(),
        };
        return Ok(Value::Bool(result));
    }
    if let (Value::String(a), Value::String(b)) = (left, right) {
        let result = match op {
            Eq => a == b,
            Ne => a != b,
            Lt => a < b,
            Le => a <= b,
            Gt => a > b,
            Ge => a >= b,
            _ => unreachable!(),
        };
        return Ok(Value::Bool(result));
    }
    match op {
        Eq => Ok(Value::Bool(values_equal(left, right))),
        Ne => Ok(Value::Bool(!values_equal(left, right))),
        _ => Err(EvalError::type_error(format!(
            "cannot order {} and {}",
            left.type_name(),
            right.type_name()
        ))
        .with_span(span)),
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Color(a), Value::Color(b)) => a == b,
        (Value::Niente, Value::Niente) => true,
        _ => false,
    }
}

/// Echelon combination table for the additive-class operators `+`/`*`
/// (and their tilde variants): two pitches never combine this way, a
/// pitch and an interval always produce a pitch.
fn combine_echelon(left: Echelon, right: Echelon, span: Span) -> Result<Echelon, EvalError> {
    use Echelon::*;
    match (left, right) {
        (Relative, Relative) => Ok(Relative),
        (Absolute, Relative) | (Relative, Absolute) => Ok(Absolute),
        (Absolute, Absolute) => {
            Err(EvalError::echelon_error("cannot combine two absolute pitches with this operator").with_span(span))
        }
    }
}

/// Echelon table for the difference-class operators `-`/`/`: the
/// difference of two pitches is an interval.
fn difference_echelon(left: Echelon, right: Echelon, span: Span) -> Result<Echelon, EvalError> {
    use Echelon::*;
    match (left, right) {
        (Relative, Relative) => Ok(Relative),
        (Absolute, Relative) => Ok(Absolute),
        (Absolute, Absolute) => Ok(Relative),
        (Relative, Absolute) => {
            Err(EvalError::echelon_error("cannot subtract an absolute pitch from a relative interval").with_span(span))
        }
    }
}

fn require_relative(echelon: Echelon, span: Span) -> Result<(), EvalError> {
    if echelon != Echelon::Relative {
        return Err(EvalError::echelon_error("exponentiation requires a relative interval").with_span(span));
    }
    Ok(())
}

fn interval_binary<'a>(op: BinaryOp, left: &Interval<'a>, right: &Interval<'a>, basis_primes: &[u64], span: Span) -> Result<Interval<'a>, EvalError> {
    use BinaryOp::*;
    let (left, right, domain) = match op {
        TildeAdd | TildeSub | TildeMul | TildeDiv => {
            (left, right, right.domain)
        }
        _ => {
            if left.domain != right.domain {
                return Err(EvalError::domain_error(
                    "mismatched linear/logarithmic domains; use a tilde operator to coerce",
                )
                .with_span(span));
            }
            (left, right, left.domain)
        }
    };

    let additive = matches!(op, Add | TildeAdd | Mul | TildeMul | Tensor | TensorBroadcast);
    let difference = matches!(op, Sub | TildeSub | Div | TildeDiv);

    let echelon = if additive {
        combine_echelon(left.echelon, right.echelon, span)?
    } else if difference {
        difference_echelon(left.echelon, right.echelon, span)?
    } else {
        require_relative(left.echelon, span)?;
        require_relative(right.echelon, span)?;
        Echelon::Relative
    };

    let magnitude = match (op, domain) {
        (Add | TildeAdd, Domain::Logarithmic) => left.magnitude.mul(&right.magnitude, basis_primes),
        (Sub | TildeSub, Domain::Logarithmic) => left.magnitude.div(&right.magnitude, basis_primes),
        (Add | TildeAdd, Domain::Linear) => linear_add(&left.magnitude, &right.magnitude, basis_primes),
        (Sub | TildeSub, Domain::Linear) => linear_add(&left.magnitude, &negate(&right.magnitude, basis_primes), basis_primes),
        (Mul | TildeMul, _) => left.magnitude.mul(&right.magnitude, basis_primes),
        (Div | TildeDiv, _) => left.magnitude.div(&right.magnitude, basis_primes),
        (Mod, _) => modulo(&left.magnitude, &right.magnitude, basis_primes),
        (Pow, _) => {
            let exponent = magnitude_as_rational(&right.magnitude, span)?;
            let mut budget = sonicweave_numeric::FactorBudget::new(256);
            left.magnitude.pow(&exponent, basis_primes, &mut budget)
        }
        (Root, _) => {
            let exponent = magnitude_as_rational(&right.magnitude, span)?;
            let reciprocal = rational::int(1) / exponent;
            let mut budget = sonicweave_numeric::FactorBudget::new(256);
            left.magnitude.pow(&reciprocal, basis_primes, &mut budget)
        }
        (Tensor | TensorBroadcast, _) => left.magnitude.mul(&right.magnitude, basis_primes),
        _ => {
            return Err(EvalError::type_error(format!("operator not defined for intervals: {op:?}")).with_span(span));
        }
    };

    Ok(Interval {
        magnitude,
        domain,
        echelon,
        node: sonicweave_lang::FormattingNode::None,
        color: left.color.clone().or_else(|| right.color.clone()),
        label: None,
        tracking_ids: merge_tracking(left, right),
    })
}

fn merge_tracking<'a>(left: &Interval<'a>, right: &Interval<'a>) -> Rc<[u64]> {
    if left.tracking_ids.is_empty() {
        right.tracking_ids.clone()
    } else if right.tracking_ids.is_empty() {
        left.tracking_ids.clone()
    } else {
        let mut ids: Vec<u64> = left.tracking_ids.iter().copied().collect();
        ids.extend(right.tracking_ids.iter().copied());
        Rc::from(ids)
    }
}

fn linear_add(a: &Magnitude, b: &Magnitude, basis_primes: &[u64]) -> Magnitude {
    match (a, b) {
        (Magnitude::Exact(ma), Magnitude::Exact(mb)) => {
            if let (Some(ra), Some(rb)) = (ma.as_fraction(basis_primes), mb.as_fraction(basis_primes)) {
                let sum = ra + rb;
                return Magnitude::Exact(TimeMonzo {
                    time_exponent: ma.time_exponent.clone(),
                    prime_exponents: vec![rational::int(0); ma.num_components()],
                    residual: sum,
                });
            }
            let ra = a.as_real(basis_primes);
            let rb = b.as_real(basis_primes);
            Magnitude::Real(sonicweave_numeric::TimeReal { time_exponent: ra.time_exponent, value: ra.value + rb.value })
        }
        _ => {
            let ra = a.as_real(basis_primes);
            let rb = b.as_real(basis_primes);
            Magnitude::Real(sonicweave_numeric::TimeReal { time_exponent: ra.time_exponent, value: ra.value + rb.value })
        }
    }
}

fn negate(m: &Magnitude, basis_primes: &[u64]) -> Magnitude {
    match m {
        Magnitude::Exact(monzo) => {
            if let Some(r) = monzo.as_fraction(basis_primes) {
                Magnitude::Exact(TimeMonzo {
                    time_exponent: monzo.time_exponent.clone(),
                    prime_exponents: vec![rational::int(0); monzo.num_components()],
                    residual: -r,
                })
            } else {
                let real = m.as_real(basis_primes);
                Magnitude::Real(sonicweave_numeric::TimeReal { time_exponent: real.time_exponent, value: -real.value })
            }
        }
        Magnitude::Real(r) => Magnitude::Real(sonicweave_numeric::TimeReal { time_exponent: r.time_exponent, value: -r.value }),
    }
}

fn modulo(a: &Magnitude, b: &Magnitude, basis_primes: &[u64]) -> Magnitude {
    let ra = a.as_real(basis_primes);
    let rb = b.as_real(basis_primes);
    Magnitude::Real(sonicweave_numeric::TimeReal { time_exponent: ra.time_exponent, value: ra.value.rem_euclid(rb.value) })
}

fn magnitude_as_rational(m: &Magnitude, span: Span) -> Result<Rational, EvalError> {
    match m {
        Magnitude::Exact(monzo) if monzo.prime_exponents.iter().all(rational::is_zero) => Ok(monzo.residual.clone()),
        _ => Err(EvalError::type_error("exponent must be an exact rational number").with_span(span)),
    }
}

/// Applies a unary operator (`-`, `%`, `not`, step-label `\`).
pub fn apply_unary<'a>(op: UnaryOp, value: Value<'a>, basis_primes: &[u64], span: Span) -> Result<Value<'a>, EvalError> {
    match (op, value) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Interval(iv)) => Ok(Value::Interval(Rc::new(Interval {
            magnitude: negate(&iv.magnitude, basis_primes),
            domain: iv.domain,
            echelon: iv.echelon,
            node: sonicweave_lang::FormattingNode::None,
            color: iv.color.clone(),
            label: None,
            tracking_ids: iv.tracking_ids.clone(),
        }))),
        (UnaryOp::Reciprocal, Value::Interval(iv)) => {
            require_relative(iv.echelon, span)?;
            let mut budget = sonicweave_numeric::FactorBudget::new(256);
            let magnitude = iv.magnitude.pow(&rational::int(-1), basis_primes, &mut budget);
            Ok(Value::Interval(Rc::new(Interval {
                magnitude,
                domain: iv.domain,
                echelon: iv.echelon,
                node: sonicweave_lang::FormattingNode::None,
                color: iv.color.clone(),
                label: None,
                tracking_ids: iv.tracking_ids.clone(),
            })))
        }
        (UnaryOp::Label, v) => Ok(v),
        (op, v) => Err(EvalError::type_error(format!("operator {op:?} not defined for {}", v.type_name())).with_span(span)),
    }
}

/// Tempers `interval` through `val`, producing a logarithmic-domain
/// interval whose magnitude is the tempered cents value (§4.3).
pub fn temper<'a>(interval: &Interval<'a>, val: &sonicweave_numeric::Val, basis_primes: &[u64]) -> Result<Interval<'a>, EvalError> {
    let monzo = match &interval.magnitude {
        Magnitude::Exact(m) => m,
        Magnitude::Real(_) => return Err(EvalError::domain_error("cannot temper a non-exact interval")),
    };
    let (tempered_cents, untempered_cents) = val.temper(monzo, basis_primes);
    let total_cents = tempered_cents + untempered_cents;
    Ok(Interval {
        magnitude: Magnitude::Real(sonicweave_numeric::TimeReal {
            time_exponent: 0.0,
            value: 2f64.powf(total_cents / 1200.0),
        }),
        domain: Domain::Logarithmic,
        echelon: interval.echelon,
        node: sonicweave_lang::FormattingNode::None,
        color: interval.color.clone(),
        label: None,
        tracking_ids: interval.tracking_ids.clone(),
    })
}

/// Builds a [`Temperament`] value from a basis and a list of vals sharing it.
pub fn make_temperament(basis: sonicweave_numeric::ValBasis, vals: Vec<sonicweave_numeric::Val>) -> Temperament {
    Temperament { basis, vals }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonicweave_lang::RootContext;
    use sonicweave_numeric::{FactorBudget, DEFAULT_PRIMES};

    fn interval(numer: i64, denom: i64) -> Value<'static> {
        let mut budget = FactorBudget::new(64);
        let m = TimeMonzo::from_fraction(numer, denom, DEFAULT_PRIMES, &mut budget);
        Value::Interval(Rc::new(Interval::bare(Magnitude::Exact(m), Domain::Linear, Echelon::Relative)))
    }

    #[test]
    fn multiplying_two_ratios_is_exact() {
        let ctx = RootContext::unbounded();
        let result = apply_binary(BinaryOp::Mul, interval(3, 2), interval(4, 3), &ctx, DEFAULT_PRIMES, Span::default()).unwrap();
        if let Value::Interval(iv) = result {
            if let Magnitude::Exact(m) = &iv.magnitude {
                assert_eq!(m.as_fraction(DEFAULT_PRIMES), Some(rational::ratio(2, 1)));
                return;
            }
        }
        panic!("expected exact interval");
    }

    #[test]
    fn broadcasting_over_array_charges_gas_per_element() {
        let ctx = RootContext::new(Default::default(), sonicweave_lang::Gas::bounded(2));
        let arr = Value::Array(Rc::new(vec![interval(3, 2), interval(4, 3)]));
        let result = apply_binary(BinaryOp::Mul, arr, interval(2, 1), &ctx, DEFAULT_PRIMES, Span::default());
        assert!(result.is_ok());
        assert_eq!(ctx.gas.remaining(), Some(0));
    }

    #[test]
    fn comparing_two_absolute_pitches_with_plus_is_an_echelon_error() {
        let pitch = |hz: f64| Value::Interval(Rc::new(Interval::bare(
            Magnitude::Real(sonicweave_numeric::TimeReal { time_exponent: -1.0, value: hz }),
            Domain::Linear,
            Echelon::Absolute,
        )));
        let ctx = RootContext::unbounded();
        let result = apply_binary(BinaryOp::Add, pitch(440.0), pitch(880.0), &ctx, DEFAULT_PRIMES, Span::default());
        assert!(result.is_err());
    }
}
