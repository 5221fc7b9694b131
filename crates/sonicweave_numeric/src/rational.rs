//! Arbitrary-precision rational arithmetic.
//!
//! SonicWeave intervals are built on exact rationals rather than machine
//! floats so that, e.g., `81/80 * 80/81 == 1/1` holds bit-for-bit and not
//! merely "close enough". We reuse [`num_rational::BigRational`] rather than
//! hand-rolling a bignum — `Rational` below is the type every other module
//! in this crate names.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

/// An exact rational number backed by arbitrary-precision integers.
pub type Rational = num_rational::BigRational;

/// Builds a [`Rational`] from two `i64`s, reducing to lowest terms.
pub fn ratio(numer: i64, denom: i64) -> Rational {
    Rational::new(BigInt::from(numer), BigInt::from(denom))
}

/// Builds a [`Rational`] from a plain integer.
pub fn int(n: i64) -> Rational {
    Rational::from_integer(BigInt::from(n))
}

/// Raises a rational to an integer power (positive, negative, or zero).
///
/// `pow(0, 0)` follows the usual convention and yields `1`.
pub fn pow_int(base: &Rational, exponent: i64) -> Rational {
    if exponent == 0 {
        return Rational::one();
    }
    let abs_exp = exponent.unsigned_abs() as u32;
    let powered = Rational::new(
        base.numer().pow(abs_exp),
        base.denom().pow(abs_exp),
    );
    if exponent < 0 {
        powered.recip()
    } else {
        powered
    }
}

/// Greatest common divisor of two rationals, taken component-wise on
/// numerator/denominator after bringing both to a common denominator.
///
/// This is the JI-theoretic gcd used for monzo component reduction: the
/// result divides both inputs and is the largest rational with that
/// property when both inputs are integers; for fractional components we
/// fall back to the elementwise minimum, matching monzo semantics (see
/// [`crate::monzo`]).
pub fn gcd(a: &Rational, b: &Rational) -> Rational {
    if a.is_integer() && b.is_integer() {
        let g = a.numer().gcd(b.numer());
        Rational::from_integer(g)
    } else {
        a.min(b).clone()
    }
}

/// Least common multiple, dual to [`gcd`].
pub fn lcm(a: &Rational, b: &Rational) -> Rational {
    if a.is_integer() && b.is_integer() {
        let l = a.numer().lcm(b.numer());
        Rational::from_integer(l)
    } else {
        a.max(b).clone()
    }
}

/// Lossy conversion to `f64`, used once a quantity must leave exact land
/// (e.g. for `total_cents` or display).
pub fn to_f64(r: &Rational) -> f64 {
    let (n, d) = (r.numer(), r.denom());
    // BigInt -> f64 conversions are lossy by construction; this is the
    // accepted boundary between the exact and real worlds.
    ratio_to_f64(n) / ratio_to_f64(d)
}

fn ratio_to_f64(n: &BigInt) -> f64 {
    use num_traits::ToPrimitive;
    n.to_f64().unwrap_or_else(|| {
        // BigInt::to_f64 only fails for pathologically huge values; fall
        // back to a string round-trip rather than panic.
        let s = n.to_string();
        s.parse().unwrap_or(if n.is_negative() { f64::NEG_INFINITY } else { f64::INFINITY })
    })
}

/// True when `r` is exactly zero.
pub fn is_zero(r: &Rational) -> bool {
    r.is_zero()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pow_int_handles_zero_exponent() {
        assert_eq!(pow_int(&ratio(3, 2), 0), Rational::one());
    }

    #[test]
    fn pow_int_handles_negative_exponent() {
        assert_eq!(pow_int(&ratio(3, 2), -1), ratio(2, 3));
    }

    #[test]
    fn pow_int_handles_positive_exponent() {
        assert_eq!(pow_int(&ratio(3, 2), 2), ratio(9, 4));
    }

    #[test]
    fn gcd_of_integers_matches_integer_gcd() {
        assert_eq!(gcd(&int(12), &int(18)), int(6));
    }

    #[test]
    fn to_f64_round_trips_simple_fraction() {
        assert!((to_f64(&ratio(3, 2)) - 1.5).abs() < 1e-12);
    }
}
