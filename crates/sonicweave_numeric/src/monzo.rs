//! `TimeMonzo` — the exact representation at the heart of the numeric tower.
//!
//! A `TimeMonzo` is `residual * product(prime[i] ^ prime_exponents[i])`,
//! dimensioned by `time_exponent` (powers of seconds: `0` relative, `-1`
//! frequency, `+1` duration). Keeping an unfactored `residual` alongside the
//! prime-exponent vector lets a `TimeMonzo` represent *any* rational exactly
//! — including ones with huge or unknown prime factors — while still
//! supporting fast elementwise arithmetic on the factored part.

use std::fmt;

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

use crate::primes::{factor_signed_within_budget, nth_prime, FactorBudget};
use crate::rational::{self, Rational};

/// Thrown by [`TimeMonzo::pow`] when an exact result would require
/// factoring a residual too large for the supplied budget. Callers should
/// fall back to [`crate::real::TimeReal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiresPromotion;

/// An exact just-intonation quantity: a prime-exponent vector plus a
/// residual and a time dimension.
///
/// # Invariants
///
/// `value = residual * Π prime[i]^prime_exponents[i]` (in the linear
/// interpretation). The value is rational exactly when every
/// `prime_exponents[i]` is an integer; fractional components describe
/// "NEDJI-space" quantities such as `n\d` steps of an equal division.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeMonzo {
    /// Dimensional exponent of seconds: `0` relative, `-1` frequency, `+1` duration.
    pub time_exponent: Rational,
    /// Exponents of the primes `2, 3, 5, …` up to the configured basis length.
    pub prime_exponents: Vec<Rational>,
    /// Unfactored remainder, carrying arbitrarily large integers without
    /// prime-factoring them.
    pub residual: Rational,
}

impl TimeMonzo {
    /// The relative unison `1/1`.
    pub fn unison(num_components: usize) -> Self {
        Self {
            time_exponent: Rational::zero(),
            prime_exponents: vec![Rational::zero(); num_components],
            residual: Rational::one(),
        }
    }

    /// Builds an exact monzo for `numer/denom`, factoring as much as the
    /// supplied primes/budget allow and folding whatever's left into
    /// `residual`. Never fails — an under-factored residual is a valid
    /// `TimeMonzo`, just a less convenient one to inspect.
    pub fn from_fraction(
        numer: i64,
        denom: i64,
        basis_primes: &[u64],
        budget: &mut FactorBudget,
    ) -> Self {
        assert!(denom != 0, "denominator must be nonzero");
        let (numer_exps, numer_residual) =
            factor_signed_within_budget(&BigInt::from(numer), basis_primes, budget);
        let (denom_exps, denom_residual) =
            factor_signed_within_budget(&BigInt::from(denom), basis_primes, budget);
        let prime_exponents = numer_exps
            .iter()
            .zip(denom_exps.iter())
            .map(|(&n, &d)| Rational::from_integer(BigInt::from(n) - BigInt::from(d)))
            .collect();
        let residual = Rational::new(numer_residual, denom_residual);
        Self {
            time_exponent: Rational::zero(),
            prime_exponents,
            residual,
        }
    }

    /// Length of the prime-exponent vector (the process-wide `numComponents`).
    pub fn num_components(&self) -> usize {
        self.prime_exponents.len()
    }

    /// Resizes the prime-exponent vector to `new_len`.
    ///
    /// Shorter vectors are left-padded with zero (no information lost).
    /// Longer-to-shorter truncation folds the truncated tail back into
    /// `residual` as `Π prime[i]^exponent[i]` for the dropped components,
    /// per §4.1: reading/writing `numComponents` must not invalidate
    /// existing monzos.
    pub fn resized(&self, new_len: usize, basis_primes: &[u64]) -> Self {
        if new_len >= self.prime_exponents.len() {
            let mut prime_exponents = self.prime_exponents.clone();
            prime_exponents.resize(new_len, Rational::zero());
            return Self {
                time_exponent: self.time_exponent.clone(),
                prime_exponents,
                residual: self.residual.clone(),
            };
        }
        let mut residual = self.residual.clone();
        for i in new_len..self.prime_exponents.len() {
            let prime = Rational::from_integer(BigInt::from(basis_primes_or_extend(basis_primes, i)));
            residual *= rational::pow_int(&prime, exponent_to_i64(&self.prime_exponents[i]));
        }
        Self {
            time_exponent: self.time_exponent.clone(),
            prime_exponents: self.prime_exponents[..new_len].to_vec(),
            residual,
        }
    }

    /// `self * other`: prime exponents add elementwise, residuals multiply,
    /// time exponents add.
    pub fn mul(&self, other: &TimeMonzo) -> TimeMonzo {
        TimeMonzo {
            time_exponent: &self.time_exponent + &other.time_exponent,
            prime_exponents: elementwise(&self.prime_exponents, &other.prime_exponents, |a, b| a + b),
            residual: &self.residual * &other.residual,
        }
    }

    /// `self / other`: prime exponents subtract elementwise, residuals divide.
    pub fn div(&self, other: &TimeMonzo) -> TimeMonzo {
        TimeMonzo {
            time_exponent: &self.time_exponent - &other.time_exponent,
            prime_exponents: elementwise(&self.prime_exponents, &other.prime_exponents, |a, b| a - b),
            residual: &self.residual / &other.residual,
        }
    }

    /// `self ^ exponent`. Exact whenever `exponent` is an integer, or the
    /// residual is a unit, or the residual can be factored within `budget`;
    /// otherwise returns [`RequiresPromotion`] so the caller falls back to
    /// [`crate::real::TimeReal`].
    pub fn pow(
        &self,
        exponent: &Rational,
        basis_primes: &[u64],
        budget: &mut FactorBudget,
    ) -> Result<TimeMonzo, RequiresPromotion> {
        if exponent.is_integer() {
            let e = exponent.to_integer();
            let e_i64: i64 = e.try_into().map_err(|_| RequiresPromotion)?;
            return Ok(TimeMonzo {
                time_exponent: &self.time_exponent * exponent,
                prime_exponents: self
                    .prime_exponents
                    .iter()
                    .map(|p| p * exponent)
                    .collect(),
                residual: rational::pow_int(&self.residual, e_i64),
            });
        }
        if self.residual.is_one() {
            return Ok(TimeMonzo {
                time_exponent: &self.time_exponent * exponent,
                prime_exponents: self
                    .prime_exponents
                    .iter()
                    .map(|p| p * exponent)
                    .collect(),
                residual: Rational::one(),
            });
        }
        // Non-integer power of a non-unit residual: fold the residual's own
        // prime factorization into the exponent vector, extending the basis
        // as needed, then scale everything by `exponent`.
        let extended_len = self.prime_exponents.len() + 8;
        let extended_primes: Vec<u64> = (0..extended_len).map(nth_prime).collect();
        let residual_int = residual_as_integer_ratio(&self.residual).ok_or(RequiresPromotion)?;
        let (numer_exps, numer_residual) =
            factor_signed_within_budget(&residual_int.0, &extended_primes, budget);
        let (denom_exps, denom_residual) =
            factor_signed_within_budget(&residual_int.1, &extended_primes, budget);
        if !numer_residual.is_one() || denom_residual.abs() != BigInt::one() {
            return Err(RequiresPromotion);
        }
        let mut combined = self.prime_exponents.clone();
        combined.resize(extended_len, Rational::zero());
        for i in 0..extended_len {
            combined[i] += Rational::from_integer(BigInt::from(numer_exps[i]) - BigInt::from(denom_exps[i]));
        }
        Ok(TimeMonzo {
            time_exponent: &self.time_exponent * exponent,
            prime_exponents: combined.iter().map(|p| p * exponent).collect(),
            residual: Rational::one(),
        })
    }

    /// Elementwise minimum of prime exponents (fractional components
    /// allowed), gcd of the residuals.
    pub fn gcd(&self, other: &TimeMonzo) -> TimeMonzo {
        TimeMonzo {
            time_exponent: self.time_exponent.min(&other.time_exponent).clone(),
            prime_exponents: elementwise(&self.prime_exponents, &other.prime_exponents, |a, b| {
                a.min(&b).clone()
            }),
            residual: rational::gcd(&self.residual, &other.residual),
        }
    }

    /// Elementwise maximum of prime exponents, lcm of the residuals.
    pub fn lcm(&self, other: &TimeMonzo) -> TimeMonzo {
        TimeMonzo {
            time_exponent: self.time_exponent.max(&other.time_exponent).clone(),
            prime_exponents: elementwise(&self.prime_exponents, &other.prime_exponents, |a, b| {
                a.max(&b).clone()
            }),
            residual: rational::lcm(&self.residual, &other.residual),
        }
    }

    /// `log(numerator * denominator)` of the reduced rational value — a
    /// complexity measure (Tenney height). Requires the value to be
    /// rational (fails, in the sense of returning `None`, when not).
    pub fn tenney_height(&self, basis_primes: &[u64]) -> Option<f64> {
        let (n, d) = self.as_fraction_parts(basis_primes)?;
        let reduced = Rational::new(n, d);
        let num = rational::to_f64(&Rational::from_integer(reduced.numer().clone()));
        let den = rational::to_f64(&Rational::from_integer(reduced.denom().clone()));
        Some((num.abs() * den.abs()).ln())
    }

    /// `1200 * log2(value)`, the size of the interval in cents.
    pub fn total_cents(&self, basis_primes: &[u64]) -> f64 {
        let value = self.to_f64(basis_primes);
        1200.0 * value.ln() / std::f64::consts::LN_2
    }

    /// Lossy conversion to a floating-point ratio, ignoring `time_exponent`.
    pub fn to_f64(&self, basis_primes: &[u64]) -> f64 {
        let mut value = rational::to_f64(&self.residual);
        for (i, exp) in self.prime_exponents.iter().enumerate() {
            let prime = basis_primes_or_extend(basis_primes, i) as f64;
            value *= prime.powf(rational::to_f64(exp));
        }
        value
    }

    /// Dot product against a val's per-prime step mapping (§4.1, §4.3):
    /// `Σ prime_exponent[i] * val[i]`.
    pub fn dot(&self, val_steps: &[Rational]) -> Rational {
        self.prime_exponents
            .iter()
            .zip(val_steps.iter())
            .fold(Rational::zero(), |acc, (p, v)| acc + p * v)
    }

    /// The exact rational value as `(numerator, denominator)`, or `None`
    /// when any prime exponent is non-integer (the value isn't rational).
    pub fn as_fraction_parts(&self, basis_primes: &[u64]) -> Option<(BigInt, BigInt)> {
        if !self.prime_exponents.iter().all(|e| e.is_integer()) {
            return None;
        }
        let mut numer = self.residual.numer().clone();
        let mut denom = self.residual.denom().clone();
        for (i, exp) in self.prime_exponents.iter().enumerate() {
            let e: i64 = exp.to_integer().try_into().ok()?;
            let prime = BigInt::from(basis_primes_or_extend(basis_primes, i));
            if e >= 0 {
                numer *= prime.pow(e as u32);
            } else {
                denom *= prime.pow((-e) as u32);
            }
        }
        let g = numer.gcd(&denom);
        if !g.is_zero() && g != BigInt::one() {
            numer /= &g;
            denom /= &g;
        }
        Some((numer, denom))
    }

    /// Convenience: `as_fraction_parts` as a [`Rational`], failing the same way.
    pub fn as_fraction(&self, basis_primes: &[u64]) -> Option<Rational> {
        let (n, d) = self.as_fraction_parts(basis_primes)?;
        Some(Rational::new(n, d))
    }

    /// Expresses the monzo as `(equave, fraction_of_equave)` when it is an
    /// exact rational power of a single prime or simple equave — i.e. when
    /// exactly one prime exponent is nonzero and the residual is a unit.
    /// Returns `None` when the monzo isn't expressible as a single
    /// equal-division step.
    pub fn as_equal_temperament(&self, basis_primes: &[u64]) -> Option<(Rational, Rational)> {
        if !self.residual.is_one() {
            return None;
        }
        let mut nonzero: Option<(usize, &Rational)> = None;
        for (i, e) in self.prime_exponents.iter().enumerate() {
            if !e.is_zero() {
                if nonzero.is_some() {
                    return None;
                }
                nonzero = Some((i, e));
            }
        }
        let (i, fraction) = nonzero?;
        let equave = Rational::from_integer(BigInt::from(basis_primes_or_extend(basis_primes, i)));
        Some((equave, fraction.clone()))
    }
}

fn elementwise(
    a: &[Rational],
    b: &[Rational],
    f: impl Fn(Rational, Rational) -> Rational,
) -> Vec<Rational> {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let x = a.get(i).cloned().unwrap_or_else(Rational::zero);
            let y = b.get(i).cloned().unwrap_or_else(Rational::zero);
            f(x, y)
        })
        .collect()
}

fn basis_primes_or_extend(basis_primes: &[u64], index: usize) -> u64 {
    basis_primes.get(index).copied().unwrap_or_else(|| nth_prime(index))
}

fn exponent_to_i64(r: &Rational) -> i64 {
    if r.is_integer() {
        r.to_integer().try_into().unwrap_or(0)
    } else {
        0
    }
}

fn residual_as_integer_ratio(residual: &Rational) -> Option<(BigInt, BigInt)> {
    Some((residual.numer().clone(), residual.denom().clone()))
}

impl fmt::Display for TimeMonzo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeMonzo(residual={}, primes={:?})", self.residual, self.prime_exponents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primes::DEFAULT_PRIMES;

    fn budget() -> FactorBudget {
        FactorBudget::new(1000)
    }

    #[test]
    fn unison_round_trips_to_fraction() {
        let u = TimeMonzo::unison(DEFAULT_PRIMES.len());
        assert_eq!(u.as_fraction(DEFAULT_PRIMES), Some(rational::ratio(1, 1)));
    }

    #[test]
    fn from_fraction_then_as_fraction_is_identity() {
        let mut b = budget();
        let m = TimeMonzo::from_fraction(3, 2, DEFAULT_PRIMES, &mut b);
        assert_eq!(m.as_fraction(DEFAULT_PRIMES), Some(rational::ratio(3, 2)));
    }

    #[test]
    fn mul_then_div_by_itself_is_unison() {
        let mut b = budget();
        let m = TimeMonzo::from_fraction(5, 4, DEFAULT_PRIMES, &mut b);
        let inv = TimeMonzo::from_fraction(4, 5, DEFAULT_PRIMES, &mut b);
        let product = m.mul(&inv);
        assert_eq!(product.as_fraction(DEFAULT_PRIMES), Some(rational::ratio(1, 1)));
    }

    #[test]
    fn div_matches_fraction_division() {
        let mut b = budget();
        let a = TimeMonzo::from_fraction(3, 2, DEFAULT_PRIMES, &mut b);
        let c = TimeMonzo::from_fraction(4, 3, DEFAULT_PRIMES, &mut b);
        let q = a.div(&c);
        assert_eq!(q.as_fraction(DEFAULT_PRIMES), Some(rational::ratio(9, 8)));
    }

    #[test]
    fn integer_pow_is_exact() {
        let mut b = budget();
        let m = TimeMonzo::from_fraction(3, 2, DEFAULT_PRIMES, &mut b);
        let squared = m.pow(&rational::int(2), DEFAULT_PRIMES, &mut b).unwrap();
        assert_eq!(squared.as_fraction(DEFAULT_PRIMES), Some(rational::ratio(9, 4)));
    }

    #[test]
    fn as_equal_temperament_recognizes_single_prime_power() {
        let mut b = budget();
        let octave = TimeMonzo::from_fraction(2, 1, DEFAULT_PRIMES, &mut b);
        let half_octave = octave.pow(&rational::ratio(1, 2), DEFAULT_PRIMES, &mut b).unwrap();
        let (equave, fraction) = half_octave.as_equal_temperament(DEFAULT_PRIMES).unwrap();
        assert_eq!(equave, rational::int(2));
        assert_eq!(fraction, rational::ratio(1, 2));
    }

    #[test]
    fn total_cents_of_octave_is_1200() {
        let mut b = budget();
        let octave = TimeMonzo::from_fraction(2, 1, DEFAULT_PRIMES, &mut b);
        assert!((octave.total_cents(DEFAULT_PRIMES) - 1200.0).abs() < 1e-9);
    }

    #[test]
    fn resize_shrink_then_grow_preserves_value() {
        let mut b = budget();
        let m = TimeMonzo::from_fraction(15, 8, DEFAULT_PRIMES, &mut b); // 3*5 / 2^3
        let shrunk = m.resized(1, DEFAULT_PRIMES);
        let grown = shrunk.resized(DEFAULT_PRIMES.len(), DEFAULT_PRIMES);
        assert_eq!(grown.as_fraction(DEFAULT_PRIMES), m.as_fraction(DEFAULT_PRIMES));
    }
}
