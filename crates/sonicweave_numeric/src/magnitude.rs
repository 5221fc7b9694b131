//! `Magnitude` — the exact/real union that [`crate::monzo::TimeMonzo`] and
//! [`crate::real::TimeReal`] form together.
//!
//! Arithmetic on two exact operands stays exact; anything touching a real
//! operand (or overflowing the factoring budget) produces a real result and
//! stays real from then on (§4.1 "Promotion to TimeReal").

use crate::monzo::TimeMonzo;
use crate::primes::FactorBudget;
use crate::real::TimeReal;
use crate::rational::{self, Rational};

/// Either an exact monzo or a lossy real fallback.
#[derive(Debug, Clone, PartialEq)]
pub enum Magnitude {
    /// An exact prime-factored quantity.
    Exact(TimeMonzo),
    /// A lossy floating-point quantity.
    Real(TimeReal),
}

impl Magnitude {
    /// `self * other`, staying exact only if both operands are exact.
    pub fn mul(&self, other: &Magnitude, basis_primes: &[u64]) -> Magnitude {
        match (self, other) {
            (Magnitude::Exact(a), Magnitude::Exact(b)) => Magnitude::Exact(a.mul(b)),
            (a, b) => Magnitude::Real(a.as_real(basis_primes).mul(&b.as_real(basis_primes))),
        }
    }

    /// `self / other`, staying exact only if both operands are exact.
    pub fn div(&self, other: &Magnitude, basis_primes: &[u64]) -> Magnitude {
        match (self, other) {
            (Magnitude::Exact(a), Magnitude::Exact(b)) => Magnitude::Exact(a.div(b)),
            (a, b) => Magnitude::Real(a.as_real(basis_primes).div(&b.as_real(basis_primes))),
        }
    }

    /// `self ^ exponent`. Promotes to real when the exact path can't keep
    /// up (see [`TimeMonzo::pow`]).
    pub fn pow(&self, exponent: &Rational, basis_primes: &[u64], budget: &mut FactorBudget) -> Magnitude {
        match self {
            Magnitude::Exact(m) => match m.pow(exponent, basis_primes, budget) {
                Ok(result) => Magnitude::Exact(result),
                Err(_) => Magnitude::Real(self.as_real(basis_primes).pow(rational::to_f64(exponent))),
            },
            Magnitude::Real(r) => Magnitude::Real(r.pow(rational::to_f64(exponent))),
        }
    }

    /// Lossy conversion to [`TimeReal`]; a no-op for already-real values.
    pub fn as_real(&self, basis_primes: &[u64]) -> TimeReal {
        match self {
            Magnitude::Exact(m) => TimeReal {
                time_exponent: rational::to_f64(&m.time_exponent),
                value: m.to_f64(basis_primes),
            },
            Magnitude::Real(r) => *r,
        }
    }

    /// `1200 * log2(value)`.
    pub fn total_cents(&self, basis_primes: &[u64]) -> f64 {
        match self {
            Magnitude::Exact(m) => m.total_cents(basis_primes),
            Magnitude::Real(r) => r.total_cents(),
        }
    }

    /// Whether this magnitude is still exact (no real-valued operation has
    /// touched it).
    pub fn is_exact(&self) -> bool {
        matches!(self, Magnitude::Exact(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primes::DEFAULT_PRIMES;

    #[test]
    fn mixing_exact_and_real_promotes_to_real() {
        let mut budget = FactorBudget::new(100);
        let exact = Magnitude::Exact(TimeMonzo::from_fraction(3, 2, DEFAULT_PRIMES, &mut budget));
        let real = Magnitude::Real(TimeReal::relative(std::f64::consts::PI));
        let product = exact.mul(&real, DEFAULT_PRIMES);
        assert!(!product.is_exact());
    }

    #[test]
    fn exact_times_exact_stays_exact() {
        let mut budget = FactorBudget::new(100);
        let a = Magnitude::Exact(TimeMonzo::from_fraction(3, 2, DEFAULT_PRIMES, &mut budget));
        let b = Magnitude::Exact(TimeMonzo::from_fraction(4, 3, DEFAULT_PRIMES, &mut budget));
        assert!(a.mul(&b, DEFAULT_PRIMES).is_exact());
    }
}
