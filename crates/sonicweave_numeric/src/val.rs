//! `Val` and `ValBasis` — the covector side of tempering.
//!
//! A [`Val`] maps a [`TimeMonzo`] to an integer count of equal-temperament
//! steps by dotting the monzo's prime-exponent vector against the val's
//! per-prime step mapping. Tempering an interval through a val (§4.3)
//! produces a logarithmic-domain result: `(v·i) * (equave_cents / divisions)`,
//! with anything outside the val's [`ValBasis`] surviving untempered.

use num_traits::Zero;

use crate::monzo::TimeMonzo;
use crate::rational::{self, Rational};

/// An ordered, independent set of [`TimeMonzo`]s describing a subgroup of
/// just intonation (e.g. the 2.3.5 subgroup, or the no-twos 3.5.7 subgroup).
#[derive(Debug, Clone, PartialEq)]
pub struct ValBasis {
    /// The generators of the subgroup, in the order the val's steps line up with.
    pub generators: Vec<TimeMonzo>,
}

impl ValBasis {
    /// The standard prime-power basis: generator `i` is the `i`th prime.
    pub fn prime_power(_basis_primes: &[u64], num_components: usize) -> Self {
        Self {
            generators: (0..num_components).map(Self::prime_generator).collect(),
        }
    }

    fn prime_generator(i: usize) -> TimeMonzo {
        let mut exps = vec![Rational::zero(); i + 1];
        exps[i] = rational::int(1);
        TimeMonzo {
            time_exponent: rational::int(0),
            prime_exponents: exps,
            residual: rational::int(1),
        }
    }

    /// Whether `monzo`'s prime support is contained in this basis (§3.2:
    /// a val and an interval are compatible iff the interval's prime basis
    /// is contained in the val's basis).
    pub fn contains(&self, monzo: &TimeMonzo) -> bool {
        monzo.num_components() <= self.generators.len()
    }
}

/// A covector mapping monzos to integer step counts, plus the equave it
/// divides and the basis it applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct Val {
    /// Steps contributed by each prime in [`ValBasis`] order (usually integers).
    pub steps: Vec<Rational>,
    /// The interval being equally divided (often `2/1`).
    pub equave: TimeMonzo,
    /// Number of equal divisions of the equave.
    pub divisions: i64,
    /// The subgroup this val was built to temper.
    pub basis: ValBasis,
}

impl Val {
    /// Builds the patent val of `divisions`-EDO restricted to `basis`: each
    /// generator's step count is `round(divisions * log2(generator) / log2(equave))`.
    pub fn patent(divisions: i64, equave: &TimeMonzo, basis: ValBasis, basis_primes: &[u64]) -> Self {
        let equave_cents = equave.total_cents(basis_primes);
        let steps = basis
            .generators
            .iter()
            .map(|g| {
                let cents = g.total_cents(basis_primes);
                let step = (divisions as f64 * cents / equave_cents).round();
                rational::int(step as i64)
            })
            .collect();
        Self {
            steps,
            equave: equave.clone(),
            divisions,
            basis,
        }
    }

    /// `v · i`: dot product of this val's steps against `monzo`'s prime
    /// exponents (§4.1). Only defined when `monzo`'s prime basis is
    /// contained in `self.basis` (§3.2); the caller is expected to have
    /// checked [`ValBasis::contains`] first.
    pub fn dot(&self, monzo: &TimeMonzo) -> Rational {
        monzo.dot(&self.steps)
    }

    /// Tempers `monzo` through this val, returning a logarithmic-domain
    /// cents value: `(v·i) * (equave_cents / divisions)`.
    ///
    /// Any part of `monzo`'s prime support outside `self.basis` is not
    /// representable by this val and is returned separately as untempered
    /// cents, to be added back as residual "inharmonic" detuning (§4.3).
    pub fn temper(&self, monzo: &TimeMonzo, basis_primes: &[u64]) -> (f64, f64) {
        let in_basis_len = self.basis.generators.len().min(monzo.num_components());
        let truncated = TimeMonzo {
            time_exponent: monzo.time_exponent.clone(),
            prime_exponents: monzo.prime_exponents[..in_basis_len].to_vec(),
            residual: rational::int(1),
        };
        let steps = self.dot(&truncated);
        let equave_cents = self.equave.total_cents(basis_primes);
        let tempered_cents = rational::to_f64(&steps) * equave_cents / self.divisions as f64;

        let tail = TimeMonzo {
            time_exponent: rational::int(0),
            prime_exponents: monzo.prime_exponents[in_basis_len..].to_vec(),
            residual: monzo.residual.clone(),
        };
        let untempered_cents = tail.total_cents(basis_primes);
        (tempered_cents, untempered_cents)
    }
}

/// A prefix remapping of prime cent-values, used to build higher-order
/// temperaments: given replacement cents for the first `k` primes, produces
/// a function re-mapping any interval's prime factorization through those
/// replacements (§4.3).
#[derive(Debug, Clone, PartialEq)]
pub struct PrimeMapping {
    /// Replacement cent value for each of the first `replacements.len()` primes.
    pub replacements: Vec<f64>,
}

impl PrimeMapping {
    /// Builds a mapping from explicit per-prime replacement cents.
    pub fn new(replacements: Vec<f64>) -> Self {
        Self { replacements }
    }

    /// Applies the mapping to `monzo`, replacing the contribution of every
    /// prime with a configured replacement by `exponent * replacement_cents`,
    /// and leaving primes beyond the mapping's prefix at their just value.
    pub fn apply(&self, monzo: &TimeMonzo, basis_primes: &[u64]) -> f64 {
        let mut cents = 0.0;
        for (i, exp) in monzo.prime_exponents.iter().enumerate() {
            let exp_f64 = rational::to_f64(exp);
            if let Some(&replacement) = self.replacements.get(i) {
                cents += exp_f64 * replacement;
            } else {
                let prime = basis_primes.get(i).copied().unwrap_or_else(|| crate::primes::nth_prime(i)) as f64;
                cents += exp_f64 * 1200.0 * prime.ln() / std::f64::consts::LN_2;
            }
        }
        let residual = rational::to_f64(&monzo.residual).abs();
        cents + 1200.0 * residual.ln() / std::f64::consts::LN_2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monzo::TimeMonzo;
    use crate::primes::{FactorBudget, DEFAULT_PRIMES};

    #[test]
    fn twelve_edo_patent_val_maps_fifth_to_seven_steps() {
        let mut budget = FactorBudget::new(100);
        let octave = TimeMonzo::from_fraction(2, 1, DEFAULT_PRIMES, &mut budget);
        let fifth = TimeMonzo::from_fraction(3, 2, DEFAULT_PRIMES, &mut budget);
        let basis = ValBasis::prime_power(DEFAULT_PRIMES, 2);
        let val = Val::patent(12, &octave, basis, DEFAULT_PRIMES);
        let (tempered, untempered) = val.temper(&fifth, DEFAULT_PRIMES);
        assert!((tempered - 700.0).abs() < 1e-9);
        assert_eq!(untempered, 0.0);
    }

    #[test]
    fn twelve_edo_patent_val_maps_major_third_to_four_steps() {
        let mut budget = FactorBudget::new(100);
        let octave = TimeMonzo::from_fraction(2, 1, DEFAULT_PRIMES, &mut budget);
        let third = TimeMonzo::from_fraction(5, 4, DEFAULT_PRIMES, &mut budget);
        let basis = ValBasis::prime_power(DEFAULT_PRIMES, 3);
        let val = Val::patent(12, &octave, basis, DEFAULT_PRIMES);
        let (tempered, _) = val.temper(&third, DEFAULT_PRIMES);
        assert!((tempered - 400.0).abs() < 1e-9);
    }
}
