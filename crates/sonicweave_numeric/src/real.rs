//! `TimeReal` — the lossy floating-point fallback.
//!
//! Used whenever an operation cannot produce an exact [`TimeMonzo`](crate::monzo::TimeMonzo):
//! irrational roots, transcendental functions, an explicit `r` suffix in
//! source, or a residual too large to factor within budget. Once a value is
//! real, every further operation involving it stays real — there is no way
//! back to exactness (§4.1 "Promotion to TimeReal").

use std::fmt;

/// A lossy `(time_exponent, value)` pair, both `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeReal {
    /// Dimensional exponent of seconds, same convention as [`TimeMonzo::time_exponent`](crate::monzo::TimeMonzo).
    pub time_exponent: f64,
    /// The linear-domain value itself.
    pub value: f64,
}

impl TimeReal {
    /// Builds a relative (`time_exponent == 0`) real value.
    pub fn relative(value: f64) -> Self {
        Self { time_exponent: 0.0, value }
    }

    /// `self * other`.
    pub fn mul(&self, other: &TimeReal) -> TimeReal {
        TimeReal {
            time_exponent: self.time_exponent + other.time_exponent,
            value: self.value * other.value,
        }
    }

    /// `self / other`.
    pub fn div(&self, other: &TimeReal) -> TimeReal {
        TimeReal {
            time_exponent: self.time_exponent - other.time_exponent,
            value: self.value / other.value,
        }
    }

    /// `self ^ exponent`.
    pub fn pow(&self, exponent: f64) -> TimeReal {
        TimeReal {
            time_exponent: self.time_exponent * exponent,
            value: self.value.powf(exponent),
        }
    }

    /// `1200 * log2(value)`.
    pub fn total_cents(&self) -> f64 {
        1200.0 * self.value.ln() / std::f64::consts::LN_2
    }

    /// `log(|value|)`, the real-valued analogue of Tenney height for a
    /// value that is no longer known to be rational.
    pub fn tenney_height(&self) -> f64 {
        self.value.abs().ln()
    }
}

impl fmt::Display for TimeReal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}r", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_adds_time_exponents() {
        let a = TimeReal { time_exponent: 1.0, value: 2.0 };
        let b = TimeReal { time_exponent: -1.0, value: 3.0 };
        let c = a.mul(&b);
        assert_eq!(c.time_exponent, 0.0);
        assert_eq!(c.value, 6.0);
    }

    #[test]
    fn total_cents_of_two_is_1200() {
        let octave = TimeReal::relative(2.0);
        assert!((octave.total_cents() - 1200.0).abs() < 1e-9);
    }
}
