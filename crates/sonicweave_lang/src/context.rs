//! `RootContext` — the process-wide configuration and mutable counters an
//! evaluation carries alongside its scope tree (§6.4).
//!
//! Split out from [`crate::scope::Scope`] because this state is *global*:
//! there is exactly one gas counter and one tracking-id generator per
//! evaluation, no matter how many nested scopes are alive. `RootContext` is
//! also the thing a host persists between REPL lines (§6.4), so its
//! persistent fields are kept serde-serializable and separate from the
//! process-only counters.

use std::cell::Cell;

use serde::{Deserialize, Serialize};

use sonicweave_base::IdGenerator;

/// Up/down/lift/drop inflection sizes in cents, redefinable mid-program by
/// assigning to the `up`/`lift` identifiers.
///
/// A formatted interval freezes the inflection sizes in effect *when the
/// interval was constructed*, not when it's printed — otherwise redefining
/// `up` after building a scale would retroactively change how every prior
/// note's FJS spelling renders, which would make `str()` non-deterministic
/// with respect to program order. We resolve this (an explicit Open
/// Question) by snapshotting `InflectionConfig` by value into anything that
/// needs to remember it, rather than storing a reference back into a
/// mutable `RootContext`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InflectionConfig {
    pub up_cents: f64,
    pub lift_cents: f64,
}

impl Default for InflectionConfig {
    fn default() -> Self {
        // Helmholtz-Ellis default: one up/down step is a syntonic comma
        // fraction; lift/drop is three times that (§4.2's FJS conventions).
        Self { up_cents: 1200.0 * (81.0_f64 / 80.0).log2() / 1.0, lift_cents: 3.0 * 1200.0 * (81.0_f64 / 80.0).log2() }
    }
}

/// Moment-of-symmetry generator configuration, set by `mosConfig(...)` and
/// consulted by the `mosStep`/scale-generation builtins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MosConfig {
    pub num_large: u32,
    pub num_small: u32,
    pub equave_cents: f64,
}

/// A countdown of cooperative-cancellation gas units.
///
/// `None` means unbounded (no budget configured); a long-running `while
/// (true)` then never terminates on its own, matching a host that opted
/// out of gas limiting entirely.
#[derive(Debug, Default)]
pub struct Gas {
    remaining: Cell<Option<u64>>,
}

impl Gas {
    pub fn bounded(amount: u64) -> Self {
        Self { remaining: Cell::new(Some(amount)) }
    }

    pub fn unbounded() -> Self {
        Self { remaining: Cell::new(None) }
    }

    /// Spends `n` units, returning `Err(())` once the budget underflows.
    /// Unbounded gas always succeeds.
    pub fn spend(&self, n: u64) -> Result<(), ()> {
        match self.remaining.get() {
            None => Ok(()),
            Some(r) if r >= n => {
                self.remaining.set(Some(r - n));
                Ok(())
            }
            Some(_) => {
                self.remaining.set(Some(0));
                Err(())
            }
        }
    }

    pub fn remaining(&self) -> Option<u64> {
        self.remaining.get()
    }
}

/// The persistent, serializable part of a `RootContext` (§6.4): everything
/// a host needs to resume evaluating later-typed lines as if they were part
/// of the same session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootContextConfig {
    /// Host-assigned name for the session, persisted verbatim (§6.4).
    pub title: Option<String>,
    /// Reference pitch for octave-numbered note names (`C4` by convention).
    pub c4_hz: f64,
    /// Frequency a bare absolute pitch with no explicit reference resolves
    /// against; `None` until the first absolute pitch is evaluated.
    pub unison_frequency: Option<f64>,
    pub inflections: InflectionConfig,
    pub mos_config: Option<MosConfig>,
    /// Number of prime-basis components new monzos are built with.
    pub num_components: usize,
}

impl Default for RootContextConfig {
    fn default() -> Self {
        Self {
            title: None,
            c4_hz: 261.6255653005986,
            unison_frequency: None,
            inflections: InflectionConfig::default(),
            mos_config: None,
            num_components: sonicweave_numeric::DEFAULT_PRIMES.len(),
        }
    }
}

/// The full evaluation-wide context: persistent configuration plus the
/// process-only counters that never survive a serialize/deserialize round
/// trip (gas is re-granted fresh by the host on each call; tracking ids
/// restart at 0 unless a host stitches sessions together more carefully).
pub struct RootContext {
    pub config: RootContextConfig,
    pub gas: Gas,
    tracking_ids: Cell<IdGenerator>,
}

impl RootContext {
    pub fn new(config: RootContextConfig, gas: Gas) -> Self {
        Self { config, gas, tracking_ids: Cell::new(IdGenerator::new()) }
    }

    /// A context with unbounded gas and default configuration, for tests
    /// and one-off evaluations that don't care about resource limits.
    pub fn unbounded() -> Self {
        Self::new(RootContextConfig::default(), Gas::unbounded())
    }

    /// Mints a fresh tracking id for `track()` (§5).
    pub fn next_tracking_id(&self) -> u64 {
        let mut gen = self.tracking_ids.get();
        let id = gen.next();
        self.tracking_ids.set(gen);
        id
    }

    /// The next id `next_tracking_id` would hand out, for persistence
    /// (§6.4's `trackingIndex`) without consuming one.
    pub fn tracking_index(&self) -> u64 {
        let gen = self.tracking_ids.get();
        self.tracking_ids.set(gen);
        gen.peek()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gas_underflow_reports_error() {
        let gas = Gas::bounded(5);
        assert!(gas.spend(3).is_ok());
        assert!(gas.spend(3).is_err());
        assert_eq!(gas.remaining(), Some(0));
    }

    #[test]
    fn unbounded_gas_never_errors() {
        let gas = Gas::unbounded();
        assert!(gas.spend(u64::MAX).is_ok());
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = RootContextConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: RootContextConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.c4_hz, back.c4_hz);
    }

    #[test]
    fn tracking_ids_are_distinct() {
        let ctx = RootContext::unbounded();
        let a = ctx.next_tracking_id();
        let b = ctx.next_tracking_id();
        assert_ne!(a, b);
    }
}
