//! Conservation ledger for the Ebb Bloom law engine.
//!
//! The ledger tracks four globally conserved quantities (mass, energy,
//! charge, momentum) for every entity registered with it, keeps a bounded
//! audit trail of operations, and validates that proposed transformations
//! (aggregation, disaggregation, reaction) balance within tolerance.
//!
//! # Architecture
//!
//! - [`ledger`] -- The [`ConservationLedger`]: totals, validation, snapshots.
//! - [`audit`] -- [`AuditEntry`], [`LedgerSubject`], and the [`BoundedLog`] ring.
//! - [`conservation`] -- Tolerance policy and [`ViolationRecord`].
//!
//! # Tolerance Policy
//!
//! | Quantity | Comparison | Default |
//! |----------|-----------|---------|
//! | Mass | absolute | `1e-10` |
//! | Charge | absolute | `1e-10` |
//! | Energy | relative, denominator `max(expected, 1)` | `0.05` |
//!
//! A failed check records a violation and returns `false`. It never halts
//! the simulation; the caller decides whether to commit.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use ebb_events::NullSink;
//! use ebb_ledger::ConservationLedger;
//! use ebb_types::{ConservedQuantities, EntityId};
//!
//! let mut ledger = ConservationLedger::new(Arc::new(NullSink));
//! let a = EntityId::new();
//! ledger.add_entity(a, ConservedQuantities::new(50.0, 500.0));
//! ledger.add_entity(EntityId::new(), ConservedQuantities::new(30.0, 300.0));
//! ledger.remove_entity(a, ConservedQuantities::new(50.0, 500.0));
//!
//! assert!((ledger.totals().mass - 30.0).abs() < 1e-10);
//! assert_eq!(ledger.audit_trail().len(), 3);
//! ```

pub mod audit;
pub mod conservation;
pub mod ledger;

pub use audit::{AuditEntry, BoundedLog, LedgerSubject};
pub use conservation::{Tolerance, ViolationRecord};
pub use ledger::{ConservationLedger, LedgerStatistics};

use serde::Deserialize;

/// Ring sizes and tolerances for a [`ConservationLedger`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LedgerConfig {
    /// Maximum retained audit entries.
    #[serde(default = "default_max_audit_entries")]
    pub max_audit_entries: usize,

    /// Maximum retained violation records.
    #[serde(default = "default_max_violations")]
    pub max_violations: usize,

    /// Absolute mass tolerance.
    #[serde(default = "default_exact_tolerance")]
    pub mass_tolerance: f64,

    /// Absolute charge tolerance.
    #[serde(default = "default_exact_tolerance")]
    pub charge_tolerance: f64,

    /// Relative energy tolerance.
    #[serde(default = "default_energy_drift_threshold")]
    pub energy_drift_threshold: f64,
}

impl LedgerConfig {
    /// The tolerances described by this configuration.
    pub const fn tolerance(&self) -> Tolerance {
        Tolerance {
            mass: self.mass_tolerance,
            charge: self.charge_tolerance,
            energy_relative: self.energy_drift_threshold,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_audit_entries: default_max_audit_entries(),
            max_violations: default_max_violations(),
            mass_tolerance: default_exact_tolerance(),
            charge_tolerance: default_exact_tolerance(),
            energy_drift_threshold: default_energy_drift_threshold(),
        }
    }
}

const fn default_max_audit_entries() -> usize {
    10_000
}

const fn default_max_violations() -> usize {
    1_000
}

const fn default_exact_tolerance() -> f64 {
    conservation::EXACT_TOLERANCE
}

const fn default_energy_drift_threshold() -> f64 {
    conservation::ENERGY_DRIFT_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.max_audit_entries, 10_000);
        assert_eq!(config.max_violations, 1_000);
        assert_eq!(config.tolerance(), Tolerance::default());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: Option<LedgerConfig> =
            serde_yml::from_str("max_audit_entries: 5\nenergy_drift_threshold: 0.1\n").ok();
        assert_eq!(config.as_ref().map(|c| c.max_audit_entries), Some(5));
        assert_eq!(config.as_ref().map(|c| c.max_violations), Some(1_000));
        assert!(config.is_some_and(|c| (c.energy_drift_threshold - 0.1).abs() < f64::EPSILON));
    }
}
