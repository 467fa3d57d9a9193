//! Tolerance policy for conserved-quantity checks.
//!
//! Mass and charge are exact conserved quantities in this model, so they are
//! compared with a tight absolute tolerance that only absorbs accumulated
//! floating-point error. Energy is compared by relative drift because
//! binding, kinetic, and thermal exchanges are approximated:
//!
//! ```text
//! mass:    |actual - expected| > 1e-10                   -> violation
//! charge:  |actual - expected| > 1e-10                   -> violation
//! energy:  |(actual - expected) / max(expected, 1)| > 0.05 -> violation
//! ```
//!
//! All comparisons are strict, so a drift of exactly the tolerance passes.
//! A NaN drift always fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ebb_types::{ConservedQuantities, Quantity};

/// Default absolute tolerance for mass and charge.
pub const EXACT_TOLERANCE: f64 = 1e-10;

/// Default relative tolerance for energy.
pub const ENERGY_DRIFT_THRESHOLD: f64 = 0.05;

/// Tolerances applied by every balance check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// Absolute mass tolerance.
    pub mass: f64,
    /// Absolute charge tolerance.
    pub charge: f64,
    /// Relative energy tolerance.
    pub energy_relative: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            mass: EXACT_TOLERANCE,
            charge: EXACT_TOLERANCE,
            energy_relative: ENERGY_DRIFT_THRESHOLD,
        }
    }
}

/// One quantity that failed a balance check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drift {
    /// The failing quantity.
    pub quantity: Quantity,
    /// Input-side value.
    pub expected: f64,
    /// Output-side value.
    pub actual: f64,
    /// Absolute drift (mass, charge) or relative drift (energy).
    pub drift: f64,
}

/// A recorded conservation violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationRecord {
    /// When the violation was recorded.
    pub timestamp: DateTime<Utc>,
    /// The failing quantity.
    pub quantity: Quantity,
    /// Input-side value.
    pub expected: f64,
    /// Output-side value.
    pub actual: f64,
    /// Absolute drift (mass, charge) or relative drift (energy).
    pub drift: f64,
    /// Free-text context from the caller.
    pub context: String,
}

/// Relative energy drift: `|(actual - expected) / max(expected, 1)|`.
///
/// The denominator floor keeps near-zero energies from producing huge
/// ratios.
pub fn relative_energy_drift(expected: f64, actual: f64) -> f64 {
    ((actual - expected) / expected.max(1.0)).abs()
}

/// `true` when `drift` exceeds `tolerance` or is not a number.
fn exceeds(drift: f64, tolerance: f64) -> bool {
    drift.is_nan() || drift > tolerance
}

/// Compare `input` against `output` and list every quantity out of tolerance.
///
/// Momentum is not compared: physics impulses are booked separately and the
/// transformation callers conserve it by construction.
pub fn check_balance(
    input: &ConservedQuantities,
    output: &ConservedQuantities,
    tolerance: &Tolerance,
) -> Vec<Drift> {
    let mut drifts = Vec::new();

    let mass_drift = (output.mass - input.mass).abs();
    if exceeds(mass_drift, tolerance.mass) {
        drifts.push(Drift {
            quantity: Quantity::Mass,
            expected: input.mass,
            actual: output.mass,
            drift: mass_drift,
        });
    }

    let energy_drift = relative_energy_drift(input.energy, output.energy);
    if exceeds(energy_drift, tolerance.energy_relative) {
        drifts.push(Drift {
            quantity: Quantity::Energy,
            expected: input.energy,
            actual: output.energy,
            drift: energy_drift,
        });
    }

    let charge_drift = (output.charge - input.charge).abs();
    if exceeds(charge_drift, tolerance.charge) {
        drifts.push(Drift {
            quantity: Quantity::Charge,
            expected: input.charge,
            actual: output.charge,
            drift: charge_drift,
        });
    }

    drifts
}
