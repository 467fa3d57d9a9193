//! Conserved quantities: the four numbers the ledger keeps in balance.

use core::iter::Sum;
use core::ops::{Add, Neg, Sub};

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Mass, energy, charge, and momentum of one entity, one transformation
/// side, or the whole simulation.
///
/// Plain value type: copying is cheap and every arithmetic operation returns
/// a new value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConservedQuantities {
    /// Rest mass (kg).
    pub mass: f64,
    /// Kinetic plus thermal energy (J).
    pub energy: f64,
    /// Net electric charge (elementary charges).
    pub charge: f64,
    /// Linear momentum (kg·m/s).
    pub momentum: DVec3,
}

impl ConservedQuantities {
    /// All four quantities at zero.
    pub const ZERO: Self = Self {
        mass: 0.0,
        energy: 0.0,
        charge: 0.0,
        momentum: DVec3::ZERO,
    };

    /// Mass and energy with zero charge and momentum.
    pub const fn new(mass: f64, energy: f64) -> Self {
        Self {
            mass,
            energy,
            charge: 0.0,
            momentum: DVec3::ZERO,
        }
    }

    /// Replace the charge.
    #[must_use]
    pub const fn with_charge(self, charge: f64) -> Self {
        Self { charge, ..self }
    }

    /// Replace the momentum.
    #[must_use]
    pub const fn with_momentum(self, momentum: DVec3) -> Self {
        Self { momentum, ..self }
    }

    /// Whether every component is finite.
    pub fn is_finite(&self) -> bool {
        self.mass.is_finite()
            && self.energy.is_finite()
            && self.charge.is_finite()
            && self.momentum.is_finite()
    }
}

impl Add for ConservedQuantities {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            mass: self.mass + rhs.mass,
            energy: self.energy + rhs.energy,
            charge: self.charge + rhs.charge,
            momentum: self.momentum + rhs.momentum,
        }
    }
}

impl Sub for ConservedQuantities {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            mass: self.mass - rhs.mass,
            energy: self.energy - rhs.energy,
            charge: self.charge - rhs.charge,
            momentum: self.momentum - rhs.momentum,
        }
    }
}

impl Neg for ConservedQuantities {
    type Output = Self;

    fn neg(self) -> Self {
        Self::ZERO - self
    }
}

impl Sum for ConservedQuantities {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Self> for ConservedQuantities {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_optional_components() {
        let q = ConservedQuantities::new(2.0, 10.0)
            .with_charge(-1.0)
            .with_momentum(DVec3::new(1.0, 0.0, 0.0));
        assert!((q.mass - 2.0).abs() < f64::EPSILON);
        assert!((q.charge + 1.0).abs() < f64::EPSILON);
        assert!((q.momentum.x - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sum_and_difference() {
        let a = ConservedQuantities::new(50.0, 500.0);
        let b = ConservedQuantities::new(30.0, 300.0).with_charge(2.0);
        let total: ConservedQuantities = [a, b].iter().sum();
        assert!((total.mass - 80.0).abs() < 1e-12);
        assert!((total.energy - 800.0).abs() < 1e-12);
        let rest = total - a;
        assert!((rest.mass - 30.0).abs() < 1e-12);
        assert!((rest.charge - 2.0).abs() < 1e-12);
    }

    #[test]
    fn negation_flips_every_component() {
        let q = -ConservedQuantities::new(1.0, 2.0).with_momentum(DVec3::ONE);
        assert!((q.mass + 1.0).abs() < f64::EPSILON);
        assert!((q.momentum.z + 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn non_finite_detected() {
        assert!(ConservedQuantities::ZERO.is_finite());
        assert!(!ConservedQuantities::new(f64::NAN, 0.0).is_finite());
    }
}
