//! Enumeration types shared by the store, the ledger, and the law systems.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Scale and detail
// ---------------------------------------------------------------------------

/// The level of organisation an entity lives at.
///
/// Ordered from smallest to largest, so `Scale::Atomic < Scale::Population`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    /// Individual atoms.
    Atomic,
    /// Bonded molecules.
    Molecular,
    /// Bulk matter summarising many molecules.
    Material,
    /// Rigid objects large enough for collision physics.
    Structural,
    /// Individual living organisms.
    Organismal,
    /// Statistical populations of organisms.
    Population,
}

impl Scale {
    /// Whether entities at this scale get a rigid body from the physics bridge.
    pub const fn has_rigid_body(self) -> bool {
        matches!(self, Self::Structural | Self::Organismal)
    }

    /// Whether this scale is a valid target for an aggregate.
    pub const fn can_aggregate_into(self) -> bool {
        matches!(
            self,
            Self::Molecular | Self::Material | Self::Structural | Self::Organismal
        )
    }
}

/// How explicitly an entity is simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationDetail {
    /// Simulated one-to-one.
    Explicit,
    /// Summarises child entities.
    Aggregate,
    /// Represented by statistics only (e.g. population counts).
    Statistical,
}

/// Thermodynamic phase of a physical entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateOfMatter {
    /// Below the melting point.
    Solid,
    /// Between melting and boiling points.
    Liquid,
    /// Above the boiling point.
    Gas,
    /// Ionised at extreme temperature.
    Plasma,
}

impl StateOfMatter {
    /// Whether the phase is mobile enough to diffuse.
    pub const fn is_fluid(self) -> bool {
        matches!(self, Self::Liquid | Self::Gas | Self::Plasma)
    }
}

// ---------------------------------------------------------------------------
// Ledger vocabulary
// ---------------------------------------------------------------------------

/// A globally conserved quantity tracked by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    /// Rest mass.
    Mass,
    /// Kinetic plus thermal energy.
    Energy,
    /// Electric charge.
    Charge,
    /// Linear momentum (3D).
    Momentum,
}

impl Quantity {
    /// All quantities in reporting order.
    pub const ALL: [Self; 4] = [Self::Mass, Self::Energy, Self::Charge, Self::Momentum];
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Mass => "mass",
            Self::Energy => "energy",
            Self::Charge => "charge",
            Self::Momentum => "momentum",
        };
        f.write_str(name)
    }
}

/// The kind of operation an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    /// An entity (or impulse) was registered.
    Add,
    /// An entity was unregistered.
    Remove,
    /// Children were proposed to merge into an aggregate.
    Aggregate,
    /// An aggregate was proposed to split into fragments.
    Disaggregate,
    /// Reactants were proposed to become products.
    Reaction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_order_is_smallest_first() {
        assert!(Scale::Atomic < Scale::Molecular);
        assert!(Scale::Organismal < Scale::Population);
    }

    #[test]
    fn rigid_body_scales() {
        assert!(Scale::Structural.has_rigid_body());
        assert!(Scale::Organismal.has_rigid_body());
        assert!(!Scale::Molecular.has_rigid_body());
        assert!(!Scale::Population.has_rigid_body());
    }

    #[test]
    fn aggregate_targets_exclude_atomic_and_population() {
        assert!(!Scale::Atomic.can_aggregate_into());
        assert!(Scale::Material.can_aggregate_into());
        assert!(!Scale::Population.can_aggregate_into());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&AuditOperation::Disaggregate).ok();
        assert_eq!(json.as_deref(), Some("\"disaggregate\""));
        let back: Option<Scale> = serde_json::from_str("\"organismal\"").ok();
        assert_eq!(back, Some(Scale::Organismal));
    }

    #[test]
    fn quantity_display() {
        assert_eq!(Quantity::Momentum.to_string(), "momentum");
    }
}
