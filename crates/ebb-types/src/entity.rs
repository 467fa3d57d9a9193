//! The entity: a stable id plus a sparse bundle of typed attribute groups.
//!
//! Every group is an `Option` on [`Entity`]. Law systems select the entities
//! they act on by group presence (`entity.chemical.is_some()`), never by
//! downcasting.
//!
//! | Group | Meaning |
//! |-------|---------|
//! | [`Identity`] | parent, lineage, generation |
//! | [`Physical`] | mass, position, velocity, temperature, charge, phase, body |
//! | [`Chemical`] | element counts, bonds, orbital shells |
//! | [`Biological`] | genome, phenotype, metabolism, energy and waste stores |
//! | [`Ecological`] | niche, trophic level, population statistics |
//! | [`Cultural`] | meme strengths |
//! | [`Aggregation`] | children summarised and their conserved totals |

use std::collections::BTreeMap;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::enums::{Scale, SimulationDetail, StateOfMatter};
use crate::ids::{BodyHandle, EntityId, LineageId};

// ---------------------------------------------------------------------------
// Attribute groups
// ---------------------------------------------------------------------------

/// Ancestry of an entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// The entity this one was derived from (fission parent, aggregate, ...).
    #[serde(default)]
    pub parent_id: Option<EntityId>,
    /// Lineage shared with every descendant of the same founder.
    #[serde(default)]
    pub lineage_id: Option<LineageId>,
    /// Number of derivations from the founder.
    #[serde(default)]
    pub generation: u32,
}

/// Physical state. Mass and position are individually optional so that
/// statistical entities can be placed in space without carrying mass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Physical {
    /// Rest mass in kilograms, strictly positive when present.
    #[serde(default)]
    pub mass: Option<f64>,
    /// Position in world space (metres).
    #[serde(default)]
    pub position: Option<DVec3>,
    /// Velocity (m/s).
    #[serde(default)]
    pub velocity: Option<DVec3>,
    /// Temperature in Kelvin, strictly positive when present.
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Net charge in elementary charges.
    #[serde(default)]
    pub charge: Option<f64>,
    /// Current phase.
    #[serde(default)]
    pub state: Option<StateOfMatter>,
    /// Rigid body assigned by the physics bridge.
    #[serde(default)]
    pub body: Option<BodyHandle>,
}

impl Physical {
    /// A massive body at rest at `position`.
    pub const fn massive(mass: f64, position: DVec3) -> Self {
        Self {
            mass: Some(mass),
            position: Some(position),
            velocity: None,
            temperature: None,
            charge: None,
            state: None,
            body: None,
        }
    }

    /// A massless placement at `position`.
    pub const fn at(position: DVec3) -> Self {
        Self {
            mass: None,
            position: Some(position),
            velocity: None,
            temperature: None,
            charge: None,
            state: None,
            body: None,
        }
    }

    /// Set the velocity.
    #[must_use]
    pub const fn with_velocity(mut self, velocity: DVec3) -> Self {
        self.velocity = Some(velocity);
        self
    }

    /// Set the temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the charge.
    #[must_use]
    pub const fn with_charge(mut self, charge: f64) -> Self {
        self.charge = Some(charge);
        self
    }

    /// Set the phase.
    #[must_use]
    pub const fn with_state(mut self, state: StateOfMatter) -> Self {
        self.state = Some(state);
        self
    }
}

/// Chemical composition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chemical {
    /// Element symbol to atom count, e.g. `{"H": 2, "O": 1}`.
    #[serde(default)]
    pub elements: BTreeMap<String, u32>,
    /// Bond identifiers, e.g. `"H-O"`.
    #[serde(default)]
    pub bonds: Vec<String>,
    /// Electron counts per shell.
    #[serde(default)]
    pub orbital_shells: Option<Vec<u32>>,
}

impl Chemical {
    /// Composition from `(symbol, count)` pairs.
    pub fn from_elements<'a>(pairs: impl IntoIterator<Item = (&'a str, u32)>) -> Self {
        Self {
            elements: pairs
                .into_iter()
                .map(|(symbol, count)| (symbol.to_owned(), count))
                .collect(),
            bonds: Vec::new(),
            orbital_shells: None,
        }
    }

    /// Total number of atoms.
    pub fn atom_count(&self) -> u32 {
        self.elements
            .values()
            .fold(0_u32, |acc, count| acc.saturating_add(*count))
    }

    /// Hill-style formula string, e.g. `"H2O"`.
    pub fn formula(&self) -> String {
        self.elements
            .iter()
            .map(|(symbol, count)| {
                if *count == 1 {
                    symbol.clone()
                } else {
                    format!("{symbol}{count}")
                }
            })
            .collect()
    }
}

/// Energy budget of a living entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metabolism {
    /// Energy gained per second under ideal conditions.
    pub energy_production: f64,
    /// Baseline energy spent per second.
    pub maintenance_cost: f64,
    /// Named metabolic pathways (informational).
    #[serde(default)]
    pub pathways: Vec<String>,
}

/// Heritable and metabolic state of a living entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Biological {
    /// Genome over the `ACGT` alphabet.
    pub genome: String,
    /// Trait name to expressed value.
    #[serde(default)]
    pub phenotype: BTreeMap<String, f64>,
    /// Energy production and cost.
    #[serde(default)]
    pub metabolism: Option<Metabolism>,
    /// Stored usable energy.
    #[serde(default)]
    pub energy_stores: Option<f64>,
    /// Accumulated waste.
    #[serde(default)]
    pub waste_stores: Option<f64>,
}

/// Counts for a statistical population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationStats {
    /// Number of individuals. Whole numbers after every integration.
    pub count: f64,
    /// Individuals per unit area.
    #[serde(default)]
    pub density: f64,
    /// Relative change over the last tick.
    #[serde(default)]
    pub growth_rate: f64,
}

/// Place in the food web.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ecological {
    /// Position in niche space.
    #[serde(default)]
    pub niche: Option<Vec<f64>>,
    /// 1 = producer, 2 = primary consumer, ...
    pub trophic_level: u8,
    /// Population counts for statistical entities.
    #[serde(default)]
    pub population: Option<PopulationStats>,
}

/// Culturally transmitted memes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cultural {
    /// Meme name to strength in `[0, 1]`.
    #[serde(default)]
    pub memes: BTreeMap<String, f64>,
}

/// Summary of the children an aggregate replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    /// Children merged into this aggregate (retired ids).
    pub children: Vec<EntityId>,
    /// Sum of the children's masses at aggregation time.
    pub conserved_mass: f64,
    /// Sum of the children's charges at aggregation time.
    pub conserved_charge: f64,
    /// Sum of the children's energies at aggregation time.
    pub conserved_energy: f64,
    /// Scale the aggregate lives at.
    pub scale: Scale,
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A uniquely identified bundle of optional attribute groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identifier.
    pub id: EntityId,
    /// Level of organisation.
    pub scale: Scale,
    /// How explicitly the entity is simulated.
    #[serde(default)]
    pub detail: Option<SimulationDetail>,
    /// Ancestry.
    #[serde(default)]
    pub identity: Identity,
    /// Physical state.
    #[serde(default)]
    pub physical: Option<Physical>,
    /// Composition.
    #[serde(default)]
    pub chemical: Option<Chemical>,
    /// Living state.
    #[serde(default)]
    pub biological: Option<Biological>,
    /// Food-web role.
    #[serde(default)]
    pub ecological: Option<Ecological>,
    /// Memes.
    #[serde(default)]
    pub cultural: Option<Cultural>,
    /// Aggregate summary.
    #[serde(default)]
    pub aggregation: Option<Aggregation>,
}

impl Entity {
    /// A bare entity with a fresh id.
    pub fn new(scale: Scale) -> Self {
        Self {
            id: EntityId::new(),
            scale,
            detail: None,
            identity: Identity::default(),
            physical: None,
            chemical: None,
            biological: None,
            ecological: None,
            cultural: None,
            aggregation: None,
        }
    }

    /// Replace the id (caller-assigned ids).
    #[must_use]
    pub const fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    /// Set the simulation detail.
    #[must_use]
    pub const fn with_detail(mut self, detail: SimulationDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Set the identity group.
    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    /// Attach a physical group.
    #[must_use]
    pub fn with_physical(mut self, physical: Physical) -> Self {
        self.physical = Some(physical);
        self
    }

    /// Attach a chemical group.
    #[must_use]
    pub fn with_chemical(mut self, chemical: Chemical) -> Self {
        self.chemical = Some(chemical);
        self
    }

    /// Attach a biological group.
    #[must_use]
    pub fn with_biological(mut self, biological: Biological) -> Self {
        self.biological = Some(biological);
        self
    }

    /// Attach an ecological group.
    #[must_use]
    pub fn with_ecological(mut self, ecological: Ecological) -> Self {
        self.ecological = Some(ecological);
        self
    }

    /// Attach a cultural group.
    #[must_use]
    pub fn with_cultural(mut self, cultural: Cultural) -> Self {
        self.cultural = Some(cultural);
        self
    }

    /// Attach an aggregation group.
    #[must_use]
    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Mass, if the entity has one.
    pub fn mass(&self) -> Option<f64> {
        self.physical.as_ref().and_then(|p| p.mass)
    }

    /// Position, if the entity is placed.
    pub fn position(&self) -> Option<DVec3> {
        self.physical.as_ref().and_then(|p| p.position)
    }

    /// Velocity, zero when absent.
    pub fn velocity(&self) -> DVec3 {
        self.physical
            .as_ref()
            .and_then(|p| p.velocity)
            .unwrap_or(DVec3::ZERO)
    }

    /// Temperature, if known.
    pub fn temperature(&self) -> Option<f64> {
        self.physical.as_ref().and_then(|p| p.temperature)
    }

    /// Charge, zero when absent.
    pub fn charge(&self) -> f64 {
        self.physical
            .as_ref()
            .and_then(|p| p.charge)
            .unwrap_or(0.0)
    }

    /// Linear momentum `m·v`, zero for massless entities.
    pub fn momentum(&self) -> DVec3 {
        self.mass().map_or(DVec3::ZERO, |m| self.velocity() * m)
    }

    /// Kinetic energy `½·m·|v|²`, zero for massless entities.
    pub fn kinetic_energy(&self) -> f64 {
        self.mass()
            .map_or(0.0, |m| 0.5 * m * self.velocity().length_squared())
    }

    // -----------------------------------------------------------------------
    // Capability predicates
    // -----------------------------------------------------------------------

    /// Mass and position: the entity is tracked by the conservation ledger.
    pub fn is_tracked(&self) -> bool {
        self.physical
            .as_ref()
            .is_some_and(|p| p.mass.is_some() && p.position.is_some())
    }

    /// Has a chemical composition.
    pub const fn is_chemical(&self) -> bool {
        self.chemical.is_some()
    }

    /// Has a biological group.
    pub const fn is_biological(&self) -> bool {
        self.biological.is_some()
    }

    /// Summarises children.
    pub const fn is_aggregate(&self) -> bool {
        self.aggregation.is_some()
    }

    /// Carries population statistics.
    pub fn is_population(&self) -> bool {
        self.ecological
            .as_ref()
            .is_some_and(|e| e.population.is_some())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn builder_attaches_groups() {
        let e = Entity::new(Scale::Molecular)
            .with_physical(Physical::massive(18.0, DVec3::ZERO).with_temperature(300.0))
            .with_chemical(Chemical::from_elements([("H", 2), ("O", 1)]));
        assert!(e.is_tracked());
        assert!(e.is_chemical());
        assert!(!e.is_biological());
        assert_eq!(e.temperature(), Some(300.0));
    }

    #[test]
    fn massless_placement_is_not_tracked() {
        let e = Entity::new(Scale::Population).with_physical(Physical::at(DVec3::ONE));
        assert!(!e.is_tracked());
        assert_eq!(e.position(), Some(DVec3::ONE));
    }

    #[test]
    fn momentum_and_kinetic_energy() {
        let e = Entity::new(Scale::Structural).with_physical(
            Physical::massive(2.0, DVec3::ZERO).with_velocity(DVec3::new(3.0, 4.0, 0.0)),
        );
        assert!((e.momentum().x - 6.0).abs() < 1e-12);
        assert!((e.kinetic_energy() - 25.0).abs() < 1e-12);
    }

    #[test]
    fn formula_and_atom_count() {
        let c = Chemical::from_elements([("H", 2), ("O", 1)]);
        assert_eq!(c.formula(), "H2O");
        assert_eq!(c.atom_count(), 3);
    }

    #[test]
    fn entity_round_trips_through_json() {
        let e = Entity::new(Scale::Organismal)
            .with_physical(Physical::massive(5.0, DVec3::new(1.0, 2.0, 3.0)))
            .with_biological(Biological {
                genome: "ACGT".to_owned(),
                ..Biological::default()
            });
        let json = serde_json::to_string(&e).unwrap();
        let back: Option<Entity> = serde_json::from_str(&json).ok();
        assert_eq!(back, Some(e));
    }
}
