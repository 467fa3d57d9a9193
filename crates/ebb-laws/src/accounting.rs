//! Conserved-quantity accounting for individual entities.
//!
//! An entity's energy is its kinetic energy plus its sensible heat:
//!
//! ```text
//! E = ½·m·|v|² + c·m·T
//! ```
//!
//! where `c` comes from the element table when the entity has a known
//! composition and defaults to [`DEFAULT_SPECIFIC_HEAT`] otherwise. Every
//! registration with the ledger and every validation goes through
//! [`conserved_quantities`], so the store and the ledger agree on what an
//! entity is worth.

use ebb_types::{ConservedQuantities, Entity};

use crate::elements;

/// Specific heat for entities without a known composition.
pub const DEFAULT_SPECIFIC_HEAT: f64 = 1.0;

/// Specific heat of an entity.
pub fn specific_heat(entity: &Entity) -> f64 {
    entity
        .chemical
        .as_ref()
        .and_then(elements::specific_heat)
        .unwrap_or(DEFAULT_SPECIFIC_HEAT)
}

/// Heat capacity `c·m`, zero for massless entities.
pub fn heat_capacity(entity: &Entity) -> f64 {
    entity.mass().map_or(0.0, |m| specific_heat(entity) * m)
}

/// Sensible heat `c·m·T`, zero without mass or temperature.
pub fn thermal_energy(entity: &Entity) -> f64 {
    entity
        .temperature()
        .map_or(0.0, |t| heat_capacity(entity) * t)
}

/// Kinetic plus thermal energy.
pub fn total_energy(entity: &Entity) -> f64 {
    entity.kinetic_energy() + thermal_energy(entity)
}

/// The four conserved quantities an entity carries.
pub fn conserved_quantities(entity: &Entity) -> ConservedQuantities {
    ConservedQuantities::new(entity.mass().unwrap_or(0.0), total_energy(entity))
        .with_charge(entity.charge())
        .with_momentum(entity.momentum())
}

/// Sum of [`conserved_quantities`] over the entities the ledger tracks.
pub fn tracked_totals<'a>(entities: impl IntoIterator<Item = &'a Entity>) -> ConservedQuantities {
    entities
        .into_iter()
        .filter(|e| e.is_tracked())
        .map(conserved_quantities)
        .sum()
}

/// Temperature that gives `entity` the thermal energy `thermal`.
///
/// `None` for entities without heat capacity.
pub fn temperature_for(entity: &Entity, thermal: f64) -> Option<f64> {
    let capacity = heat_capacity(entity);
    (capacity > 0.0).then(|| thermal / capacity)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use ebb_types::{Chemical, DVec3, Physical, Scale};

    use super::*;

    #[test]
    fn energy_combines_motion_and_heat() {
        let e = Entity::new(Scale::Structural).with_physical(
            Physical::massive(2.0, DVec3::ZERO)
                .with_velocity(DVec3::new(3.0, 0.0, 0.0))
                .with_temperature(100.0),
        );
        // ½·2·9 + 1·2·100
        assert!((total_energy(&e) - 209.0).abs() < 1e-12);
        let q = conserved_quantities(&e);
        assert!((q.mass - 2.0).abs() < f64::EPSILON);
        assert_eq!(q.momentum, DVec3::new(6.0, 0.0, 0.0));
    }

    #[test]
    fn composition_sets_specific_heat() {
        let water = Entity::new(Scale::Molecular)
            .with_physical(Physical::massive(1.0, DVec3::ZERO).with_temperature(300.0))
            .with_chemical(Chemical::from_elements([("H", 2), ("O", 1)]));
        assert!(specific_heat(&water) > 4.0);
        let t = temperature_for(&water, thermal_energy(&water));
        assert!((t.unwrap() - 300.0).abs() < 1e-9);
    }

    #[test]
    fn untracked_entities_are_excluded_from_totals() {
        let placed = Entity::new(Scale::Population).with_physical(Physical::at(DVec3::ONE));
        let massive = Entity::new(Scale::Structural).with_physical(Physical::massive(5.0, DVec3::ONE));
        let totals = tracked_totals([&placed, &massive]);
        assert!((totals.mass - 5.0).abs() < f64::EPSILON);
        assert_eq!(temperature_for(&placed, 10.0), None);
    }
}
