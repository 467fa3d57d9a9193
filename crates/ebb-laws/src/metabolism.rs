//! Organism energy budgets.
//!
//! Each tick an organism with a metabolism gains
//! `energy_production · efficiency(T) · Δt` and pays
//! `maintenance_cost · (m / m_ref)^0.75 · Δt`. A fixed fraction of the gain
//! becomes waste. Stores never drop below zero; reaching zero emits one
//! `Starvation` event.
//!
//! Energy stores are biological bookkeeping, not thermal energy, so the
//! ledger is not involved.

use ebb_events::LawEvent;
use ebb_types::Entity;
use tracing::debug;

use crate::config::MetabolismConfig;
use crate::context::SystemContext;
use crate::error::LawError;
use crate::kernels;
use crate::system::LawSystem;

/// Energy intake and upkeep of living things.
#[derive(Debug, Clone)]
pub struct Metabolism {
    config: MetabolismConfig,
}

impl Metabolism {
    /// A system with the given physiology.
    pub const fn new(config: MetabolismConfig) -> Self {
        Self { config }
    }

    /// Fraction of nominal production achieved at the entity's temperature.
    pub fn efficiency(&self, entity: &Entity) -> f64 {
        entity.temperature().map_or(self.config.default_efficiency, |t| {
            kernels::metabolic_efficiency(t, self.config.optimal_temperature, self.config.thermal_sensitivity)
        })
    }

    /// Kleiber scaling of maintenance relative to the reference mass.
    pub fn upkeep_scale(&self, entity: &Entity) -> f64 {
        match entity.mass() {
            Some(m) if self.config.reference_mass > 0.0 => {
                kernels::kleiber(m / self.config.reference_mass, 1.0)
            }
            _ => 1.0,
        }
    }
}

impl LawSystem for Metabolism {
    fn name(&self) -> &'static str {
        "metabolism"
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, delta: f64) -> Result<(), LawError> {
        if delta <= 0.0 {
            return Ok(());
        }
        let mut starved = Vec::new();
        for entity in ctx.store.iter_mut() {
            let efficiency = self.efficiency(entity);
            let upkeep = self.upkeep_scale(entity);
            let id = entity.id;
            let Some(biological) = entity.biological.as_mut() else {
                continue;
            };
            let Some(metabolism) = biological.metabolism.as_ref() else {
                continue;
            };

            let gain = metabolism.energy_production * efficiency * delta;
            let cost = metabolism.maintenance_cost * upkeep * delta;
            let before = biological.energy_stores.unwrap_or(0.0);
            let after = (before + gain - cost).max(0.0);

            biological.energy_stores = Some(after);
            biological.waste_stores = Some(gain.mul_add(self.config.waste_fraction, biological.waste_stores.unwrap_or(0.0)));
            if before > 0.0 && after <= 0.0 {
                starved.push(id);
            }
        }
        for entity in starved {
            debug!(entity = %entity, tick = ctx.tick, "Organism starving");
            ctx.emit(LawEvent::Starvation { entity });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ebb_types::{Biological, DVec3, EntityId, Physical, Scale};

    use super::*;
    use crate::context::testing::Harness;

    fn organism(stores: f64, production: f64, maintenance: f64, mass: f64) -> Entity {
        Entity::new(Scale::Organismal)
            .with_physical(Physical::massive(mass, DVec3::ZERO).with_temperature(300.0))
            .with_biological(Biological {
                genome: "ACGTACGT".to_owned(),
                metabolism: Some(ebb_types::Metabolism {
                    energy_production: production,
                    maintenance_cost: maintenance,
                    pathways: vec!["aerobic".to_owned()],
                }),
                energy_stores: Some(stores),
                ..Biological::default()
            })
    }

    fn stores(h: &Harness, id: EntityId) -> f64 {
        h.store
            .get(id)
            .and_then(|e| e.biological.as_ref())
            .and_then(|b| b.energy_stores)
            .unwrap_or(f64::NAN)
    }

    #[test]
    fn upkeep_drains_a_large_cool_organism() {
        let mut h = Harness::new();
        let id = h.add(organism(200.0, 10.0, 5.0, 100.0));
        let mut system = Metabolism::new(MetabolismConfig::default());
        assert!(h.run(&mut system, 1.0).is_ok());
        let left = stores(&h, id);
        assert!(left < 200.0 && left > 0.0);
        let waste = h
            .store
            .get(id)
            .and_then(|e| e.biological.as_ref())
            .and_then(|b| b.waste_stores);
        assert!(waste.is_some_and(|w| w > 0.0));
    }

    #[test]
    fn warmth_at_the_optimum_is_fully_efficient() {
        let system = Metabolism::new(MetabolismConfig::default());
        let mut e = organism(1.0, 1.0, 1.0, 70.0);
        if let Some(p) = e.physical.as_mut() {
            p.temperature = Some(310.0);
        }
        assert!((system.efficiency(&e) - 1.0).abs() < 1e-12);
        assert!((system.upkeep_scale(&e) - 1.0).abs() < 1e-12);
        assert!(system.efficiency(&organism(1.0, 1.0, 1.0, 70.0)) < 1.0);
    }

    #[test]
    fn starvation_fires_once_and_stores_stay_non_negative() {
        let mut h = Harness::new();
        let id = h.add(organism(1.0, 0.0, 10.0, 70.0));
        let mut system = Metabolism::new(MetabolismConfig::default());
        for _ in 0..3 {
            assert!(h.run(&mut system, 1.0).is_ok());
        }
        assert!(stores(&h, id).abs() < f64::EPSILON);
        assert_eq!(h.sink.count_kind("starvation"), 1);
    }

    #[test]
    fn entities_without_metabolism_are_ignored() {
        let mut h = Harness::new();
        let rock = h.add(Entity::new(Scale::Structural).with_physical(Physical::massive(5.0, DVec3::ZERO)));
        let mut system = Metabolism::new(MetabolismConfig::default());
        assert!(h.run(&mut system, 1.0).is_ok());
        assert!(h.store.get(rock).is_some_and(|e| e.biological.is_none()));
    }
}
