//! Heat flow: conduction between neighbours, radiation to space, phase.
//!
//! Conduction exchanges `Q = k·(T_b − T_a)·Δt` between every pair of
//! entities within `conduction_radius`, capped at the amount that would
//! equalise the pair. Radiation loses `σ·ε·A·(T⁴ − T_amb⁴)` over the body's
//! sphere area and never overshoots ambient. Temperatures are then clamped
//! and entities with a known composition take the phase their melting and
//! boiling points imply.
//!
//! Conduction is internal and nets to zero. Radiation and clamping move
//! heat across the world boundary; the net is booked against the ledger's
//! environment subject.

use std::f64::consts::PI;

use ebb_events::LawEvent;
use ebb_store::EntityStore;
use ebb_types::EntityId;
use tracing::trace;

use crate::accounting::{heat_capacity, thermal_energy};
use crate::config::ThermodynamicsConfig;
use crate::context::SystemContext;
use crate::elements;
use crate::error::LawError;
use crate::kernels;
use crate::system::LawSystem;

/// Conduction, radiation and phase transitions.
#[derive(Debug, Clone)]
pub struct Thermodynamics {
    config: ThermodynamicsConfig,
}

impl Thermodynamics {
    /// A system with the given coefficients.
    pub const fn new(config: ThermodynamicsConfig) -> Self {
        Self { config }
    }

    fn conduct(&self, store: &mut EntityStore, a: EntityId, b: EntityId, delta: f64) {
        let (Some(ea), Some(eb)) = (store.get(a), store.get(b)) else {
            return;
        };
        let (Some(ta), Some(tb)) = (ea.temperature(), eb.temperature()) else {
            return;
        };
        let (ca, cb) = (heat_capacity(ea), heat_capacity(eb));
        if ca <= 0.0 || cb <= 0.0 {
            return;
        }

        let gap = tb - ta;
        let equalising = gap * ca * cb / (ca + cb);
        let mut heat = self.config.conductivity * gap * delta;
        if heat.abs() > equalising.abs() {
            heat = equalising;
        }

        set_temperature(store, a, ta + heat / ca);
        set_temperature(store, b, tb - heat / cb);
    }

    fn radiate(&self, temperature: f64, mass: f64, capacity: f64, ambient: f64, delta: f64) -> f64 {
        let radius = kernels::sphere_radius(mass, self.config.density);
        let area = 4.0 * PI * radius * radius;
        let power = kernels::blackbody_power(self.config.emissivity, area, temperature, ambient)
            * self.config.radiative_coupling;
        let cooled = temperature - power * delta / capacity;
        if temperature > ambient {
            cooled.max(ambient)
        } else {
            cooled.min(ambient)
        }
    }
}

fn set_temperature(store: &mut EntityStore, id: EntityId, temperature: f64) {
    if let Some(p) = store.get_mut(id).and_then(|e| e.physical.as_mut()) {
        p.temperature = Some(temperature);
    }
}

fn tracked_heat(store: &EntityStore, ids: &[EntityId]) -> f64 {
    ids.iter()
        .filter_map(|id| store.get(*id))
        .filter(|e| e.is_tracked())
        .map(thermal_energy)
        .sum()
}

impl LawSystem for Thermodynamics {
    fn name(&self) -> &'static str {
        "thermodynamics"
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, delta: f64) -> Result<(), LawError> {
        let ambient = ctx.environment.ambient_temperature;
        let ids = ctx
            .store
            .ids_where(|e| e.temperature().is_some() && e.mass().is_some());
        let heat_before = tracked_heat(ctx.store, &ids);

        for &a in &ids {
            let Some(position) = ctx.store.get(a).and_then(ebb_types::Entity::position) else {
                continue;
            };
            for b in ctx.spatial.query_radius(position, self.config.conduction_radius) {
                if b > a && ids.binary_search(&b).is_ok() {
                    self.conduct(ctx.store, a, b, delta);
                }
            }
        }

        let mut transitions = Vec::new();
        for &id in &ids {
            let Some(entity) = ctx.store.get_mut(id) else {
                continue;
            };
            let (Some(t), Some(mass)) = (entity.temperature(), entity.mass()) else {
                continue;
            };
            let capacity = heat_capacity(entity);
            let radiated = if capacity > 0.0 {
                self.radiate(t, mass, capacity, ambient, delta)
            } else {
                t
            };
            let clamped = radiated.clamp(self.config.min_temperature, self.config.max_temperature);

            let phase = entity
                .chemical
                .as_ref()
                .map(|c| elements::phase_points(Some(c)).phase_at(clamped));
            if let Some(p) = entity.physical.as_mut() {
                p.temperature = Some(clamped);
                if let Some(to) = phase.filter(|to| p.state != Some(*to)) {
                    transitions.push(LawEvent::PhaseTransition {
                        entity: id,
                        from: p.state,
                        to,
                    });
                    p.state = Some(to);
                }
            }
        }

        let exchanged = tracked_heat(ctx.store, &ids) - heat_before;
        ctx.book_environment_exchange(exchanged);
        for event in transitions {
            ctx.emit(event);
        }

        trace!(tick = ctx.tick, entities = ids.len(), exchanged, "Heat flow applied");
        Ok(())
    }
}
