//! The per-tick view a law system works through.
//!
//! [`SystemContext`] bundles mutable access to the store, the ledger and
//! the shared [`Environment`] with read access to the spatial index. Its
//! helpers keep the store and the ledger in step: anything a system adds,
//! removes or re-weighs goes through them.

use ebb_events::{EventSink, LawEvent};
use ebb_ledger::{ConservationLedger, LedgerSubject};
use ebb_store::{EntityStore, SpatialIndex};
use ebb_types::{ConservedQuantities, Entity, EntityId};
use rand::rngs::SmallRng;
use serde::Serialize;

use crate::accounting::conserved_quantities;
use crate::config::ViolationPolicy;
use crate::error::LawError;
use crate::kernels::CMB_TEMPERATURE;

/// Conditions shared by every system, maintained by cosmic forcing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Environment {
    /// Ambient temperature (K).
    pub ambient_temperature: f64,
    /// Stellar flux reaching the surface right now (W/m²).
    pub insolation: f64,
    /// Simulated seconds since the world began.
    pub cosmic_time: f64,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            ambient_temperature: CMB_TEMPERATURE,
            insolation: 0.0,
            cosmic_time: 0.0,
        }
    }
}

/// Everything a law system may touch during one tick.
pub struct SystemContext<'a> {
    /// The entity store.
    pub store: &'a mut EntityStore,
    /// The conservation ledger.
    pub ledger: &'a mut ConservationLedger,
    /// Positions as of the start of the tick.
    pub spatial: &'a SpatialIndex,
    /// Shared environmental state.
    pub environment: &'a mut Environment,
    /// The world's only source of randomness.
    pub rng: &'a mut SmallRng,
    /// Where domain events go.
    pub sink: &'a dyn EventSink,
    /// Tick being run, starting at 1.
    pub tick: u64,
    /// Simulated seconds before this tick.
    pub elapsed: f64,
    /// Commit policy for unbalanced transformations.
    pub policy: ViolationPolicy,
}

impl SystemContext<'_> {
    /// Emit a domain event.
    pub fn emit(&self, event: LawEvent) {
        self.sink.emit(event);
    }

    /// Validate and insert `entity`, registering it with the ledger when it
    /// has mass and position.
    pub fn spawn(&mut self, entity: Entity) -> Result<EntityId, LawError> {
        entity.validate()?;
        let quantities = entity.is_tracked().then(|| conserved_quantities(&entity));
        let id = self.store.insert(entity)?.id;
        if let Some(q) = quantities {
            self.ledger.add_entity(id, q);
        }
        Ok(id)
    }

    /// Unregister `id` from the ledger, then remove it from the store.
    pub fn despawn(&mut self, id: EntityId) -> Option<Entity> {
        let quantities = self
            .store
            .get(id)
            .filter(|e| e.is_tracked())
            .map(conserved_quantities);
        if let Some(q) = quantities {
            self.ledger.remove_entity(id, q);
        }
        self.store.remove(id)
    }

    /// Apply `change` to `id` and re-register its conserved quantities.
    ///
    /// The change is applied to a copy and validated first; an invalid
    /// result leaves the entity untouched.
    pub fn reweigh(&mut self, id: EntityId, change: impl FnOnce(&mut Entity)) -> Result<(), LawError> {
        let current = self.store.get_mut(id).ok_or(LawError::MissingEntity(id))?;
        let mut updated = current.clone();
        change(&mut updated);
        updated.id = id;
        updated.validate()?;

        let before = current.is_tracked().then(|| conserved_quantities(current));
        let after = updated.is_tracked().then(|| conserved_quantities(&updated));
        *current = updated;

        if let Some(q) = before {
            self.ledger.remove_entity(id, q);
        }
        if let Some(q) = after {
            self.ledger.add_entity(id, q);
        }
        Ok(())
    }

    /// Book heat exchanged with the world outside the simulation.
    pub fn book_environment_exchange(&mut self, energy: f64) {
        if energy.abs() > f64::EPSILON && energy.is_finite() {
            self.ledger
                .add_entity(LedgerSubject::Environment, ConservedQuantities::new(0.0, energy));
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A self-contained world for exercising one system at a time.

    use std::sync::Arc;

    use ebb_events::MemorySink;
    use ebb_ledger::ConservationLedger;
    use ebb_store::{EntityStore, SpatialIndex};
    use ebb_types::{Entity, EntityId};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::{Environment, SystemContext};
    use crate::accounting::conserved_quantities;
    use crate::config::ViolationPolicy;
    use crate::system::LawSystem;

    pub struct Harness {
        pub store: EntityStore,
        pub ledger: ConservationLedger,
        pub spatial: SpatialIndex,
        pub environment: Environment,
        pub rng: SmallRng,
        pub sink: Arc<MemorySink>,
        pub tick: u64,
        pub elapsed: f64,
        pub policy: ViolationPolicy,
    }

    impl Harness {
        pub fn new() -> Self {
            let sink = Arc::new(MemorySink::new());
            Self {
                store: EntityStore::new(),
                ledger: ConservationLedger::new(sink.clone()),
                spatial: SpatialIndex::default(),
                environment: Environment {
                    ambient_temperature: 300.0,
                    ..Environment::default()
                },
                rng: SmallRng::seed_from_u64(7),
                sink,
                tick: 0,
                elapsed: 0.0,
                policy: ViolationPolicy::LogOnly,
            }
        }

        pub fn add(&mut self, entity: Entity) -> EntityId {
            let id = entity.id;
            if entity.is_tracked() {
                self.ledger.add_entity(id, conserved_quantities(&entity));
            }
            if let Some(p) = entity.position() {
                self.spatial.insert(id, p);
            }
            let _ = self.store.insert(entity);
            id
        }

        pub fn run(&mut self, system: &mut dyn LawSystem, delta: f64) -> Result<(), crate::LawError> {
            self.tick += 1;
            let sink = self.sink.clone();
            let mut ctx = SystemContext {
                store: &mut self.store,
                ledger: &mut self.ledger,
                spatial: &self.spatial,
                environment: &mut self.environment,
                rng: &mut self.rng,
                sink: sink.as_ref(),
                tick: self.tick,
                elapsed: self.elapsed,
                policy: self.policy,
            };
            let result = system.update(&mut ctx, delta);
            self.elapsed += delta;
            self.spatial.rebuild(self.store.positions());
            result
        }
    }
}
