//! The World façade.
//!
//! A [`World`] owns the entity store and the spatial index and drives a
//! [`LawOrchestrator`]. It is the only mutation surface outside a tick:
//! collaborators add, remove and modify entities through it so the store,
//! the ledger and the spatial index stay in step.
//!
//! Every mutating method takes `&mut self`, so a tick can never overlap an
//! add, a remove or another tick.

use std::sync::Arc;

use ebb_events::EventSink;
use ebb_laws::accounting::conserved_quantities;
use ebb_laws::{BackendLoader, IntegratorLoader, PhysicsStatus};
use ebb_ledger::{AuditEntry, ViolationRecord};
use ebb_store::{EntityStore, SpatialIndex, SpatialStatistics, StoreError};
use ebb_types::{ConservedQuantities, DVec3, Entity, EntityId, SchemaError};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::LawConfig;
use crate::orchestrator::{LawOrchestrator, OrchestratorStatistics, TickReport};

/// Errors from World mutations. None of them leave a partial change behind.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The entity fails schema validation.
    #[error("invalid entity: {0}")]
    Schema(#[from] SchemaError),

    /// The store refused the entity.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// No entity with this id.
    #[error("entity {0} not found")]
    NotFound(EntityId),
}

/// Snapshot of a World for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldStatistics {
    /// Entities in the store.
    pub entity_count: usize,
    /// Ids of removed entities the store still refuses.
    pub retired_ids: usize,
    /// Completed ticks.
    pub ticks: u64,
    /// Simulated seconds.
    pub elapsed: f64,
    /// Octree shape.
    pub spatial: SpatialStatistics,
    /// Orchestrator and ledger state.
    pub orchestrator: OrchestratorStatistics,
}

/// Entities plus the laws that act on them.
pub struct World {
    store: EntityStore,
    spatial: SpatialIndex,
    orchestrator: LawOrchestrator,
    loader: Arc<dyn BackendLoader>,
}

impl World {
    /// A World with the standard law roster and the built-in physics
    /// backend.
    pub fn new(config: &LawConfig, sink: Arc<dyn EventSink>) -> Self {
        Self::with_loader(config, sink, Arc::new(IntegratorLoader))
    }

    /// A World with the standard law roster and a custom physics backend.
    pub fn with_loader(config: &LawConfig, sink: Arc<dyn EventSink>, loader: Arc<dyn BackendLoader>) -> Self {
        let orchestrator = LawOrchestrator::standard(config, sink);
        Self::from_orchestrator(config, orchestrator, loader)
    }

    /// A World around a pre-built orchestrator, e.g. one with a custom
    /// roster.
    pub fn from_orchestrator(config: &LawConfig, orchestrator: LawOrchestrator, loader: Arc<dyn BackendLoader>) -> Self {
        Self {
            store: EntityStore::new(),
            spatial: SpatialIndex::new(config.spatial.clone()),
            orchestrator,
            loader,
        }
    }

    /// Load the physics backend and start the orchestrator.
    pub async fn initialize(&mut self) -> PhysicsStatus {
        let status = self.orchestrator.initialize(self.loader.as_ref()).await;
        self.spatial.rebuild(self.store.positions());
        info!(entities = self.store.len(), "World initialized");
        status
    }

    /// Run one tick of `delta` simulated seconds, then re-index positions.
    ///
    /// Returns `None` when the World is not initialised or `delta` is
    /// negative or non-finite.
    pub fn tick(&mut self, delta: f64) -> Option<TickReport> {
        let report = self.orchestrator.tick(&mut self.store, &self.spatial, delta)?;
        self.spatial.rebuild(self.store.positions());
        Some(report)
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Validate and insert `entity`.
    ///
    /// Entities with mass and position are registered with the ledger;
    /// entities with a position are indexed.
    ///
    /// # Errors
    ///
    /// [`WorldError::Schema`] for an invalid entity, [`WorldError::Store`]
    /// for a duplicate or retired id. Nothing changes on error.
    pub fn add(&mut self, entity: Entity) -> Result<&Entity, WorldError> {
        entity.validate()?;
        let quantities = entity.is_tracked().then(|| conserved_quantities(&entity));
        let position = entity.position();
        let id = entity.id;
        self.store.insert(entity)?;
        if let Some(q) = quantities {
            self.orchestrator.ledger_mut().add_entity(id, q);
        }
        if let Some(p) = position {
            self.spatial.insert(id, p);
        }
        debug!(%id, tracked = quantities.is_some(), "Entity added");
        self.store.get(id).ok_or(WorldError::NotFound(id))
    }

    /// Unregister `id` from the ledger and the index, then remove it.
    ///
    /// # Errors
    ///
    /// [`WorldError::NotFound`] when no such entity exists.
    pub fn remove(&mut self, id: EntityId) -> Result<Entity, WorldError> {
        let entity = self.store.get(id).ok_or(WorldError::NotFound(id))?;
        let quantities = entity.is_tracked().then(|| conserved_quantities(entity));
        if let Some(q) = quantities {
            self.orchestrator.ledger_mut().remove_entity(id, q);
        }
        self.spatial.remove(id);
        let entity = self.store.remove(id).ok_or(WorldError::NotFound(id))?;
        debug!(%id, "Entity removed");
        Ok(entity)
    }

    /// Apply `change` to entity `id` on behalf of a collaborator.
    ///
    /// The change runs on a copy; the result must pass schema validation
    /// and keeps the original id. Conserved quantities are re-registered
    /// and the index updated.
    ///
    /// # Errors
    ///
    /// [`WorldError::NotFound`] for an unknown id, [`WorldError::Schema`]
    /// when the modified entity is invalid (the original is kept).
    pub fn modify(&mut self, id: EntityId, change: impl FnOnce(&mut Entity)) -> Result<&Entity, WorldError> {
        let current = self.store.get_mut(id).ok_or(WorldError::NotFound(id))?;
        let mut updated = current.clone();
        change(&mut updated);
        updated.id = id;
        updated.validate()?;

        let before = current.is_tracked().then(|| conserved_quantities(current));
        let after = updated.is_tracked().then(|| conserved_quantities(&updated));
        let position = updated.position();
        *current = updated;

        if before != after {
            let ledger = self.orchestrator.ledger_mut();
            if let Some(q) = before {
                ledger.remove_entity(id, q);
            }
            if let Some(q) = after {
                ledger.add_entity(id, q);
            }
        }
        match position {
            Some(p) => self.spatial.update(id, p),
            None => {
                self.spatial.remove(id);
            }
        }
        self.store.get(id).ok_or(WorldError::NotFound(id))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Entities within `radius` of `center`, as of the last re-index.
    pub fn query_radius(&self, center: DVec3, radius: f64) -> Vec<&Entity> {
        self.spatial
            .query_radius(center, radius)
            .into_iter()
            .filter_map(|id| self.store.get(id))
            .collect()
    }

    /// Up to `count` entities nearest to `position`, closest first.
    pub fn query_nearest(&self, position: DVec3, count: usize) -> Vec<&Entity> {
        self.spatial
            .query_nearest(position, count)
            .into_iter()
            .filter_map(|id| self.store.get(id))
            .collect()
    }

    /// Entity by id.
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.store.get(id)
    }

    /// All entities in id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.store.iter()
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the World has no entities.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Running conserved totals.
    pub const fn ledger_totals(&self) -> ConservedQuantities {
        self.orchestrator.ledger().totals()
    }

    /// Recorded violations, oldest first.
    pub fn violations(&self) -> Vec<ViolationRecord> {
        self.orchestrator.ledger().violations()
    }

    /// Ledger audit trail, oldest first.
    pub fn audit_trail(&self) -> Vec<AuditEntry> {
        self.orchestrator.ledger().audit_trail()
    }

    /// The orchestrator.
    pub const fn orchestrator(&self) -> &LawOrchestrator {
        &self.orchestrator
    }

    /// Diagnostics snapshot.
    pub fn statistics(&self) -> WorldStatistics {
        let clock = self.orchestrator.clock();
        WorldStatistics {
            entity_count: self.store.len(),
            retired_ids: self.store.retired_len(),
            ticks: clock.tick(),
            elapsed: clock.elapsed(),
            spatial: self.spatial.statistics(),
            orchestrator: self.orchestrator.statistics(),
        }
    }

    /// Tear down physics, clear body handles and the index, and return to
    /// the uninitialised state. Entities and ledger totals are kept.
    pub fn destroy(&mut self) {
        self.orchestrator.destroy(&mut self.store);
        self.spatial.clear();
        info!(entities = self.store.len(), "World destroyed");
    }
}
