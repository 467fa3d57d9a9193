//! The entity store.
//!
//! Entities live in a `BTreeMap` keyed by [`EntityId`], so every law system
//! iterates them in the same order on every run. Removing an entity retires
//! its id: the store refuses to accept that id again.

use std::collections::{BTreeMap, BTreeSet};

use ebb_types::{DVec3, Entity, EntityId};
use tracing::trace;

/// Errors raised by store mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// An entity with this id is already stored.
    #[error("entity {id} is already in the store")]
    DuplicateId {
        /// The conflicting id.
        id: EntityId,
    },

    /// The id belonged to a removed entity and cannot be reused.
    #[error("entity id {id} was retired and cannot be reused")]
    RetiredId {
        /// The retired id.
        id: EntityId,
    },
}

/// Mutable collection of entities.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    /// Live entities.
    entities: BTreeMap<EntityId, Entity>,
    /// Ids of removed entities. Never pruned: a collaborator may still hold
    /// a copy of a removed entity, and re-adding it would book its mass a
    /// second time. Sixteen bytes per removal.
    retired: BTreeSet<EntityId>,
}

impl EntityStore {
    /// Create an empty store.
    pub const fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            retired: BTreeSet::new(),
        }
    }

    /// Insert an entity under its own id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateId`] if the id is live, or
    /// [`StoreError::RetiredId`] if it was removed earlier.
    pub fn insert(&mut self, entity: Entity) -> Result<&Entity, StoreError> {
        let id = entity.id;
        if self.retired.contains(&id) {
            trace!(%id, "Refusing retired entity id");
            return Err(StoreError::RetiredId { id });
        }
        match self.entities.entry(id) {
            std::collections::btree_map::Entry::Occupied(_) => Err(StoreError::DuplicateId { id }),
            std::collections::btree_map::Entry::Vacant(slot) => Ok(slot.insert(entity)),
        }
    }

    /// Remove an entity and retire its id.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let removed = self.entities.remove(&id)?;
        self.retired.insert(id);
        Some(removed)
    }

    /// Look up an entity.
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Look up an entity for mutation.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Whether a live entity has this id.
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Whether the id belonged to a removed entity.
    pub fn is_retired(&self, id: EntityId) -> bool {
        self.retired.contains(&id)
    }

    /// Number of retired ids.
    pub fn retired_len(&self) -> usize {
        self.retired.len()
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Live entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Live entities in id order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    /// Ids of live entities matching `predicate`, in id order.
    ///
    /// Systems that add or remove entities collect ids first, then mutate.
    pub fn ids_where(&self, mut predicate: impl FnMut(&Entity) -> bool) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| predicate(e))
            .map(|e| e.id)
            .collect()
    }

    /// `(id, position)` for every placed entity.
    pub fn positions(&self) -> impl Iterator<Item = (EntityId, DVec3)> + '_ {
        self.entities
            .values()
            .filter_map(|e| e.position().map(|p| (e.id, p)))
    }
}
