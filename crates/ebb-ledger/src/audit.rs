//! The audit trail: a bounded, append-only record of ledger operations.
//!
//! The trail is diagnostic. Totals are the source of truth; when the ring is
//! full the oldest entry is dropped.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ebb_types::{AuditOperation, ConservedQuantities, EntityId};

/// Who an audit entry is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum LedgerSubject {
    /// A store entity.
    Entity(EntityId),
    /// Energy and momentum injected into an entity by rigid-body physics.
    /// Carries no mass.
    Impulse(EntityId),
    /// Heat exchanged with the world outside the simulation (radiation to
    /// space, stellar heating). Carries no mass.
    Environment,
}

impl LedgerSubject {
    /// The entity the subject refers to, if any.
    pub const fn entity(self) -> Option<EntityId> {
        match self {
            Self::Entity(id) | Self::Impulse(id) => Some(id),
            Self::Environment => None,
        }
    }
}

impl From<EntityId> for LedgerSubject {
    fn from(id: EntityId) -> Self {
        Self::Entity(id)
    }
}

impl core::fmt::Display for LedgerSubject {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Entity(id) => write!(f, "{id}"),
            Self::Impulse(id) => write!(f, "{id}_impulse"),
            Self::Environment => f.write_str("environment"),
        }
    }
}

/// One ledger operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic operation number since the last reset.
    pub sequence: u64,
    /// Wall-clock time of the operation.
    pub timestamp: DateTime<Utc>,
    /// What kind of operation this was.
    pub operation: AuditOperation,
    /// Entities involved, inputs first.
    pub subjects: Vec<LedgerSubject>,
    /// Totals before the operation.
    pub before: ConservedQuantities,
    /// Totals after the operation. Equal to `before` for validations.
    pub after: ConservedQuantities,
    /// Quantity applied (add/remove) or proposed (output minus input).
    pub delta: ConservedQuantities,
}

/// A FIFO ring with a fixed capacity.
#[derive(Debug, Clone, Default)]
pub struct BoundedLog<T> {
    /// Retained items, oldest first.
    items: VecDeque<T>,
    /// Maximum retained items.
    capacity: usize,
    /// Items evicted since creation or the last clear.
    dropped: u64,
}

impl<T> BoundedLog<T> {
    /// Create an empty log holding at most `capacity` items.
    pub const fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
            dropped: 0,
        }
    }

    /// Append an item, evicting the oldest if full.
    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            self.dropped = self.dropped.saturating_add(1);
            return;
        }
        while self.items.len() >= self.capacity {
            self.items.pop_front();
            self.dropped = self.dropped.saturating_add(1);
        }
        self.items.push_back(item);
    }

    /// Retained items, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Number of retained items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum retained items.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items evicted so far.
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Remove every item and reset the eviction counter.
    pub fn clear(&mut self) {
        self.items.clear();
        self.dropped = 0;
    }
}

impl<T: Clone> BoundedLog<T> {
    /// Owned copy of the retained items.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_drops_oldest_first() {
        let mut log = BoundedLog::new(3);
        for i in 0..5 {
            log.push(i);
        }
        assert_eq!(log.to_vec(), vec![2, 3, 4]);
        assert_eq!(log.dropped(), 2);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut log = BoundedLog::new(0);
        log.push("a");
        assert!(log.is_empty());
        assert_eq!(log.dropped(), 1);
    }

    #[test]
    fn clear_resets() {
        let mut log = BoundedLog::new(1);
        log.push(1);
        log.push(2);
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.dropped(), 0);
    }

    #[test]
    fn impulse_subject_display() {
        let id = EntityId::new();
        assert_eq!(LedgerSubject::Impulse(id).to_string(), format!("{id}_impulse"));
        assert_eq!(LedgerSubject::from(id).entity(), Some(id));
        assert_eq!(LedgerSubject::Environment.entity(), None);
    }
}
