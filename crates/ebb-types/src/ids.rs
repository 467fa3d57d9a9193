//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Every entity in the store has a strongly-typed ID so identifiers cannot be
//! mixed at compile time. All IDs use UUID v7 (time-ordered), which keeps the
//! store's `BTreeMap` iteration close to creation order.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for an entity in the store.
    ///
    /// Stable for the entity's lifetime; once removed, the id is retired and
    /// never inserted again.
    EntityId
}

define_id! {
    /// Identifier shared by every descendant of one founding organism.
    LineageId
}

/// Handle to a rigid body owned by a physics backend.
///
/// Handles are opaque to everything except the backend that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BodyHandle(pub u64);

impl core::fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "body#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let entity = EntityId::new();
        let lineage = LineageId::new();
        assert_ne!(entity.into_inner(), Uuid::nil());
        assert_ne!(lineage.into_inner(), Uuid::nil());
    }

    #[test]
    fn ids_are_unique() {
        let a = EntityId::new();
        let b = EntityId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn id_serializes_as_uuid_string() {
        let id = EntityId::new();
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json, Some(format!("\"{id}\"")));
    }

    #[test]
    fn body_handle_display() {
        assert_eq!(BodyHandle(7).to_string(), "body#7");
    }
}
