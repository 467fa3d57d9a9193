//! Shared type definitions for the Ebb Bloom law engine.
//!
//! This crate is the single source of truth for the entity data model used
//! by the store, the conservation ledger, and every law system.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for entity identifiers, body handles
//! - [`enums`] -- Scale, detail, phase, and ledger vocabulary
//! - [`entity`] -- The [`Entity`] and its optional attribute groups
//! - [`quantities`] -- [`ConservedQuantities`]: mass, energy, charge, momentum
//! - [`schema`] -- Structural validation applied on insert

pub mod entity;
pub mod enums;
pub mod ids;
pub mod quantities;
pub mod schema;

pub use entity::{
    Aggregation, Biological, Chemical, Cultural, Ecological, Entity, Identity, Metabolism,
    Physical, PopulationStats,
};
pub use enums::{AuditOperation, Quantity, Scale, SimulationDetail, StateOfMatter};
pub use glam::DVec3;
pub use ids::{BodyHandle, EntityId, LineageId};
pub use quantities::ConservedQuantities;
pub use schema::SchemaError;
