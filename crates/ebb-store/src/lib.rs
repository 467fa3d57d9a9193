//! Entity storage and spatial lookup for the Ebb Bloom law engine.
//!
//! - [`store`] -- [`EntityStore`]: id-ordered entity map with permanent id retirement.
//! - [`spatial`] -- [`SpatialIndex`]: octree over entity positions for radius,
//!   box, and nearest-neighbour queries.

pub mod spatial;
pub mod store;

pub use spatial::{Aabb, SpatialConfig, SpatialIndex, SpatialStatistics};
pub use store::{EntityStore, StoreError};
