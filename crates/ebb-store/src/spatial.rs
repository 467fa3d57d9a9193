//! Octree spatial index over entity positions.
//!
//! The index answers the locality questions law systems and collaborators
//! ask: who is within `r` of this point, who is inside this box, and who are
//! the `k` nearest. The world rebuilds it from the store after every tick
//! and keeps it current for out-of-band adds and removes.
//!
//! # Layout
//!
//! Nodes live in an arena (`Vec<Node>`) and refer to their eight children by
//! index. Entries are held only in leaves. A leaf splits when it exceeds
//! `max_entries_per_node`, unless it is already at `max_depth`, in which
//! case it simply grows.
//!
//! Positions outside the root bounds go to an overflow list that every
//! query scans linearly, so no placed entity is ever invisible.

use std::collections::BTreeMap;

use serde::Deserialize;

use ebb_types::{DVec3, EntityId};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Octree shape parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpatialConfig {
    /// Half the edge length of the root cube, centred on the origin.
    #[serde(default = "default_half_extent")]
    pub half_extent: f64,

    /// Entries a leaf may hold before it splits.
    #[serde(default = "default_max_entries_per_node")]
    pub max_entries_per_node: usize,

    /// Deepest level a leaf may split to.
    #[serde(default = "default_max_depth")]
    pub max_depth: u8,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            half_extent: default_half_extent(),
            max_entries_per_node: default_max_entries_per_node(),
            max_depth: default_max_depth(),
        }
    }
}

const fn default_half_extent() -> f64 {
    10_000.0
}

const fn default_max_entries_per_node() -> usize {
    8
}

const fn default_max_depth() -> u8 {
    8
}

// ---------------------------------------------------------------------------
// Axis-aligned bounding box
// ---------------------------------------------------------------------------

/// Axis-aligned box, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: DVec3,
    /// Maximum corner.
    pub max: DVec3,
}

impl Aabb {
    /// Box from two corners.
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Cube of half-edge `half_extent` around `center`.
    pub fn cube(center: DVec3, half_extent: f64) -> Self {
        let half = DVec3::splat(half_extent);
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Geometric centre.
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Whether `point` lies inside (boundary included).
    pub fn contains(&self, point: DVec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Whether the two boxes overlap.
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    /// Whether a sphere touches the box.
    pub fn intersects_sphere(&self, center: DVec3, radius: f64) -> bool {
        let closest = center.clamp(self.min, self.max);
        closest.distance_squared(center) <= radius * radius
    }

    /// Octant of `point` relative to the centre: bit 0 = x, 1 = y, 2 = z.
    fn octant(&self, point: DVec3) -> usize {
        let c = self.center();
        usize::from(point.x >= c.x) | (usize::from(point.y >= c.y) << 1) | (usize::from(point.z >= c.z) << 2)
    }

    /// Bounds of octant `index`.
    fn octant_bounds(&self, index: usize) -> Self {
        let c = self.center();
        let pick = |bit: usize, lo: f64, mid: f64, hi: f64| {
            if index & bit == 0 { (lo, mid) } else { (mid, hi) }
        };
        let (x0, x1) = pick(1, self.min.x, c.x, self.max.x);
        let (y0, y1) = pick(2, self.min.y, c.y, self.max.y);
        let (z0, z1) = pick(4, self.min.z, c.z, self.max.z);
        Self {
            min: DVec3::new(x0, y0, z0),
            max: DVec3::new(x1, y1, z1),
        }
    }
}

// ---------------------------------------------------------------------------
// Octree
// ---------------------------------------------------------------------------

/// One octree node.
#[derive(Debug, Clone)]
struct Node {
    bounds: Aabb,
    depth: u8,
    entries: Vec<(EntityId, DVec3)>,
    children: Option<[usize; 8]>,
}

impl Node {
    const fn leaf(bounds: Aabb, depth: u8) -> Self {
        Self {
            bounds,
            depth,
            entries: Vec::new(),
            children: None,
        }
    }
}

/// Shape of the tree, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SpatialStatistics {
    /// Indexed entities, overflow included.
    pub total_entities: usize,
    /// Deepest node depth (root = 0).
    pub tree_depth: u8,
    /// Number of nodes in the arena.
    pub nodes_count: usize,
    /// Entities outside the root bounds.
    pub overflow: usize,
}

/// Octree over entity positions.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    config: SpatialConfig,
    nodes: Vec<Node>,
    positions: BTreeMap<EntityId, DVec3>,
    overflow: Vec<EntityId>,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(SpatialConfig::default())
    }
}

impl SpatialIndex {
    /// Create an empty index.
    pub fn new(config: SpatialConfig) -> Self {
        let root = Node::leaf(Aabb::cube(DVec3::ZERO, config.half_extent), 0);
        Self {
            config,
            nodes: vec![root],
            positions: BTreeMap::new(),
            overflow: Vec::new(),
        }
    }

    /// Number of indexed entities.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Indexed position of `id`.
    pub fn position(&self, id: EntityId) -> Option<DVec3> {
        self.positions.get(&id).copied()
    }

    /// Drop every entry and collapse to a single root.
    pub fn clear(&mut self) {
        let root = Node::leaf(Aabb::cube(DVec3::ZERO, self.config.half_extent), 0);
        self.nodes.clear();
        self.nodes.push(root);
        self.positions.clear();
        self.overflow.clear();
    }

    /// Replace the whole index with `entries`.
    pub fn rebuild(&mut self, entries: impl IntoIterator<Item = (EntityId, DVec3)>) {
        self.clear();
        for (id, position) in entries {
            self.insert(id, position);
        }
    }

    /// Index `id` at `position`, moving it if already indexed.
    pub fn insert(&mut self, id: EntityId, position: DVec3) {
        if self.positions.contains_key(&id) {
            self.remove(id);
        }
        if !position.is_finite() {
            return;
        }
        self.positions.insert(id, position);

        let in_bounds = self
            .nodes
            .first()
            .is_some_and(|root| root.bounds.contains(position));
        if !in_bounds {
            self.overflow.push(id);
            return;
        }

        let leaf = self.leaf_for(position);
        let needs_split = self.nodes.get_mut(leaf).is_some_and(|node| {
            node.entries.push((id, position));
            node.entries.len() > self.config.max_entries_per_node
                && node.depth < self.config.max_depth
        });
        if needs_split {
            self.split(leaf);
        }
    }

    /// Remove `id`. Returns its last indexed position.
    pub fn remove(&mut self, id: EntityId) -> Option<DVec3> {
        let position = self.positions.remove(&id)?;
        if let Some(slot) = self.overflow.iter().position(|other| *other == id) {
            self.overflow.swap_remove(slot);
            return Some(position);
        }
        let leaf = self.leaf_for(position);
        if let Some(node) = self.nodes.get_mut(leaf) {
            node.entries.retain(|(other, _)| *other != id);
        }
        Some(position)
    }

    /// Move `id` to `position`.
    pub fn update(&mut self, id: EntityId, position: DVec3) {
        self.insert(id, position);
    }

    /// Ids within `radius` of `center` (distance² ≤ radius²).
    pub fn query_radius(&self, center: DVec3, radius: f64) -> Vec<EntityId> {
        let r2 = radius * radius;
        let mut found = Vec::new();
        let mut stack = vec![0_usize];
        while let Some(index) = stack.pop() {
            let Some(node) = self.nodes.get(index) else {
                continue;
            };
            if !node.bounds.intersects_sphere(center, radius) {
                continue;
            }
            match node.children {
                Some(children) => stack.extend(children),
                None => found.extend(
                    node.entries
                        .iter()
                        .filter(|(_, p)| p.distance_squared(center) <= r2)
                        .map(|(id, _)| *id),
                ),
            }
        }
        found.extend(self.overflow.iter().copied().filter(|id| {
            self.positions
                .get(id)
                .is_some_and(|p| p.distance_squared(center) <= r2)
        }));
        found
    }

    /// Ids inside `bounds`.
    pub fn query_aabb(&self, bounds: &Aabb) -> Vec<EntityId> {
        let mut found = Vec::new();
        let mut stack = vec![0_usize];
        while let Some(index) = stack.pop() {
            let Some(node) = self.nodes.get(index) else {
                continue;
            };
            if !node.bounds.intersects(bounds) {
                continue;
            }
            match node.children {
                Some(children) => stack.extend(children),
                None => found.extend(
                    node.entries
                        .iter()
                        .filter(|(_, p)| bounds.contains(*p))
                        .map(|(id, _)| *id),
                ),
            }
        }
        found.extend(
            self.overflow
                .iter()
                .copied()
                .filter(|id| self.positions.get(id).is_some_and(|p| bounds.contains(*p))),
        );
        found
    }

    /// The `count` ids closest to `position`, nearest first.
    ///
    /// Ties are broken by id so results are deterministic.
    pub fn query_nearest(&self, position: DVec3, count: usize) -> Vec<EntityId> {
        let mut ranked: Vec<(f64, EntityId)> = self
            .positions
            .iter()
            .map(|(id, p)| (p.distance_squared(position), *id))
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        ranked.into_iter().take(count).map(|(_, id)| id).collect()
    }

    /// Tree shape summary.
    pub fn statistics(&self) -> SpatialStatistics {
        SpatialStatistics {
            total_entities: self.positions.len(),
            tree_depth: self.nodes.iter().map(|n| n.depth).max().unwrap_or(0),
            nodes_count: self.nodes.len(),
            overflow: self.overflow.len(),
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Index of the leaf whose bounds hold `position`.
    fn leaf_for(&self, position: DVec3) -> usize {
        let mut index = 0;
        while let Some(node) = self.nodes.get(index) {
            let Some(children) = node.children else {
                break;
            };
            let Some(next) = children.get(node.bounds.octant(position)) else {
                break;
            };
            index = *next;
        }
        index
    }

    /// Turn leaf `index` into an internal node and push its entries down.
    fn split(&mut self, index: usize) {
        let Some(node) = self.nodes.get_mut(index) else {
            return;
        };
        let bounds = node.bounds;
        let depth = node.depth.saturating_add(1);
        let entries = core::mem::take(&mut node.entries);

        let first_child = self.nodes.len();
        let mut children = [0_usize; 8];
        for (octant, slot) in children.iter_mut().enumerate() {
            *slot = first_child.saturating_add(octant);
            self.nodes.push(Node::leaf(bounds.octant_bounds(octant), depth));
        }
        if let Some(node) = self.nodes.get_mut(index) {
            node.children = Some(children);
        }

        for (id, position) in entries {
            let child = self.leaf_for(position);
            let overfull = self.nodes.get_mut(child).is_some_and(|leaf| {
                leaf.entries.push((id, position));
                leaf.entries.len() > self.config.max_entries_per_node
                    && leaf.depth < self.config.max_depth
            });
            if overfull {
                self.split(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn scatter(index: &mut SpatialIndex, n: usize, spread: f64) -> Vec<(EntityId, DVec3)> {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut placed = Vec::new();
        for _ in 0..n {
            let p = DVec3::new(
                rng.random_range(-spread..spread),
                rng.random_range(-spread..spread),
                rng.random_range(-spread..spread),
            );
            let id = EntityId::new();
            index.insert(id, p);
            placed.push((id, p));
        }
        placed
    }

    fn sorted(mut ids: Vec<EntityId>) -> Vec<EntityId> {
        ids.sort();
        ids
    }

    #[test]
    fn radius_query_matches_brute_force() {
        let mut index = SpatialIndex::default();
        let placed = scatter(&mut index, 300, 50.0);
        let center = DVec3::new(5.0, -3.0, 2.0);
        let expected: Vec<EntityId> = placed
            .iter()
            .filter(|(_, p)| p.distance_squared(center) <= 400.0)
            .map(|(id, _)| *id)
            .collect();
        assert_eq!(sorted(index.query_radius(center, 20.0)), sorted(expected));
        assert!(index.statistics().tree_depth > 0);
    }

    #[test]
    fn radius_boundary_is_inclusive() {
        let mut index = SpatialIndex::default();
        let id = EntityId::new();
        index.insert(id, DVec3::new(2.0, 0.0, 0.0));
        assert_eq!(index.query_radius(DVec3::ZERO, 2.0), vec![id]);
        assert!(index.query_radius(DVec3::ZERO, 1.999).is_empty());
    }

    #[test]
    fn aabb_query_matches_brute_force() {
        let mut index = SpatialIndex::default();
        let placed = scatter(&mut index, 200, 30.0);
        let bounds = Aabb::new(DVec3::new(-10.0, -10.0, -10.0), DVec3::new(10.0, 5.0, 20.0));
        let expected: Vec<EntityId> = placed
            .iter()
            .filter(|(_, p)| bounds.contains(*p))
            .map(|(id, _)| *id)
            .collect();
        assert_eq!(sorted(index.query_aabb(&bounds)), sorted(expected));
    }

    #[test]
    fn nearest_is_sorted_by_distance() {
        let mut index = SpatialIndex::default();
        let ids: Vec<EntityId> = (0..5).map(|_| EntityId::new()).collect();
        for (i, id) in ids.iter().enumerate() {
            index.insert(*id, DVec3::new(i as f64 * 10.0, 0.0, 0.0));
        }
        let nearest = index.query_nearest(DVec3::new(21.0, 0.0, 0.0), 3);
        assert_eq!(nearest, vec![ids[2], ids[3], ids[1]]);
        assert_eq!(index.query_nearest(DVec3::ZERO, 50).len(), 5);
    }

    #[test]
    fn remove_and_update() {
        let mut index = SpatialIndex::default();
        let placed = scatter(&mut index, 40, 10.0);
        let (gone, at) = placed[0];
        assert_eq!(index.remove(gone), Some(at));
        assert!(!index.query_radius(at, 0.0).contains(&gone));
        assert_eq!(index.len(), 39);

        let (mover, _) = placed[1];
        index.update(mover, DVec3::new(500.0, 500.0, 500.0));
        assert_eq!(index.query_radius(DVec3::splat(500.0), 1.0), vec![mover]);
        assert_eq!(index.len(), 39);
    }

    #[test]
    fn out_of_bounds_entities_stay_queryable() {
        let mut index = SpatialIndex::new(SpatialConfig {
            half_extent: 10.0,
            ..SpatialConfig::default()
        });
        let id = EntityId::new();
        index.insert(id, DVec3::new(100.0, 0.0, 0.0));
        assert_eq!(index.statistics().overflow, 1);
        assert_eq!(index.query_radius(DVec3::new(99.0, 0.0, 0.0), 2.0), vec![id]);
        assert_eq!(index.query_nearest(DVec3::ZERO, 1), vec![id]);
        assert_eq!(index.remove(id), Some(DVec3::new(100.0, 0.0, 0.0)));
        assert_eq!(index.statistics().overflow, 0);
    }

    #[test]
    fn coincident_points_stop_at_max_depth() {
        let mut index = SpatialIndex::new(SpatialConfig {
            max_depth: 3,
            ..SpatialConfig::default()
        });
        for _ in 0..50 {
            index.insert(EntityId::new(), DVec3::splat(1.0));
        }
        let stats = index.statistics();
        assert_eq!(stats.tree_depth, 3);
        assert_eq!(index.query_radius(DVec3::splat(1.0), 0.0).len(), 50);
    }

    #[test]
    fn rebuild_replaces_contents() {
        let mut index = SpatialIndex::default();
        scatter(&mut index, 30, 10.0);
        let id = EntityId::new();
        index.rebuild([(id, DVec3::ONE)]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.statistics().nodes_count, 1);
        assert_eq!(index.position(id), Some(DVec3::ONE));
    }

    #[test]
    fn config_from_yaml() {
        let config: Option<SpatialConfig> = serde_yml::from_str("max_depth: 4\n").ok();
        assert_eq!(config.as_ref().map(|c| c.max_depth), Some(4));
        assert_eq!(config.map(|c| c.max_entries_per_node), Some(8));
    }
}
