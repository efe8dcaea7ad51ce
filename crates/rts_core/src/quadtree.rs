//! Spatial index over world-space entity positions (C2, §3/§4.2).
//!
//! Ported from the recursive `QuadTree`/`Rect` pair in
//! `original_source/map/quadtree.py`: a rectangular region holding up to
//! `max_entities` per faction before it subdivides into four children. Unlike
//! [`crate::grid::Sector`] (a fixed coarse grid used for locality scans),
//! this index adapts its depth to local entity density and is the structure
//! queried for enemy-in-range and visible-in-circle lookups.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::math::{Fixed, Vec2Fixed};
use crate::player::FactionId;

/// Default per-faction entity count a leaf holds before it subdivides.
pub const DEFAULT_MAX_ENTITIES: usize = 5;

/// An axis-aligned rectangular region, centered at `(cx, cy)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Center x.
    pub cx: Fixed,
    /// Center y.
    pub cy: Fixed,
    /// Full width.
    pub width: Fixed,
    /// Full height.
    pub height: Fixed,
}

impl Rect {
    /// Construct a rect from its center and full dimensions.
    #[must_use]
    pub const fn new(cx: Fixed, cy: Fixed, width: Fixed, height: Fixed) -> Self {
        Self { cx, cy, width, height }
    }

    fn left(&self) -> Fixed {
        self.cx - self.width / Fixed::from_num(2)
    }

    fn right(&self) -> Fixed {
        self.cx + self.width / Fixed::from_num(2)
    }

    fn top(&self) -> Fixed {
        self.cy - self.height / Fixed::from_num(2)
    }

    fn bottom(&self) -> Fixed {
        self.cy + self.height / Fixed::from_num(2)
    }

    /// True if `point` lies within this rect (inclusive of its edges).
    #[must_use]
    pub fn in_bounds(&self, point: Vec2Fixed) -> bool {
        point.x >= self.left()
            && point.x <= self.right()
            && point.y >= self.top()
            && point.y <= self.bottom()
    }

    /// True if `self` and `other` overlap or touch.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        !(other.left() > self.right()
            || other.right() < self.left()
            || other.top() > self.bottom()
            || other.bottom() < self.top())
    }

    fn quadrant(&self, dx: i32, dy: i32) -> Self {
        let half_w = self.width / Fixed::from_num(2);
        let half_h = self.height / Fixed::from_num(2);
        Self::new(
            self.cx + Fixed::from_num(dx) * half_w / Fixed::from_num(2),
            self.cy + Fixed::from_num(dy) * half_h / Fixed::from_num(2),
            half_w,
            half_h,
        )
    }
}

/// One entry tracked by the quadtree: an entity's id, faction, and current
/// position. The tree itself never reads unit/building fields directly —
/// callers re-insert an entity whenever its position changes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndexedEntity {
    /// The indexed entity.
    pub id: EntityId,
    /// Its faction, used to bucket entries and to filter hostile queries.
    pub faction_id: FactionId,
    /// Its current world-space position.
    pub position: Vec2Fixed,
}

/// Recursive spatial index bucketing entities by faction at each leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuadTree {
    bounds: Rect,
    max_entities: usize,
    entities: HashMap<FactionId, HashMap<EntityId, IndexedEntity>>,
    children: Vec<QuadTree>,
}

impl QuadTree {
    /// Construct an empty quadtree covering `bounds`.
    #[must_use]
    pub fn new(bounds: Rect) -> Self {
        Self::with_max_entities(bounds, DEFAULT_MAX_ENTITIES)
    }

    /// Construct an empty quadtree with a custom per-faction subdivision
    /// threshold (mainly for tests exercising subdivision directly).
    #[must_use]
    pub fn with_max_entities(bounds: Rect, max_entities: usize) -> Self {
        Self {
            bounds,
            max_entities,
            entities: HashMap::new(),
            children: Vec::new(),
        }
    }

    /// True once this node has subdivided.
    #[must_use]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Insert `entity`. Returns `false` if `entity.position` falls outside
    /// this node's bounds (the caller should insert at the tree root only).
    pub fn insert(&mut self, entity: IndexedEntity) -> bool {
        if !self.bounds.in_bounds(entity.position) {
            return false;
        }

        if self.has_children() {
            return self.insert_to_children(entity);
        }

        let bucket = self.entities.entry(entity.faction_id).or_default();
        bucket.insert(entity.id, entity);

        if bucket.len() > self.max_entities {
            self.divide();
        }
        true
    }

    fn insert_to_children(&mut self, entity: IndexedEntity) -> bool {
        for child in &mut self.children {
            if child.insert(entity) {
                return true;
            }
        }
        false
    }

    fn divide(&mut self) {
        let quadrants = [(-1, -1), (1, -1), (-1, 1), (1, 1)];
        self.children = quadrants
            .iter()
            .map(|(dx, dy)| Self::with_max_entities(self.bounds.quadrant(*dx, *dy), self.max_entities))
            .collect();

        let drained: Vec<IndexedEntity> = self
            .entities
            .drain()
            .flat_map(|(_, bucket)| bucket.into_values())
            .collect();
        for entity in drained {
            self.insert_to_children(entity);
        }
    }

    /// Remove `id` (owned by `faction_id`) from wherever it lives in the
    /// tree, collapsing any now-empty subdivisions. Returns `true` if found.
    pub fn remove(&mut self, faction_id: FactionId, id: EntityId) -> bool {
        let removed = if let Some(bucket) = self.entities.get_mut(&faction_id) {
            bucket.remove(&id).is_some()
        } else {
            false
        } || self
            .children
            .iter_mut()
            .any(|child| child.remove(faction_id, id));

        if removed {
            self.collapse();
        }
        removed
    }

    /// Merge child nodes back into this one once their combined population
    /// no longer needs subdivision.
    pub fn collapse(&mut self) {
        if !self.has_children() {
            return;
        }

        for child in &mut self.children {
            child.collapse();
        }

        let total: usize = self.children.iter().map(QuadTree::total_entities).sum();
        if total <= self.max_entities || self.children.iter().all(|c| !c.has_children()) {
            let mergeable = total <= self.max_entities;
            if mergeable {
                let children = std::mem::take(&mut self.children);
                for child in children {
                    for (faction_id, bucket) in child.entities {
                        self.entities.entry(faction_id).or_default().extend(bucket);
                    }
                }
            }
        }
    }

    /// Append every entity in `bounds` whose faction is listed in
    /// `hostile_faction_ids` into `found`. Mirrors the Python original's
    /// `query(hostile_factions_ids, bounds, found_entities)` short-circuit:
    /// nodes that don't intersect `bounds` are skipped entirely.
    pub fn query(&self, hostile_faction_ids: &HashSet<FactionId>, bounds: &Rect, found: &mut Vec<IndexedEntity>) {
        if !self.bounds.intersects(bounds) {
            return;
        }

        for faction_id in hostile_faction_ids {
            if let Some(bucket) = self.entities.get(faction_id) {
                found.extend(bucket.values().filter(|e| bounds.in_bounds(e.position)).copied());
            }
        }

        for child in &self.children {
            child.query(hostile_faction_ids, bounds, found);
        }
    }

    /// Entities of any faction in `hostile_faction_ids` within `radius` of
    /// `(circle_x, circle_y)`. Implemented, per the original, as a bounding
    /// rect query (diameter `2 * radius`) followed by an exact distance
    /// filter.
    #[must_use]
    pub fn find_visible_entities_in_circle(
        &self,
        circle_x: Fixed,
        circle_y: Fixed,
        radius: Fixed,
        hostile_faction_ids: &HashSet<FactionId>,
    ) -> Vec<IndexedEntity> {
        let diameter = radius * Fixed::from_num(2);
        let bounds = Rect::new(circle_x, circle_y, diameter, diameter);
        let mut candidates = Vec::new();
        self.query(hostile_faction_ids, &bounds, &mut candidates);

        let center = Vec2Fixed::new(circle_x, circle_y);
        candidates
            .into_iter()
            .filter(|e| e.position.distance(center) < radius)
            .collect()
    }

    /// Total entities indexed anywhere under this node.
    #[must_use]
    pub fn total_entities(&self) -> usize {
        let own: usize = self.entities.values().map(HashMap::len).sum();
        own + self.children.iter().map(QuadTree::total_entities).sum::<usize>()
    }

    /// Maximum depth of the tree under this node (0 if this node is a leaf).
    #[must_use]
    pub fn total_depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(QuadTree::total_depth)
            .max()
            .unwrap_or(0)
    }

    /// Remove every entity and subdivision, returning the tree to an empty
    /// leaf state.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.children.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn faction(n: u32) -> FactionId {
        FactionId::new(n)
    }

    fn entity(n: u64, faction_id: FactionId, x: i32, y: i32) -> IndexedEntity {
        IndexedEntity {
            id: EntityId::new(n),
            faction_id,
            position: Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y)),
        }
    }

    fn world() -> Rect {
        Rect::new(Fixed::from_num(500), Fixed::from_num(500), Fixed::from_num(1000), Fixed::from_num(1000))
    }

    #[test]
    fn insert_and_query_same_faction_not_returned_as_hostile() {
        let mut tree = QuadTree::new(world());
        tree.insert(entity(1, faction(0), 100, 100));

        let mut hostile = HashSet::new();
        hostile.insert(faction(1));
        let mut found = Vec::new();
        tree.query(&hostile, &world(), &mut found);
        assert!(found.is_empty());
    }

    #[test]
    fn insert_beyond_threshold_subdivides() {
        let mut tree = QuadTree::with_max_entities(world(), 2);
        for i in 0..5 {
            tree.insert(entity(i, faction(0), 10 + i as i32, 10 + i as i32));
        }
        assert!(tree.has_children());
        assert_eq!(tree.total_entities(), 5);
    }

    #[test]
    fn remove_collapses_children() {
        let mut tree = QuadTree::with_max_entities(world(), 1);
        tree.insert(entity(1, faction(0), 10, 10));
        tree.insert(entity(2, faction(0), 900, 900));
        assert!(tree.has_children());

        tree.remove(faction(0), EntityId::new(2));
        assert_eq!(tree.total_entities(), 1);
        assert!(!tree.has_children());
    }

    #[test]
    fn find_visible_entities_in_circle_filters_by_exact_distance() {
        let mut tree = QuadTree::new(world());
        // inside the bounding square but outside the circle's exact radius
        tree.insert(entity(1, faction(1), 520, 520));
        tree.insert(entity(2, faction(1), 505, 500));

        let mut hostile = HashSet::new();
        hostile.insert(faction(1));
        let found = tree.find_visible_entities_in_circle(
            Fixed::from_num(500),
            Fixed::from_num(500),
            Fixed::from_num(20),
            &hostile,
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, EntityId::new(2));
    }

    #[test]
    fn query_skips_non_intersecting_subtrees() {
        let mut tree = QuadTree::with_max_entities(world(), 1);
        tree.insert(entity(1, faction(0), 10, 10));
        tree.insert(entity(2, faction(0), 900, 900));

        let mut hostile = HashSet::new();
        hostile.insert(faction(0));
        let near_origin = Rect::new(Fixed::from_num(10), Fixed::from_num(10), Fixed::from_num(5), Fixed::from_num(5));
        let mut found = Vec::new();
        tree.query(&hostile, &near_origin, &mut found);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, EntityId::new(1));
    }
}
