//! Quadtree over the map plane, rebuilt from scratch every tick.

use std::collections::HashMap;

use glam::Vec2;

use crate::ecs::Entity;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn around(center: Vec2, half_extent: f32) -> Self {
        Self::new(center - Vec2::splat(half_extent), center + Vec2::splat(half_extent))
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    fn quadrant(&self, index: usize) -> Rect {
        let center = self.center();
        let (x_range, y_range) = match index {
            0 => ((self.min.x, center.x), (self.min.y, center.y)),
            1 => ((center.x, self.max.x), (self.min.y, center.y)),
            2 => ((self.min.x, center.x), (center.y, self.max.y)),
            _ => ((center.x, self.max.x), (center.y, self.max.y)),
        };
        Rect::new(
            Vec2::new(x_range.0, y_range.0),
            Vec2::new(x_range.1, y_range.1),
        )
    }

    /// Child index for `point`; points on the centre lines go right/up.
    fn quadrant_of(&self, point: Vec2) -> usize {
        let center = self.center();
        usize::from(point.x >= center.x) + 2 * usize::from(point.y >= center.y)
    }
}

#[derive(Debug, Clone)]
pub struct QuadTreeConfig {
    pub bounds: Rect,
    /// Occupants a leaf holds before it splits.
    pub capacity: usize,
    /// Leaves whose shorter side is at or below this never split.
    pub min_size: f32,
}

impl Default for QuadTreeConfig {
    fn default() -> Self {
        Self {
            bounds: Rect::new(Vec2::splat(-512.0), Vec2::splat(512.0)),
            capacity: 8,
            min_size: 8.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Occupant {
    entity: Entity,
    position: Vec2,
    radius: f32,
}

#[derive(Debug, Clone)]
struct QuadNode {
    bounds: Rect,
    occupants: Vec<Occupant>,
    children: Option<[usize; 4]>,
}

impl QuadNode {
    fn leaf(bounds: Rect) -> Self {
        Self {
            bounds,
            occupants: Vec::new(),
            children: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuadTree {
    config: QuadTreeConfig,
    nodes: Vec<QuadNode>,
    occupants: HashMap<Entity, Occupant>,
    max_radius: f32,
}

impl QuadTree {
    pub fn new(config: QuadTreeConfig) -> Self {
        let root = QuadNode::leaf(config.bounds);
        Self {
            config,
            nodes: vec![root],
            occupants: HashMap::new(),
            max_radius: 0.0,
        }
    }

    pub fn bounds(&self) -> Rect {
        self.config.bounds
    }

    pub fn len(&self) -> usize {
        self.occupants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.children.is_none())
            .count()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.occupants.contains_key(&entity)
    }

    /// Drops every occupant and collapses the tree back to its root.
    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        if let Some(root) = self.nodes.first_mut() {
            root.occupants.clear();
            root.children = None;
        }
        self.occupants.clear();
        self.max_radius = 0.0;
    }

    /// Inserts `entity` at `position`. Positions outside the bounds are clamped
    /// to the border. Re-inserting an entity in the same build is ignored.
    pub fn insert(&mut self, entity: Entity, position: Vec2, radius: f32) {
        if self.occupants.contains_key(&entity) {
            return;
        }
        let bounds = self.config.bounds;
        let occupant = Occupant {
            entity,
            position: position.clamp(bounds.min, bounds.max),
            radius: radius.max(0.0),
        };
        self.occupants.insert(entity, occupant);
        self.max_radius = self.max_radius.max(occupant.radius);

        let leaf = self.leaf_for(occupant.position);
        self.nodes[leaf].occupants.push(occupant);
        let mut pending = vec![leaf];
        while let Some(index) = pending.pop() {
            if self.should_split(index) {
                pending.extend(self.split(index));
            }
        }
    }

    /// Entities in every leaf that could hold something touching `entity`,
    /// excluding `entity` itself. The search square is widened by the largest
    /// radius in the tree so a touching neighbour across a leaf border is
    /// always returned. Empty when `entity` was not inserted this build.
    pub fn candidates(&self, entity: Entity) -> Vec<Entity> {
        let Some(occupant) = self.occupants.get(&entity) else {
            return Vec::new();
        };
        let area = Rect::around(occupant.position, occupant.radius + self.max_radius);
        let mut found = self.query_rect(&area);
        found.retain(|other| *other != entity);
        found
    }

    /// Occupants of every leaf overlapping `area`.
    pub fn query_rect(&self, area: &Rect) -> Vec<Entity> {
        let mut found = Vec::new();
        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !node.bounds.intersects(area) {
                continue;
            }
            match node.children {
                Some(children) => stack.extend(children),
                None => found.extend(node.occupants.iter().map(|occupant| occupant.entity)),
            }
        }
        found
    }

    fn leaf_for(&self, position: Vec2) -> usize {
        let mut index = 0;
        while let Some(children) = self.nodes[index].children {
            index = children[self.nodes[index].bounds.quadrant_of(position)];
        }
        index
    }

    fn should_split(&self, index: usize) -> bool {
        let node = &self.nodes[index];
        let size = node.bounds.size();
        node.occupants.len() > self.config.capacity && size.x.min(size.y) > self.config.min_size
    }

    fn split(&mut self, index: usize) -> [usize; 4] {
        let bounds = self.nodes[index].bounds;
        let first_child = self.nodes.len();
        for quadrant in 0..4 {
            self.nodes.push(QuadNode::leaf(bounds.quadrant(quadrant)));
        }
        let children = [first_child, first_child + 1, first_child + 2, first_child + 3];
        self.nodes[index].children = Some(children);

        let occupants = std::mem::take(&mut self.nodes[index].occupants);
        for occupant in occupants {
            let child = children[bounds.quadrant_of(occupant.position)];
            self.nodes[child].occupants.push(occupant);
        }
        children
    }
}

impl Default for QuadTree {
    fn default() -> Self {
        Self::new(QuadTreeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_tree() -> QuadTree {
        QuadTree::new(QuadTreeConfig {
            bounds: Rect::new(Vec2::ZERO, Vec2::splat(100.0)),
            capacity: 2,
            min_size: 10.0,
        })
    }

    #[test]
    fn overflow_splits_leaf_and_redistributes() {
        let mut tree = small_tree();
        tree.insert(Entity(1), Vec2::new(10.0, 10.0), 1.0);
        tree.insert(Entity(2), Vec2::new(90.0, 10.0), 1.0);
        assert_eq!(tree.node_count(), 1);

        tree.insert(Entity(3), Vec2::new(90.0, 90.0), 1.0);

        assert_eq!(tree.node_count(), 5);
        assert_eq!(tree.leaf_count(), 4);
        assert!(tree.candidates(Entity(1)).is_empty());
    }

    #[test]
    fn candidates_share_leaf_and_exclude_self() {
        let mut tree = small_tree();
        tree.insert(Entity(1), Vec2::new(10.0, 10.0), 1.0);
        tree.insert(Entity(2), Vec2::new(12.0, 12.0), 1.0);
        tree.insert(Entity(3), Vec2::new(90.0, 90.0), 1.0);

        let near = tree.candidates(Entity(1));
        assert_eq!(near, vec![Entity(2)]);
        assert!(!tree.candidates(Entity(3)).contains(&Entity(1)));
    }

    #[test]
    fn candidates_cover_neighbouring_leaf_across_boundary() {
        let mut tree = small_tree();
        tree.insert(Entity(1), Vec2::new(49.0, 20.0), 2.0);
        tree.insert(Entity(2), Vec2::new(51.0, 20.0), 2.0);
        tree.insert(Entity(3), Vec2::new(90.0, 90.0), 1.0);
        tree.insert(Entity(4), Vec2::new(10.0, 90.0), 1.0);

        assert!(tree.leaf_count() > 1);
        assert!(tree.candidates(Entity(1)).contains(&Entity(2)));
    }

    #[test]
    fn candidates_reach_touching_neighbour_outside_own_square() {
        let mut tree = QuadTree::new(QuadTreeConfig {
            bounds: Rect::new(Vec2::ZERO, Vec2::splat(100.0)),
            capacity: 1,
            min_size: 1.0,
        });
        tree.insert(Entity(1), Vec2::new(49.45, 50.0), 0.5);
        tree.insert(Entity(2), Vec2::new(50.05, 50.0), 0.5);

        assert!(tree.leaf_count() > 1);
        assert!(tree.candidates(Entity(1)).contains(&Entity(2)));
        assert!(tree.candidates(Entity(2)).contains(&Entity(1)));
    }

    #[test]
    fn crowded_children_split_again_in_the_same_insert() {
        let mut tree = small_tree();
        tree.insert(Entity(1), Vec2::new(1.0, 1.0), 0.1);
        tree.insert(Entity(2), Vec2::new(2.0, 2.0), 0.1);
        tree.insert(Entity(3), Vec2::new(3.0, 3.0), 0.1);

        let crowded = tree
            .nodes
            .iter()
            .filter(|node| node.children.is_none())
            .filter(|node| {
                let size = node.bounds.size();
                node.occupants.len() > 2 && size.x.min(size.y) > 10.0
            })
            .count();
        assert_eq!(crowded, 0);
        assert!(tree.node_count() > 5);
    }

    #[test]
    fn min_size_stops_subdivision() {
        let mut tree = QuadTree::new(QuadTreeConfig {
            bounds: Rect::new(Vec2::ZERO, Vec2::splat(8.0)),
            capacity: 1,
            min_size: 8.0,
        });
        for id in 1..=5 {
            tree.insert(Entity(id), Vec2::splat(4.0), 0.5);
        }
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.candidates(Entity(1)).len(), 4);
    }

    #[test]
    fn clear_resets_to_single_empty_root() {
        let mut tree = small_tree();
        for id in 1..=10 {
            tree.insert(Entity(id), Vec2::splat(id as f32 * 9.0), 1.0);
        }
        tree.clear();

        assert!(tree.is_empty());
        assert_eq!(tree.node_count(), 1);
        assert!(tree.candidates(Entity(1)).is_empty());
    }

    #[test]
    fn out_of_bounds_positions_are_clamped() {
        let mut tree = small_tree();
        tree.insert(Entity(1), Vec2::new(-50.0, 500.0), 1.0);
        tree.insert(Entity(2), Vec2::new(0.5, 99.5), 1.0);
        assert_eq!(tree.candidates(Entity(1)), vec![Entity(2)]);
    }
}
