use tracing::trace;

use crate::ecs::{Component, ComponentMask, EcsError, Entity, System, World};

use super::components::{Collider, Transform};
use super::quadtree::{QuadTree, QuadTreeConfig};
use super::speed_field::SpeedField;

/// World singleton holding this tick's spatial index.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    tree: QuadTree,
}

impl SceneGraph {
    pub fn new(config: QuadTreeConfig) -> Self {
        Self {
            tree: QuadTree::new(config),
        }
    }

    pub fn tree(&self) -> &QuadTree {
        &self.tree
    }

    pub fn candidates(&self, entity: Entity) -> Vec<Entity> {
        self.tree.candidates(entity)
    }
}

impl Component for SceneGraph {}
impl Component for SpeedField {}

/// Rebuilds the [`SceneGraph`] singleton from every entity with a transform and
/// a collider.
#[derive(Debug, Default)]
pub struct SceneGraphSystem;

impl System for SceneGraphSystem {
    fn name(&self) -> &'static str {
        "scene_graph"
    }

    fn usage(&self) -> Result<ComponentMask, EcsError> {
        ComponentMask::of::<Transform>()?.with::<Collider>()
    }

    fn update(&mut self, world: &mut World, entities: &[Entity], _dt: f32) -> Result<(), EcsError> {
        let mut placed = Vec::with_capacity(entities.len());
        for &entity in entities {
            let transform = world.get_component::<Transform>(entity)?;
            let collider = world.get_component::<Collider>(entity)?;
            placed.push((entity, transform.planar(), collider.radius));
        }

        let graph = world.get_singleton_mut::<SceneGraph>()?;
        graph.tree.clear();
        for (entity, position, radius) in placed {
            graph.tree.insert(entity, position, radius);
        }
        trace!(
            occupants = graph.tree.len(),
            nodes = graph.tree.node_count(),
            "scene_graph_rebuilt"
        );
        Ok(())
    }
}
