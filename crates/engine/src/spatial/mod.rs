//! Map-plane placement, spatial index and terrain speed.

mod collision;
mod components;
mod quadtree;
mod scene_graph;
mod speed_field;

pub use collision::{spheres_collide, Aabb};
pub use components::{Collider, Transform};
pub use quadtree::{QuadTree, QuadTreeConfig, Rect};
pub use scene_graph::{SceneGraph, SceneGraphSystem};
pub use speed_field::{HeightmapParams, SpeedField};
