use glam::{Vec2, Vec3};

use crate::ecs::Component;

/// World placement. The map lies on the XY plane; `rotation` holds Euler angles
/// in radians with yaw in `z`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Vec3::ZERO,
        }
    }

    pub fn planar(&self) -> Vec2 {
        self.position.truncate()
    }

    pub fn yaw(&self) -> f32 {
        self.rotation.z
    }

    /// Unit heading on the map plane for the current yaw.
    pub fn forward(&self) -> Vec2 {
        let yaw = self.yaw();
        Vec2::new(-yaw.sin(), yaw.cos())
    }
}

impl Component for Transform {}

/// Bounding sphere used for collision and scene graph insertion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collider {
    pub radius: f32,
}

impl Component for Collider {}
