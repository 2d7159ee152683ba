use glam::{Mat4, Quat};

use crate::ecs::{ComponentMask, EcsError, EntityRow, SharedState, System};
use crate::spatial::Transform;

use super::renderable::AnimatedRenderable;

/// Advances every [`AnimatedRenderable`]. Safe to run on worker slices: each
/// row only touches its own components.
#[derive(Debug, Default)]
pub struct SkeletalAnimationSystem;

impl System for SkeletalAnimationSystem {
    fn name(&self) -> &'static str {
        "skeletal_animation"
    }

    fn usage(&self) -> Result<ComponentMask, EcsError> {
        ComponentMask::of::<AnimatedRenderable>()
    }

    fn update_chunk(
        &self,
        rows: &mut [EntityRow<'_>],
        _shared: &SharedState<'_>,
        dt: f32,
    ) -> Result<(), EcsError> {
        for row in rows.iter_mut() {
            let placement = row.get::<Transform>().ok().copied();
            let renderable = row.get_mut::<AnimatedRenderable>()?;
            if let Some(transform) = placement {
                renderable.scene_transform = Mat4::from_rotation_translation(
                    Quat::from_rotation_z(transform.yaw()),
                    transform.position,
                );
            }
            renderable.advance(dt);
        }
        Ok(())
    }
}
