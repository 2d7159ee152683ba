//! Skeletal animation: keyframe sampling, bone matrices and cross-fades.

mod clip;
mod model;
mod renderable;
mod sampling;
mod skeleton;
mod system;

pub use clip::{AnimationClip, Keyframe, NodeTrack};
pub use model::AnimatedModel;
pub use renderable::{AnimatedRenderable, BLEND_DURATION};
pub use sampling::{
    sample_position, sample_rotation, sample_scale, sample_track, write_blended_pose,
    write_bone_matrices, write_clip_pose, LocalPose,
};
pub use skeleton::{Skeleton, SkeletonNode};
pub use system::SkeletalAnimationSystem;
