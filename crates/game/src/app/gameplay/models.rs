//! Procedural unit rigs shipped with the game.

use std::f32::consts::FRAC_PI_4;

use glam::{Mat4, Quat, Vec3};
use strategos_engine::animation::{AnimatedModel, AnimationClip, Keyframe, NodeTrack, Skeleton};
use strategos_engine::InMemoryModelLoader;

pub(crate) const BUILTIN_MODELS: [&str; 3] = ["hoplite", "archer", "rider"];

/// Loader holding every built-in model. Keys outside [`BUILTIN_MODELS`]
/// report `ResourceNotFound`.
pub(crate) fn builtin_model_loader() -> InMemoryModelLoader {
    let mut loader = InMemoryModelLoader::new();
    for key in BUILTIN_MODELS {
        loader.register(key, biped(key, key == "rider"));
    }
    loader
}

fn biped(name: &str, mounted: bool) -> AnimatedModel {
    let mut skeleton = Skeleton::new("root", Mat4::IDENTITY);
    let attach = if mounted {
        add_bone(&mut skeleton, 0, "mount", Vec3::new(0.0, 0.0, 1.0))
    } else {
        0
    };
    let pelvis = add_bone(&mut skeleton, attach, "pelvis", Vec3::new(0.0, 0.0, 1.0));
    let spine = add_bone(&mut skeleton, pelvis, "spine", Vec3::new(0.0, 0.0, 0.5));
    add_bone(&mut skeleton, spine, "head", Vec3::new(0.0, 0.0, 0.5));
    add_bone(&mut skeleton, spine, "arm_r", Vec3::new(0.3, 0.0, 0.4));
    add_bone(&mut skeleton, pelvis, "leg_l", Vec3::new(-0.15, 0.0, -0.1));
    add_bone(&mut skeleton, pelvis, "leg_r", Vec3::new(0.15, 0.0, -0.1));

    AnimatedModel::new(name, Some(skeleton), vec![idle_clip(), walk_clip(), attack_clip()])
}

/// Adds a node bound at `offset` from its parent and registers it as a bone.
fn add_bone(skeleton: &mut Skeleton, parent: usize, name: &str, offset: Vec3) -> usize {
    let index = skeleton
        .add_node(parent, name, Mat4::from_translation(offset))
        .unwrap_or(parent);
    let global = global_bind(skeleton, index);
    skeleton.add_bone(name, global.inverse());
    index
}

fn global_bind(skeleton: &Skeleton, mut index: usize) -> Mat4 {
    let mut global = Mat4::IDENTITY;
    while let Some(node) = skeleton.node(index) {
        global = node.bind_local * global;
        match node.parent {
            Some(parent) => index = parent,
            None => break,
        }
    }
    global
}

fn swing(offset: Vec3, axis: Vec3, angles: &[(f32, f32)]) -> NodeTrack {
    NodeTrack {
        positions: vec![Keyframe::new(0.0, offset)],
        rotations: angles
            .iter()
            .map(|&(time, angle)| Keyframe::new(time, Quat::from_axis_angle(axis, angle)))
            .collect(),
        scales: Vec::new(),
    }
}

fn idle_clip() -> AnimationClip {
    AnimationClip::new("idle", 48.0, 24.0).with_track(
        "spine",
        NodeTrack {
            positions: vec![
                Keyframe::new(0.0, Vec3::new(0.0, 0.0, 0.5)),
                Keyframe::new(24.0, Vec3::new(0.0, 0.0, 0.52)),
                Keyframe::new(48.0, Vec3::new(0.0, 0.0, 0.5)),
            ],
            rotations: Vec::new(),
            scales: Vec::new(),
        },
    )
}

fn walk_clip() -> AnimationClip {
    let stride = [(0.0, FRAC_PI_4), (12.0, -FRAC_PI_4), (24.0, FRAC_PI_4)];
    let counter = [(0.0, -FRAC_PI_4), (12.0, FRAC_PI_4), (24.0, -FRAC_PI_4)];
    AnimationClip::new("walk", 24.0, 24.0)
        .with_track("leg_l", swing(Vec3::new(-0.15, 0.0, -0.1), Vec3::X, &stride))
        .with_track("leg_r", swing(Vec3::new(0.15, 0.0, -0.1), Vec3::X, &counter))
}

fn attack_clip() -> AnimationClip {
    AnimationClip::new("attack", 18.0, 24.0).with_track(
        "arm_r",
        swing(
            Vec3::new(0.3, 0.0, 0.4),
            Vec3::X,
            &[(0.0, 0.0), (9.0, -2.0 * FRAC_PI_4), (18.0, 0.0)],
        ),
    )
}

#[cfg(test)]
mod tests {
    use strategos_engine::{AssetError, ModelLoader};

    use super::*;

    #[test]
    fn builtin_models_share_one_clip_layout() {
        let loader = builtin_model_loader();
        for key in BUILTIN_MODELS {
            let model = loader.load(key).expect(key);
            assert!(model.clip_index("idle").is_some());
            assert!(model.clip_index("walk").is_some());
            assert!(model.clip_index("attack").is_some());
        }
        let rider = loader.load("rider").expect("rider");
        let hoplite = loader.load("hoplite").expect("hoplite");
        assert_eq!(rider.bone_count(), hoplite.bone_count() + 1);
    }

    #[test]
    fn unknown_model_is_not_found() {
        let error = builtin_model_loader().load("elephant").expect_err("missing");
        assert_eq!(
            error,
            AssetError::ResourceNotFound {
                key: "elephant".to_string()
            }
        );
    }
}
