//! Keyframe interpolation and bone matrix computation.

use glam::{Mat4, Quat, Vec3};

use super::clip::{AnimationClip, Keyframe, NodeTrack};
use super::skeleton::{Skeleton, SkeletonNode};

/// Local translation, rotation and scale of one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalPose {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl LocalPose {
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn to_matrix(self) -> Mat4 {
        Mat4::from_translation(self.translation)
            * Mat4::from_quat(self.rotation)
            * Mat4::from_scale(self.scale)
    }

    pub fn blend(self, end: LocalPose, factor: f32) -> LocalPose {
        LocalPose {
            translation: self.translation.lerp(end.translation, factor),
            rotation: self.rotation.slerp(end.rotation, factor),
            scale: self.scale.lerp(end.scale, factor),
        }
    }
}

/// Pair of keys bracketing `time`: the last key at or before `time` and the
/// factor toward the next one. Past the last key the factor is zero on the
/// last key.
fn bracket<T>(keys: &[Keyframe<T>], time: f32) -> (usize, f32) {
    let last = keys.len() - 1;
    let k = keys
        .iter()
        .rposition(|key| key.time <= time)
        .unwrap_or(0);
    if k >= last {
        return (last, 0.0);
    }
    let span = keys[k + 1].time - keys[k].time;
    let factor = if span > 0.0 {
        ((time - keys[k].time) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (k, factor)
}

fn sample_keys<T: Copy>(
    keys: &[Keyframe<T>],
    time: f32,
    fallback: T,
    interpolate: impl Fn(T, T, f32) -> T,
) -> T {
    match keys.len() {
        0 => fallback,
        1 => keys[0].value,
        _ => {
            let (k, factor) = bracket(keys, time);
            if factor == 0.0 {
                keys[k].value
            } else {
                interpolate(keys[k].value, keys[k + 1].value, factor)
            }
        }
    }
}

pub fn sample_position(keys: &[Keyframe<Vec3>], time: f32, fallback: Vec3) -> Vec3 {
    sample_keys(keys, time, fallback, |a, b, f| a.lerp(b, f))
}

pub fn sample_rotation(keys: &[Keyframe<Quat>], time: f32, fallback: Quat) -> Quat {
    sample_keys(keys, time, fallback, |a, b, f| a.slerp(b, f))
}

pub fn sample_scale(keys: &[Keyframe<Vec3>], time: f32, fallback: Vec3) -> Vec3 {
    sample_keys(keys, time, fallback, |a, b, f| a.lerp(b, f))
}

/// Samples all three channels of `track`. Empty channels fall back to the bind pose.
pub fn sample_track(track: &NodeTrack, time: f32, bind: LocalPose) -> LocalPose {
    LocalPose {
        translation: sample_position(&track.positions, time, bind.translation),
        rotation: sample_rotation(&track.rotations, time, bind.rotation),
        scale: sample_scale(&track.scales, time, bind.scale),
    }
}

/// Local transform of `node`: the clip's track when it has one, otherwise the
/// bind pose.
pub fn node_local(node: &SkeletonNode, clip: &AnimationClip, time: f32) -> Mat4 {
    match clip.track(&node.name) {
        Some(track) => sample_track(track, time, LocalPose::from_matrix(node.bind_local)).to_matrix(),
        None => node.bind_local,
    }
}

fn node_local_pose(node: &SkeletonNode, clip: &AnimationClip, time: f32) -> LocalPose {
    let bind = LocalPose::from_matrix(node.bind_local);
    match clip.track(&node.name) {
        Some(track) => sample_track(track, time, bind),
        None => bind,
    }
}

/// Walks the skeleton from the root with `local_of` supplying each node's
/// local transform, and writes `scene * global * offset` for every bone node.
/// Nodes whose name is not a bone only contribute to their children.
pub fn write_bone_matrices(
    skeleton: &Skeleton,
    scene_transform: Mat4,
    globals: &mut Vec<Mat4>,
    bones: &mut [Mat4],
    local_of: impl Fn(&SkeletonNode) -> Mat4,
) {
    globals.clear();
    for node in skeleton.nodes() {
        let parent = node
            .parent
            .and_then(|index| globals.get(index).copied())
            .unwrap_or(Mat4::IDENTITY);
        let global = parent * local_of(node);
        globals.push(global);

        let Some(bone) = skeleton.bone_index(&node.name) else {
            continue;
        };
        if let (Some(slot), Some(offset)) = (bones.get_mut(bone), skeleton.bone_offset(bone)) {
            *slot = scene_transform * global * offset;
        }
    }
}

/// Bone matrices for a single clip at `time`.
pub fn write_clip_pose(
    skeleton: &Skeleton,
    clip: &AnimationClip,
    time: f32,
    scene_transform: Mat4,
    globals: &mut Vec<Mat4>,
    bones: &mut [Mat4],
) {
    write_bone_matrices(skeleton, scene_transform, globals, bones, |node| {
        node_local(node, clip, time)
    });
}

/// Bone matrices for a cross-fade from `from` at `from_time` to `to` at its
/// first frame, `factor` of the way through.
pub fn write_blended_pose(
    skeleton: &Skeleton,
    from: (&AnimationClip, f32),
    to: &AnimationClip,
    factor: f32,
    scene_transform: Mat4,
    globals: &mut Vec<Mat4>,
    bones: &mut [Mat4],
) {
    let factor = factor.clamp(0.0, 1.0);
    let (from_clip, from_time) = from;
    write_bone_matrices(skeleton, scene_transform, globals, bones, |node| {
        if from_clip.track(&node.name).is_none() && to.track(&node.name).is_none() {
            return node.bind_local;
        }
        let start = node_local_pose(node, from_clip, from_time);
        let end = node_local_pose(node, to, 0.0);
        start.blend(end, factor).to_matrix()
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(values: &[(f32, f32)]) -> Vec<Keyframe<Vec3>> {
        values
            .iter()
            .map(|(time, x)| Keyframe::new(*time, Vec3::new(*x, 0.0, 0.0)))
            .collect()
    }

    #[test]
    fn position_interpolates_between_bracketing_keys() {
        let track = keys(&[(0.0, 0.0), (10.0, 10.0), (20.0, 0.0)]);
        assert_eq!(sample_position(&track, 5.0, Vec3::ZERO).x, 5.0);
        assert_eq!(sample_position(&track, 15.0, Vec3::ZERO).x, 5.0);
        assert_eq!(sample_position(&track, 10.0, Vec3::ZERO).x, 10.0);
    }

    #[test]
    fn time_past_last_key_holds_last_value() {
        let track = keys(&[(0.0, 1.0), (4.0, 3.0)]);
        assert_eq!(sample_position(&track, 9.0, Vec3::ZERO).x, 3.0);
    }

    #[test]
    fn single_and_empty_tracks_use_key_or_fallback() {
        let single = keys(&[(3.0, 7.0)]);
        assert_eq!(sample_position(&single, 0.0, Vec3::ZERO).x, 7.0);
        assert_eq!(sample_position(&[], 0.0, Vec3::ONE), Vec3::ONE);

        let turn = Quat::from_rotation_z(1.0);
        let rotations = [Keyframe::new(0.0, turn)];
        assert_eq!(sample_rotation(&rotations, 5.0, Quat::IDENTITY), turn);
    }

    #[test]
    fn rotation_slerps_halfway() {
        let rotations = [
            Keyframe::new(0.0, Quat::IDENTITY),
            Keyframe::new(2.0, Quat::from_rotation_z(std::f32::consts::FRAC_PI_2)),
        ];
        let halfway = sample_rotation(&rotations, 1.0, Quat::IDENTITY);
        assert!(halfway.abs_diff_eq(Quat::from_rotation_z(std::f32::consts::FRAC_PI_4), 1e-5));
    }

    #[test]
    fn bone_matrix_composes_parent_chain_and_offset() {
        let mut skeleton = Skeleton::new("root", Mat4::from_translation(Vec3::X));
        let arm = skeleton
            .add_node(0, "arm", Mat4::from_translation(Vec3::Y))
            .expect("arm");
        skeleton.add_bone("arm", Mat4::from_translation(-Vec3::Y));
        let clip = AnimationClip::new("idle", 1.0, 1.0);

        let mut globals = Vec::new();
        let mut bones = vec![Mat4::ZERO; skeleton.bone_count()];
        write_clip_pose(&skeleton, &clip, 0.0, Mat4::IDENTITY, &mut globals, &mut bones);

        assert_eq!(globals.len(), skeleton.nodes().len());
        assert!(globals[arm].abs_diff_eq(Mat4::from_translation(Vec3::new(1.0, 1.0, 0.0)), 1e-6));
        assert!(bones[0].abs_diff_eq(Mat4::from_translation(Vec3::X), 1e-6));
    }

    #[test]
    fn unknown_bone_names_are_skipped() {
        let mut skeleton = Skeleton::new("root", Mat4::IDENTITY);
        skeleton.add_node(0, "tail", Mat4::IDENTITY).expect("tail");
        skeleton.add_bone("wing", Mat4::IDENTITY);
        let clip = AnimationClip::new("idle", 1.0, 1.0);

        let mut globals = Vec::new();
        let mut bones = vec![Mat4::ZERO; skeleton.bone_count()];
        write_clip_pose(&skeleton, &clip, 0.0, Mat4::IDENTITY, &mut globals, &mut bones);

        assert_eq!(bones[0], Mat4::ZERO);
    }
}
