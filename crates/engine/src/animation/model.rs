use super::clip::AnimationClip;
use super::skeleton::Skeleton;

/// Animated mesh resource as far as the animation core is concerned. Shared
/// between entities through `Arc`; the last holder releases it.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimatedModel {
    pub name: String,
    pub skeleton: Option<Skeleton>,
    pub clips: Vec<AnimationClip>,
}

impl AnimatedModel {
    pub fn new(name: impl Into<String>, skeleton: Option<Skeleton>, clips: Vec<AnimationClip>) -> Self {
        Self {
            name: name.into(),
            skeleton,
            clips,
        }
    }

    pub fn bone_count(&self) -> usize {
        self.skeleton.as_ref().map_or(0, Skeleton::bone_count)
    }

    pub fn clip(&self, index: usize) -> Option<&AnimationClip> {
        self.clips.get(index)
    }

    pub fn clip_index(&self, name: &str) -> Option<usize> {
        self.clips.iter().position(|clip| clip.name == name)
    }
}
