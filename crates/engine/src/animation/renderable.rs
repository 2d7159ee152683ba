use std::sync::Arc;

use glam::Mat4;

use crate::ecs::Component;

use super::model::AnimatedModel;
use super::sampling::{write_blended_pose, write_clip_pose};

/// Seconds a cross-fade between two clips lasts.
pub const BLEND_DURATION: f32 = 0.2;

/// Per-entity playback state and the bone matrices handed to the renderer.
#[derive(Debug, Clone)]
pub struct AnimatedRenderable {
    model: Arc<AnimatedModel>,
    current_clip: usize,
    previous_clip: Option<usize>,
    animation_time: f32,
    previous_animation_time: f32,
    blend_time: f32,
    pub speed: f32,
    pub scene_transform: Mat4,
    bone_matrices: Vec<Mat4>,
    globals: Vec<Mat4>,
}

impl AnimatedRenderable {
    pub fn new(model: Arc<AnimatedModel>, clip: usize) -> Self {
        let bone_count = model.bone_count();
        let node_count = model
            .skeleton
            .as_ref()
            .map_or(0, |skeleton| skeleton.nodes().len());
        let current_clip = clip.min(model.clips.len().saturating_sub(1));
        Self {
            model,
            current_clip,
            previous_clip: None,
            animation_time: 0.0,
            previous_animation_time: 0.0,
            blend_time: 0.0,
            speed: 1.0,
            scene_transform: Mat4::IDENTITY,
            bone_matrices: vec![Mat4::IDENTITY; bone_count],
            globals: Vec::with_capacity(node_count),
        }
    }

    pub fn model(&self) -> &Arc<AnimatedModel> {
        &self.model
    }

    pub fn current_clip(&self) -> usize {
        self.current_clip
    }

    pub fn previous_clip(&self) -> Option<usize> {
        self.previous_clip
    }

    pub fn animation_time(&self) -> f32 {
        self.animation_time
    }

    pub fn is_blending(&self) -> bool {
        self.previous_clip.is_some()
    }

    /// Progress of the running cross-fade in `[0, 1]`; zero when none is active.
    pub fn blend_factor(&self) -> f32 {
        if self.previous_clip.is_some() {
            (self.blend_time / BLEND_DURATION).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn bone_matrices(&self) -> &[Mat4] {
        &self.bone_matrices
    }

    /// Switches to `clip`, cross-fading from the current pose. Returns false for
    /// an unknown clip; playing the current clip again changes nothing.
    pub fn play(&mut self, clip: usize) -> bool {
        if clip >= self.model.clips.len() {
            return false;
        }
        if clip == self.current_clip && self.previous_clip.is_none() {
            return true;
        }
        // the incoming clip fades in from its first frame, so its own clock
        // restarts here; a clip interrupted mid-fade is held at that frame
        self.previous_clip = Some(self.current_clip);
        self.previous_animation_time = self.animation_time;
        self.animation_time = 0.0;
        self.blend_time = 0.0;
        self.current_clip = clip;
        true
    }

    pub fn play_named(&mut self, name: &str) -> bool {
        match self.model.clip_index(name) {
            Some(index) => self.play(index),
            None => false,
        }
    }

    /// Advances playback by `dt` seconds and recomputes the bone matrices.
    /// Models without a skeleton are left untouched.
    pub fn advance(&mut self, dt: f32) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let model = Arc::clone(&self.model);
        let Some(skeleton) = model.skeleton.as_ref() else {
            return;
        };
        let Some(current) = model.clip(self.current_clip) else {
            return;
        };

        if let Some(previous) = self.previous_clip.and_then(|index| model.clip(index)) {
            self.blend_time += dt;
            write_blended_pose(
                skeleton,
                (previous, self.previous_animation_time),
                current,
                self.blend_factor(),
                self.scene_transform,
                &mut self.globals,
                &mut self.bone_matrices,
            );
            if self.blend_time >= BLEND_DURATION {
                self.previous_clip = None;
                self.blend_time = 0.0;
            }
            return;
        }
        self.previous_clip = None;

        self.animation_time = current
            .wrap_time(self.animation_time + dt * self.speed * current.ticks_per_second);
        write_clip_pose(
            skeleton,
            current,
            self.animation_time,
            self.scene_transform,
            &mut self.globals,
            &mut self.bone_matrices,
        );
    }
}

impl Component for AnimatedRenderable {}
