use std::collections::HashMap;

use glam::{Quat, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe<T> {
    pub time: f32,
    pub value: T,
}

impl<T> Keyframe<T> {
    pub fn new(time: f32, value: T) -> Self {
        Self { time, value }
    }
}

/// Keyframes for one node. Each list is sorted by time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeTrack {
    pub positions: Vec<Keyframe<Vec3>>,
    pub rotations: Vec<Keyframe<Quat>>,
    pub scales: Vec<Keyframe<Vec3>>,
}

impl NodeTrack {
    /// Sorts every key list by time.
    pub fn normalize(&mut self) {
        self.positions.sort_by(|a, b| a.time.total_cmp(&b.time));
        self.rotations.sort_by(|a, b| a.time.total_cmp(&b.time));
        self.scales.sort_by(|a, b| a.time.total_cmp(&b.time));
    }
}

/// One named animation. `duration` and key times are in clip ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub ticks_per_second: f32,
    tracks: HashMap<String, NodeTrack>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, duration: f32, ticks_per_second: f32) -> Self {
        Self {
            name: name.into(),
            duration: duration.max(0.0),
            ticks_per_second: if ticks_per_second > 0.0 {
                ticks_per_second
            } else {
                1.0
            },
            tracks: HashMap::new(),
        }
    }

    pub fn with_track(mut self, node: impl Into<String>, track: NodeTrack) -> Self {
        self.insert_track(node, track);
        self
    }

    pub fn insert_track(&mut self, node: impl Into<String>, mut track: NodeTrack) {
        track.normalize();
        self.tracks.insert(node.into(), track);
    }

    pub fn track(&self, node: &str) -> Option<&NodeTrack> {
        self.tracks.get(node)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Wraps `time` into `[0, duration)`; clips without length stay at zero.
    pub fn wrap_time(&self, time: f32) -> f32 {
        if !(self.duration > 0.0 && time.is_finite()) {
            return 0.0;
        }
        let wrapped = time.rem_euclid(self.duration);
        if wrapped >= self.duration {
            0.0
        } else {
            wrapped
        }
    }
}
