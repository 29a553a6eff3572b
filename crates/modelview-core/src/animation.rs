//! Keyframe clips and the single-clip playback controller

use glam::{Quat, Vec3};
use tracing::debug;

use crate::scene_graph::{NodeId, SceneGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
    /// Cubic-spline channels are sampled through their keyframe values
    CubicSpline,
}

/// Keyframe values of one animated property
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelValues {
    Translation(Vec<Vec3>),
    Rotation(Vec<Quat>),
    Scale(Vec<Vec3>),
}

impl ChannelValues {
    pub fn len(&self) -> usize {
        match self {
            ChannelValues::Translation(v) | ChannelValues::Scale(v) => v.len(),
            ChannelValues::Rotation(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub target: NodeId,
    pub times: Vec<f32>,
    pub values: ChannelValues,
    pub interpolation: Interpolation,
}

impl Channel {
    /// Keyframe bracket and blend factor for `time`
    fn locate(&self, time: f32) -> Option<(usize, usize, f32)> {
        let last = self.times.len().min(self.values.len()).checked_sub(1)?;
        if time <= self.times[0] {
            return Some((0, 0, 0.0));
        }
        if time >= self.times[last] {
            return Some((last, last, 0.0));
        }
        let next = self.times.partition_point(|t| *t <= time).min(last);
        let prev = next - 1;
        let span = self.times[next] - self.times[prev];
        let factor = if span > 0.0 {
            (time - self.times[prev]) / span
        } else {
            0.0
        };
        match self.interpolation {
            Interpolation::Step => Some((prev, prev, 0.0)),
            _ => Some((prev, next, factor)),
        }
    }

    /// Write the sampled value into the target node's transform
    pub fn apply(&self, graph: &mut SceneGraph, time: f32) {
        let Some((a, b, f)) = self.locate(time) else {
            return;
        };
        let Some(node) = graph.get_mut(self.target) else {
            return;
        };
        let t = &mut node.transform;
        match &self.values {
            ChannelValues::Translation(v) => t.translation = v[a].lerp(v[b], f),
            ChannelValues::Scale(v) => t.scale = v[a].lerp(v[b], f),
            ChannelValues::Rotation(v) => t.rotation = v[a].slerp(v[b], f).normalize(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub channels: Vec<Channel>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, channels: Vec<Channel>) -> Self {
        let duration = channels
            .iter()
            .filter_map(|c| c.times.last().copied())
            .fold(0.0, f32::max);
        Self {
            name: name.into(),
            duration,
            channels,
        }
    }

    pub fn sample(&self, graph: &mut SceneGraph, time: f32) {
        for channel in &self.channels {
            channel.apply(graph, time);
        }
    }
}

/// Playback driver bound to one clip of the current graph
#[derive(Debug, Clone)]
pub struct AnimationMixer {
    clip: AnimationClip,
    elapsed: f32,
    running: bool,
}

impl AnimationMixer {
    pub fn new(clip: AnimationClip) -> Self {
        Self {
            clip,
            elapsed: 0.0,
            running: true,
        }
    }

    pub fn clip(&self) -> &AnimationClip {
        &self.clip
    }

    /// Total time fed to the mixer
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Position inside the clip; playback loops
    pub fn clip_time(&self) -> f32 {
        if self.clip.duration > 0.0 {
            self.elapsed % self.clip.duration
        } else {
            0.0
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn update(&mut self, graph: &mut SceneGraph, delta: f32) {
        if !self.running {
            return;
        }
        self.elapsed += delta.max(0.0);
        let time = self.clip_time();
        self.clip.sample(graph, time);
    }

    pub fn stop_all(&mut self) {
        self.running = false;
    }
}

/// Owns at most one mixer and gates it with the play/pause flag
#[derive(Debug, Clone)]
pub struct AnimationController {
    mixer: Option<AnimationMixer>,
    playing: bool,
}

impl Default for AnimationController {
    fn default() -> Self {
        Self {
            mixer: None,
            playing: true,
        }
    }
}

impl AnimationController {
    /// Bind to the first clip of a freshly loaded model; the previous mixer
    /// is stopped and dropped first
    pub fn attach(&mut self, clips: &[AnimationClip]) {
        self.release();
        if let Some(first) = clips.first() {
            debug!(clip = %first.name, available = clips.len(), "Playing first animation clip");
            self.mixer = Some(AnimationMixer::new(first.clone()));
        }
    }

    pub fn release(&mut self) {
        if let Some(mut mixer) = self.mixer.take() {
            mixer.stop_all();
        }
    }

    pub fn mixer(&self) -> Option<&AnimationMixer> {
        self.mixer.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub fn toggle(&mut self) -> bool {
        self.playing = !self.playing;
        self.playing
    }

    /// Per-frame advance
    pub fn tick(&mut self, graph: &mut SceneGraph, delta: f32) {
        if !self.playing {
            return;
        }
        if let Some(mixer) = self.mixer.as_mut() {
            mixer.update(graph, delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_graph::Node;

    fn setup() -> (SceneGraph, NodeId, Vec<AnimationClip>) {
        let mut graph = SceneGraph::new("Scene");
        let node = graph.add_child(graph.root(), Node::new("box")).unwrap();
        let slide = AnimationClip::new(
            "slide",
            vec![Channel {
                target: node,
                times: vec![0.0, 2.0],
                values: ChannelValues::Translation(vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)]),
                interpolation: Interpolation::Linear,
            }],
        );
        let lift = AnimationClip::new(
            "lift",
            vec![Channel {
                target: node,
                times: vec![0.0, 1.0],
                values: ChannelValues::Translation(vec![Vec3::ZERO, Vec3::new(0.0, 99.0, 0.0)]),
                interpolation: Interpolation::Linear,
            }],
        );
        (graph, node, vec![slide, lift])
    }

    #[test]
    fn test_paused_controller_does_not_advance() {
        let (mut graph, _, clips) = setup();
        let mut controller = AnimationController::default();
        controller.attach(&clips);
        controller.set_playing(false);
        for _ in 0..10 {
            controller.tick(&mut graph, 0.1);
        }
        assert_eq!(controller.mixer().unwrap().elapsed(), 0.0);
    }

    #[test]
    fn test_playing_controller_accumulates_deltas() {
        let (mut graph, node, clips) = setup();
        let mut controller = AnimationController::default();
        controller.attach(&clips);

        let mut last = 0.0;
        for delta in [0.25, 0.5, 0.25] {
            controller.tick(&mut graph, delta);
            let elapsed = controller.mixer().unwrap().elapsed();
            assert!(elapsed >= last);
            last = elapsed;
        }
        assert_eq!(last, 1.0);
        let t = graph.get(node).unwrap().transform.translation;
        assert!((t - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_toggle_only_gates_future_ticks() {
        let (mut graph, _, clips) = setup();
        let mut controller = AnimationController::default();
        controller.attach(&clips);
        controller.tick(&mut graph, 0.5);
        assert!(!controller.toggle());
        controller.tick(&mut graph, 0.5);
        assert_eq!(controller.mixer().unwrap().elapsed(), 0.5);
        assert!(controller.toggle());
        controller.tick(&mut graph, 0.5);
        assert_eq!(controller.mixer().unwrap().elapsed(), 1.0);
    }

    #[test]
    fn test_only_first_clip_is_bound() {
        let (_, _, clips) = setup();
        let mut controller = AnimationController::default();
        controller.attach(&clips);
        assert_eq!(controller.mixer().unwrap().clip().name, "slide");

        controller.attach(&[]);
        assert!(controller.mixer().is_none());
    }

    #[test]
    fn test_clip_time_loops() {
        let (mut graph, _, clips) = setup();
        let mut mixer = AnimationMixer::new(clips[0].clone());
        mixer.update(&mut graph, 2.5);
        assert!((mixer.clip_time() - 0.5).abs() < 1e-6);
        mixer.stop_all();
        mixer.update(&mut graph, 1.0);
        assert_eq!(mixer.elapsed(), 2.5);
    }

    #[test]
    fn test_step_interpolation_holds_value() {
        let (mut graph, node, _) = setup();
        let channel = Channel {
            target: node,
            times: vec![0.0, 1.0],
            values: ChannelValues::Scale(vec![Vec3::ONE, Vec3::splat(3.0)]),
            interpolation: Interpolation::Step,
        };
        channel.apply(&mut graph, 0.9);
        assert_eq!(graph.get(node).unwrap().transform.scale, Vec3::ONE);
        channel.apply(&mut graph, 1.0);
        assert_eq!(graph.get(node).unwrap().transform.scale, Vec3::splat(3.0));
    }
}
