//! Pointer picking and hover highlighting
//!
//! Every frame the renderer hands over the pointer ray; [`PickResolver`]
//! finds the nearest surface and moves between `Idle` and `Hovering`,
//! swapping the hovered material's emissive color for a highlight and
//! restoring the captured original when hover moves on.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::color::Rgb;
use crate::dimensions::Aabb;
use crate::scene_graph::{NodeId, SceneGraph};

/// Emissive value applied to the hovered mesh
pub const HIGHLIGHT_EMISSIVE: u32 = 0xaaaaaa;

const EPSILON: f32 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Ray through a pointer position in normalized device coordinates
    /// (`[-1, 1]` on both axes, +Y up)
    pub fn from_ndc(ndc: Vec2, camera: &CameraView) -> Self {
        let inverse = camera.view_projection().inverse();
        let unproject = |z: f32| {
            let p = inverse * Vec4::new(ndc.x, ndc.y, z, 1.0);
            p.truncate() / p.w
        };
        // glam's right-handed perspective maps near to 0 and far to 1
        let near = unproject(0.0);
        let far = unproject(1.0);
        Ray::new(near, far - near)
    }

    /// Slab test; returns the entry distance when the box is hit
    pub fn intersect_aabb(&self, aabb: &Aabb) -> Option<f32> {
        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;
        for axis in 0..3 {
            let (o, d) = (self.origin[axis], self.direction[axis]);
            let (lo, hi) = (aabb.min[axis], aabb.max[axis]);
            if d == 0.0 {
                // Parallel to this slab: inside it or never hit
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let (t1, t2) = ((lo - o) / d, (hi - o) / d);
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
        }
        if t_max >= t_min.max(0.0) {
            Some(t_min.max(0.0))
        } else {
            None
        }
    }

    /// Möller–Trumbore, both faces
    pub fn intersect_triangle(&self, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
        let edge1 = b - a;
        let edge2 = c - a;
        let p = self.direction.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = self.origin - a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(edge1);
        let v = self.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = edge2.dot(q) * inv_det;
        (t > EPSILON).then_some(t)
    }
}

/// Perspective camera description used to build pointer rays
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraView {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: 75f32.to_radians(),
            aspect: 1.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl CameraView {
    pub fn view_projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
            * Mat4::look_at_rh(self.eye, self.target, self.up)
    }
}

/// Nearest surface under the pointer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub node: NodeId,
    pub distance: f32,
    pub point: Vec3,
}

/// Intersect `ray` with every visible node that has geometry and return
/// the closest hit. Nodes without geometry are never candidates.
pub fn raycast(graph: &SceneGraph, ray: &Ray) -> Option<Hit> {
    let mut best: Option<Hit> = None;
    for (id, node) in graph.iter() {
        let Some(geometry) = &node.geometry else {
            continue;
        };
        if !graph.is_visible(id) {
            continue;
        }
        let Some(matrix) = graph.world_matrix(id) else {
            continue;
        };
        let world: Vec<Vec3> = geometry
            .positions
            .iter()
            .map(|p| matrix.transform_point3(*p))
            .collect();
        let Some(bounds) = Aabb::from_points(world.iter().copied()) else {
            continue;
        };
        match ray.intersect_aabb(&bounds) {
            Some(t) if best.map_or(true, |b| t <= b.distance) => {}
            _ => continue,
        }

        for [a, b, c] in geometry.triangles() {
            if let Some(t) = ray.intersect_triangle(world[a], world[b], world[c]) {
                if best.map_or(true, |h| t < h.distance) {
                    best = Some(Hit {
                        node: id,
                        distance: t,
                        point: ray.at(t),
                    });
                }
            }
        }
    }
    best
}

/// Per-frame hover state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum HoverState {
    #[default]
    Idle,
    Hovering {
        node: NodeId,
        /// Emissive captured when hover began; `None` when the node has no
        /// material and was not highlighted
        original: Option<Rgb>,
    },
}

/// Hover/selection state machine driven once per frame
#[derive(Debug, Clone)]
pub struct PickResolver {
    state: HoverState,
    highlight: Rgb,
}

impl Default for PickResolver {
    fn default() -> Self {
        Self::new(Rgb::from_hex(HIGHLIGHT_EMISSIVE))
    }
}

impl PickResolver {
    pub fn new(highlight: Rgb) -> Self {
        Self {
            state: HoverState::Idle,
            highlight,
        }
    }

    pub fn state(&self) -> HoverState {
        self.state
    }

    pub fn hovered(&self) -> Option<NodeId> {
        match self.state {
            HoverState::Idle => None,
            HoverState::Hovering { node, .. } => Some(node),
        }
    }

    /// Advance one frame. `ray` is `None` when the pointer is off the
    /// canvas, which counts as no hit.
    pub fn update(&mut self, graph: &mut SceneGraph, ray: Option<&Ray>) -> Option<Hit> {
        let hit = ray.and_then(|r| raycast(graph, r));
        match (self.state, hit) {
            (HoverState::Idle, None) => {}
            (HoverState::Hovering { .. }, None) => {
                self.revert(graph);
            }
            (HoverState::Hovering { node, .. }, Some(h)) if node == h.node => {}
            (_, Some(h)) => {
                self.revert(graph);
                self.begin_hover(graph, h.node);
            }
        }
        hit
    }

    /// Node to commit as the selection when the user clicks
    pub fn click(&self) -> Option<NodeId> {
        self.hovered()
    }

    /// Restore the hovered node's emissive and go idle
    pub fn revert(&mut self, graph: &mut SceneGraph) {
        if let HoverState::Hovering {
            node,
            original: Some(original),
        } = self.state
        {
            if let Some(material) = graph.get_mut(node).and_then(|n| n.material.as_mut()) {
                material.emissive = original;
            }
        }
        self.state = HoverState::Idle;
    }

    /// Forget hover state without touching any material (the graph it
    /// referred to is gone)
    pub fn reset(&mut self) {
        self.state = HoverState::Idle;
    }

    fn begin_hover(&mut self, graph: &mut SceneGraph, node: NodeId) {
        let original = graph
            .get_mut(node)
            .and_then(|n| n.material.as_mut())
            .map(|material| {
                let original = material.emissive;
                material.emissive = self.highlight;
                original
            });
        self.state = HoverState::Hovering { node, original };
    }

    /// Run `f` with the highlight temporarily removed from the graph
    pub fn with_highlight_reverted<R>(
        &mut self,
        graph: &mut SceneGraph,
        f: impl FnOnce(&SceneGraph) -> R,
    ) -> R {
        let hovered = self.hovered();
        self.revert(graph);
        let result = f(graph);
        if let Some(node) = hovered {
            self.begin_hover(graph, node);
        }
        result
    }
}
