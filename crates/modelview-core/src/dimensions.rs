//! Bounding box measurement and camera fitting

use glam::Vec3;
use serde::Serialize;

use crate::scene_graph::SceneGraph;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Self::from_point(first), |mut b, p| {
            b.extend(p);
            b
        }))
    }

    pub fn extend(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// Model extent reported in the "Dimensions" folder
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Dimensions {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

/// Suggested camera placement framing the whole model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFit {
    pub position: Vec3,
    pub look_at: Vec3,
}

/// Result of one dimension analysis pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Measurement {
    pub bounds: Option<Aabb>,
    pub dimensions: Dimensions,
    pub camera_fit: Option<CameraFit>,
}

fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}

/// World-space bounding box of every visible node with geometry
pub fn world_bounds(graph: &SceneGraph) -> Option<Aabb> {
    let mut bounds: Option<Aabb> = None;
    for (id, node) in graph.iter() {
        let Some(geometry) = &node.geometry else {
            continue;
        };
        if geometry.positions.is_empty() || !graph.is_visible(id) {
            continue;
        }
        let Some(matrix) = graph.world_matrix(id) else {
            continue;
        };
        let node_bounds =
            Aabb::from_points(geometry.positions.iter().map(|p| matrix.transform_point3(*p)));
        bounds = match (bounds, node_bounds) {
            (Some(a), Some(b)) => Some(a.union(&b)),
            (a, b) => a.or(b),
        };
    }
    bounds
}

/// Camera offset used to frame a box: half the diagonal to the side, a
/// quarter up and one and a half diagonals back
pub fn camera_fit(bounds: &Aabb) -> CameraFit {
    let size = bounds.size().length();
    let center = bounds.center();
    CameraFit {
        position: center + Vec3::new(size / 2.0, size / 4.0, size * 1.5),
        look_at: center,
    }
}

/// Measure a graph: rounded dimensions plus a camera fit
pub fn analyze(graph: &SceneGraph) -> Measurement {
    let Some(bounds) = world_bounds(graph) else {
        return Measurement::default();
    };
    let size = bounds.size();
    Measurement {
        bounds: Some(bounds),
        dimensions: Dimensions {
            width: round2(size.x),
            height: round2(size.y),
            depth: round2(size.z),
        },
        camera_fit: Some(camera_fit(&bounds)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_graph::{Geometry, Node, Transform};

    fn cube(half: f32) -> Geometry {
        let mut positions = Vec::new();
        for x in [-half, half] {
            for y in [-half, half] {
                for z in [-half, half] {
                    positions.push(Vec3::new(x, y, z));
                }
            }
        }
        Geometry::new(positions, None)
    }

    #[test]
    fn test_empty_graph_reports_zero() {
        let mut graph = SceneGraph::new("Scene");
        graph.add_child(graph.root(), Node::new("group")).unwrap();
        let m = analyze(&graph);
        assert_eq!(m.dimensions, Dimensions::default());
        assert!(m.camera_fit.is_none());
    }

    #[test]
    fn test_dimensions_follow_world_transform() {
        let mut graph = SceneGraph::new("Scene");
        let mut t = Transform::from_translation(Vec3::new(5.0, 0.0, 0.0));
        t.scale = Vec3::new(2.0, 1.0, 1.0);
        graph
            .add_child(graph.root(), Node::new("cube").with_transform(t).with_geometry(cube(0.5)))
            .unwrap();

        let m = analyze(&graph);
        assert_eq!(m.dimensions.width, 2.0);
        assert_eq!(m.dimensions.height, 1.0);
        assert_eq!(m.dimensions.depth, 1.0);
        assert_eq!(m.bounds.unwrap().center(), Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_dimensions_round_to_two_places() {
        let mut graph = SceneGraph::new("Scene");
        let geometry = Geometry::new(vec![Vec3::ZERO, Vec3::new(1.23456, 0.004, 0.005)], None);
        graph.add_child(graph.root(), Node::new("m").with_geometry(geometry)).unwrap();
        let d = analyze(&graph).dimensions;
        assert_eq!(d.width, 1.23);
        assert_eq!(d.height, 0.0);
        assert!(d.width >= 0.0 && d.height >= 0.0 && d.depth >= 0.0);
    }

    #[test]
    fn test_hidden_geometry_is_ignored() {
        let mut graph = SceneGraph::new("Scene");
        let mut hidden = Node::new("hidden").with_geometry(cube(10.0));
        hidden.visible = false;
        graph.add_child(graph.root(), hidden).unwrap();
        graph.add_child(graph.root(), Node::new("shown").with_geometry(cube(1.0))).unwrap();
        assert_eq!(analyze(&graph).dimensions.width, 2.0);
    }

    #[test]
    fn test_camera_fit_offsets() {
        let bounds = Aabb {
            min: Vec3::new(-1.0, -1.0, -1.0),
            max: Vec3::new(1.0, 1.0, 1.0),
        };
        let fit = camera_fit(&bounds);
        let size = bounds.size().length();
        assert_eq!(fit.look_at, Vec3::ZERO);
        assert!((fit.position - Vec3::new(size / 2.0, size / 4.0, size * 1.5)).length() < 1e-5);
    }
}
