//! Scene graph owned by the current model slot
//!
//! Nodes live in a generational arena. A [`NodeId`] carries the identity of
//! the graph it was issued by plus the slot generation, so handles held by
//! hover/selection state stop resolving once their node is removed or the
//! whole graph is replaced.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::color::Rgb;

static NEXT_GRAPH_ID: AtomicU32 = AtomicU32::new(1);

/// Weak handle to a node in a [`SceneGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    graph: u32,
    index: u32,
    generation: u32,
}

impl NodeId {
    /// Arena slot index, stable for the lifetime of the node
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// Local transform (translation, rotation, scale)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Triangle geometry in node-local space
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    pub positions: Vec<Vec3>,
    pub normals: Option<Vec<Vec3>>,
    pub indices: Option<Vec<u32>>,
}

impl Geometry {
    pub fn new(positions: Vec<Vec3>, indices: Option<Vec<u32>>) -> Self {
        Self {
            positions,
            normals: None,
            indices,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Vertex index triples; index-less geometry is read as consecutive triples
    pub fn triangles(&self) -> Vec<[usize; 3]> {
        match &self.indices {
            Some(indices) => indices
                .chunks_exact(3)
                .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
                .filter(|t| t.iter().all(|&i| i < self.positions.len()))
                .collect(),
            None => (0..self.positions.len() / 3)
                .map(|i| [i * 3, i * 3 + 1, i * 3 + 2])
                .collect(),
        }
    }
}

/// Surface material of a renderable node
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub color: Rgb,
    pub wireframe: bool,
    pub transparent: bool,
    pub opacity: f32,
    pub depth_write: bool,
    pub emissive: Rgb,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: Rgb::WHITE,
            wireframe: false,
            transparent: false,
            opacity: 1.0,
            depth_write: true,
            emissive: Rgb::BLACK,
        }
    }
}

impl Material {
    /// Set opacity; anything below 1 renders transparent without depth writes
    pub fn set_opacity(&mut self, opacity: f32) {
        let opacity = opacity.clamp(0.0, 1.0);
        self.opacity = opacity;
        self.transparent = opacity < 1.0;
        self.depth_write = opacity >= 1.0;
    }
}

#[derive(Debug, Clone, Default)]
pub struct Node {
    pub name: String,
    pub visible: bool,
    pub transform: Transform,
    pub geometry: Option<Geometry>,
    pub material: Option<Material>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visible: true,
            ..Default::default()
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = Some(material);
        self
    }

    /// Display label, falling back to "Unnamed"
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            "Unnamed"
        } else {
            &self.name
        }
    }

    pub fn is_mesh(&self) -> bool {
        self.geometry.is_some()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Tree of nodes rooted at the model
#[derive(Debug, Clone)]
pub struct SceneGraph {
    id: u32,
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    revision: u64,
}

impl SceneGraph {
    pub fn new(root_name: impl Into<String>) -> Self {
        let id = NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed);
        let root = NodeId {
            graph: id,
            index: 0,
            generation: 0,
        };
        Self {
            id,
            slots: vec![Slot {
                generation: 0,
                node: Some(Node::new(root_name)),
            }],
            free: Vec::new(),
            root,
            revision: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Bumped on every mutable access; renderers resync when it moves
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Number of live nodes, root included
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if id.graph != self.id {
            return None;
        }
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if id.graph != self.id {
            return None;
        }
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation || slot.node.is_none() {
            return None;
        }
        self.revision = self.revision.wrapping_add(1);
        slot.node.as_mut()
    }

    /// Attach `node` as the last child of `parent`
    pub fn add_child(&mut self, parent: NodeId, mut node: Node) -> Option<NodeId> {
        if !self.contains(parent) {
            return None;
        }
        node.parent = Some(parent);
        node.children.clear();

        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    graph: self.id,
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    graph: self.id,
                    index,
                    generation: 0,
                }
            }
        };

        if let Some(p) = self.get_mut(parent) {
            p.children.push(id);
        }
        Some(id)
    }

    /// Remove a node and its whole subtree. The root cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id == self.root {
            return false;
        }
        let Some(parent) = self.get(id).map(|n| n.parent) else {
            return false;
        };
        if let Some(parent) = parent.and_then(|p| self.get_mut(p)) {
            parent.children.retain(|c| *c != id);
        }

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let slot = &mut self.slots[current.index as usize];
            if let Some(node) = slot.node.take() {
                stack.extend(node.children);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(current.index);
            }
        }
        self.touch();
        true
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Model-space matrix of a node (product of its ancestors' transforms)
    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut node = self.get(id)?;
        let mut matrix = node.transform.matrix();
        while let Some(parent) = node.parent.and_then(|p| self.get(p)) {
            matrix = parent.transform.matrix() * matrix;
            node = parent;
        }
        Some(matrix)
    }

    /// A node is effectively visible when it and all its ancestors are
    pub fn is_visible(&self, id: NodeId) -> bool {
        let mut current = self.get(id);
        while let Some(node) = current {
            if !node.visible {
                return false;
            }
            current = node.parent.and_then(|p| self.get(p));
        }
        true
    }

    /// All live nodes in arena order
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        let graph = self.id;
        self.slots.iter().enumerate().filter_map(move |(index, slot)| {
            slot.node.as_ref().map(|node| {
                (
                    NodeId {
                        graph,
                        index: index as u32,
                        generation: slot.generation,
                    },
                    node,
                )
            })
        })
    }

    /// Ids of every node carrying geometry
    pub fn mesh_ids(&self) -> Vec<NodeId> {
        self.iter()
            .filter(|(_, node)| node.is_mesh())
            .map(|(id, _)| id)
            .collect()
    }

    /// First node with the given name
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.iter().find(|(_, n)| n.name == name).map(|(id, _)| id)
    }

    /// Apply `f` to every material in the graph
    pub fn for_each_material(&mut self, mut f: impl FnMut(&mut Material)) {
        self.touch();
        for slot in &mut self.slots {
            if let Some(material) = slot.node.as_mut().and_then(|n| n.material.as_mut()) {
                f(material);
            }
        }
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_lookup() {
        let mut graph = SceneGraph::new("Scene");
        let root = graph.root();
        let a = graph.add_child(root, Node::new("a")).unwrap();
        let b = graph.add_child(a, Node::new("")).unwrap();

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.children(root), &[a]);
        assert_eq!(graph.get(b).unwrap().parent(), Some(a));
        assert_eq!(graph.get(b).unwrap().label(), "Unnamed");
    }

    #[test]
    fn test_removed_handles_do_not_resolve() {
        let mut graph = SceneGraph::new("Scene");
        let root = graph.root();
        let a = graph.add_child(root, Node::new("a")).unwrap();
        let b = graph.add_child(a, Node::new("b")).unwrap();

        assert!(graph.remove(a));
        assert!(graph.get(a).is_none());
        assert!(graph.get(b).is_none());
        assert!(graph.children(root).is_empty());

        // Slot reuse must not revive the stale handle
        let c = graph.add_child(root, Node::new("c")).unwrap();
        assert!(graph.get(c).is_some());
        assert!(graph.get(a).is_none());
        assert!(!graph.remove(root));
    }

    #[test]
    fn test_handles_are_scoped_to_their_graph() {
        let mut first = SceneGraph::new("first");
        let id = first.add_child(first.root(), Node::new("mesh")).unwrap();
        let second = SceneGraph::new("second");
        assert!(second.get(id).is_none());
    }

    #[test]
    fn test_world_matrix_composes_parents() {
        let mut graph = SceneGraph::new("Scene");
        let parent = graph
            .add_child(
                graph.root(),
                Node::new("p").with_transform(Transform::from_translation(Vec3::new(1.0, 0.0, 0.0))),
            )
            .unwrap();
        let child = graph
            .add_child(
                parent,
                Node::new("c").with_transform(Transform::from_translation(Vec3::new(0.0, 2.0, 0.0))),
            )
            .unwrap();

        let m = graph.world_matrix(child).unwrap();
        assert_eq!(m.transform_point3(Vec3::ZERO), Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_revision_moves_on_mutation() {
        let mut graph = SceneGraph::new("Scene");
        let before = graph.revision();
        let root = graph.root();
        graph.get_mut(root).unwrap().visible = false;
        assert!(graph.revision() > before);
        assert!(!graph.is_visible(root));
    }

    #[test]
    fn test_set_opacity_toggles_depth_write() {
        let mut m = Material::default();
        m.set_opacity(0.5);
        assert!(m.transparent);
        assert!(!m.depth_write);
        m.set_opacity(1.0);
        assert!(m.depth_write);
    }

    #[test]
    fn test_index_less_triangles() {
        let g = Geometry::new(vec![Vec3::ZERO; 9], None);
        assert_eq!(g.triangles().len(), 3);
    }
}
