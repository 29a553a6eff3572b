//! Depth-first walk over a scene graph for display

use crate::scene_graph::{Node, NodeId, SceneGraph};

/// One step of a hierarchy walk
#[derive(Debug, Clone, Copy)]
pub struct HierarchyEntry<'a> {
    pub id: NodeId,
    pub node: &'a Node,
    pub depth: usize,
}

impl HierarchyEntry<'_> {
    pub fn label(&self) -> &str {
        self.node.label()
    }
}

/// Lazy pre-order iterator of `(node, depth)` pairs.
///
/// Uses an explicit stack so arbitrarily deep chains do not grow the call
/// stack.
pub struct HierarchyWalker<'a> {
    graph: &'a SceneGraph,
    stack: Vec<(NodeId, usize)>,
}

impl<'a> HierarchyWalker<'a> {
    pub fn new(graph: &'a SceneGraph, start: NodeId) -> Self {
        let stack = if graph.contains(start) {
            vec![(start, 0)]
        } else {
            Vec::new()
        };
        Self { graph, stack }
    }

    /// Walk the whole graph from its root
    pub fn from_root(graph: &'a SceneGraph) -> Self {
        Self::new(graph, graph.root())
    }
}

impl<'a> Iterator for HierarchyWalker<'a> {
    type Item = HierarchyEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (id, depth) = self.stack.pop()?;
            let Some(node) = self.graph.get(id) else {
                continue;
            };
            // Reverse so the first child is popped first
            self.stack
                .extend(node.children().iter().rev().map(|c| (*c, depth + 1)));
            return Some(HierarchyEntry { id, node, depth });
        }
    }
}

/// Indented text rendering of a hierarchy, one node per line
pub fn render_tree(graph: &SceneGraph) -> String {
    let mut out = String::new();
    for entry in HierarchyWalker::from_root(graph) {
        out.push_str(&"  ".repeat(entry.depth));
        out.push_str(entry.label());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_single_node() {
        let graph = SceneGraph::new("");
        let entries: Vec<_> = HierarchyWalker::from_root(&graph).collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].depth, 0);
        assert_eq!(entries[0].label(), "Unnamed");
    }

    #[test]
    fn test_pre_order_with_depths() {
        let mut graph = SceneGraph::new("root");
        let root = graph.root();
        let a = graph.add_child(root, Node::new("a")).unwrap();
        graph.add_child(a, Node::new("a1")).unwrap();
        graph.add_child(root, Node::new("b")).unwrap();

        let walk: Vec<(String, usize)> = HierarchyWalker::from_root(&graph)
            .map(|e| (e.label().to_string(), e.depth))
            .collect();
        assert_eq!(
            walk,
            vec![
                ("root".to_string(), 0),
                ("a".to_string(), 1),
                ("a1".to_string(), 2),
                ("b".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_deep_chain_visits_each_node_once() {
        let mut graph = SceneGraph::new("root");
        let mut parent = graph.root();
        for i in 0..10_000 {
            parent = graph.add_child(parent, Node::new(format!("n{i}"))).unwrap();
        }

        let mut seen = HashSet::new();
        let mut max_depth = 0;
        for entry in HierarchyWalker::from_root(&graph) {
            assert!(seen.insert(entry.id));
            max_depth = max_depth.max(entry.depth);
        }
        assert_eq!(seen.len(), 10_001);
        assert_eq!(max_depth, 10_000);
    }

    #[test]
    fn test_render_tree_indents() {
        let mut graph = SceneGraph::new("Scene");
        let root = graph.root();
        graph.add_child(root, Node::new("Cube")).unwrap();
        assert_eq!(render_tree(&graph), "Scene\n  Cube\n");
    }
}
