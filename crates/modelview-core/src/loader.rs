//! glTF model loading
//!
//! Byte-level parsing is left to the `gltf` crate; this module only maps
//! the parsed document onto a [`SceneGraph`] and a list of
//! [`AnimationClip`]s.

use glam::{Quat, Vec3};
use gltf::animation::util::ReadOutputs;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::animation::{AnimationClip, Channel, ChannelValues, Interpolation};
use crate::color::Rgb;
use crate::scene_graph::{Geometry, Material, Node, NodeId, SceneGraph, Transform};

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("glTF error: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("Document contains no scene")]
    NoScene,
    #[error("Node hierarchy contains a cycle")]
    Cycle,
    #[error("Fetch failed: {0}")]
    Fetch(String),
    #[error("File read failed: {0}")]
    Read(String),
}

/// A parsed model ready to be attached to the session
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub graph: SceneGraph,
    pub clips: Vec<AnimationClip>,
}

/// Parse `.glb` or `.gltf` bytes. Buffers must be embedded (GLB binary
/// chunk or data URIs).
pub fn load_gltf(bytes: &[u8]) -> Result<LoadedModel, ModelError> {
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(bytes)?;
    let buffers = gltf::import_buffers(&document, None, blob)?;
    let buffer_data = |buffer: gltf::Buffer<'_>| buffers.get(buffer.index()).map(|d| d.0.as_slice());

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or(ModelError::NoScene)?;

    let mut graph = SceneGraph::new(scene.name().unwrap_or("Scene"));
    let root = graph.root();
    let node_limit = document.nodes().len();

    // First instance of each glTF node, used to bind animation channels
    let mut instances: HashMap<usize, NodeId> = HashMap::new();

    let top: Vec<_> = scene.nodes().collect();
    let mut stack: Vec<(gltf::Node<'_>, NodeId, usize)> =
        top.into_iter().rev().map(|n| (n, root, 1)).collect();

    while let Some((source, parent, depth)) = stack.pop() {
        if depth > node_limit {
            return Err(ModelError::Cycle);
        }
        let Some(id) = add_node(&mut graph, parent, &source, &buffer_data) else {
            continue;
        };
        instances.entry(source.index()).or_insert(id);

        let children: Vec<_> = source.children().collect();
        stack.extend(children.into_iter().rev().map(|c| (c, id, depth + 1)));
    }

    let clips = document
        .animations()
        .map(|animation| read_clip(&animation, &instances, &buffer_data))
        .collect::<Vec<_>>();

    info!(
        nodes = graph.len(),
        meshes = graph.mesh_ids().len(),
        clips = clips.len(),
        "Model loaded"
    );
    Ok(LoadedModel { graph, clips })
}

fn add_node<'a>(
    graph: &mut SceneGraph,
    parent: NodeId,
    source: &gltf::Node<'a>,
    buffer_data: &impl Fn(gltf::Buffer<'_>) -> Option<&'a [u8]>,
) -> Option<NodeId> {
    let (t, r, s) = source.transform().decomposed();
    let transform = Transform {
        translation: Vec3::from_array(t),
        rotation: Quat::from_array(r),
        scale: Vec3::from_array(s),
    };
    let mut node = Node::new(source.name().unwrap_or("")).with_transform(transform);

    let Some(mesh) = source.mesh() else {
        return graph.add_child(parent, node);
    };
    let primitives: Vec<_> = mesh.primitives().collect();

    if let [primitive] = primitives.as_slice() {
        node.geometry = read_geometry(primitive, buffer_data);
        node.material = Some(read_material(&primitive.material()));
        return graph.add_child(parent, node);
    }

    // Several primitives: the node becomes a group with one child each
    let group = graph.add_child(parent, node)?;
    let base = mesh.name().unwrap_or("");
    for (i, primitive) in primitives.iter().enumerate() {
        let mut part = Node::new(format!("{base}_{i}"));
        part.geometry = read_geometry(primitive, buffer_data);
        part.material = Some(read_material(&primitive.material()));
        graph.add_child(group, part);
    }
    Some(group)
}

fn read_geometry<'a>(
    primitive: &gltf::Primitive<'a>,
    buffer_data: &impl Fn(gltf::Buffer<'_>) -> Option<&'a [u8]>,
) -> Option<Geometry> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        warn!(
            mode = ?primitive.mode(),
            "Non-triangle primitive is not supported; its geometry is dropped and will not be exported"
        );
        return None;
    }
    let reader = primitive.reader(|b| buffer_data(b));
    let positions: Vec<Vec3> = reader.read_positions()?.map(Vec3::from_array).collect();
    let normals = reader
        .read_normals()
        .map(|n| n.map(Vec3::from_array).collect());
    let indices = reader.read_indices().map(|i| i.into_u32().collect());
    Some(Geometry {
        positions,
        normals,
        indices,
    })
}

fn read_material(source: &gltf::Material<'_>) -> Material {
    let [r, g, b, a] = source.pbr_metallic_roughness().base_color_factor();
    let transparent = source.alpha_mode() == gltf::material::AlphaMode::Blend;
    Material {
        color: Rgb::new(r, g, b),
        wireframe: false,
        transparent,
        opacity: a,
        depth_write: !transparent,
        emissive: Rgb::from_array(source.emissive_factor()),
    }
}

/// Cubic-spline outputs come as (in-tangent, value, out-tangent) triples
fn keyframe_values<T: Copy>(values: Vec<T>, interpolation: Interpolation) -> Vec<T> {
    match interpolation {
        Interpolation::CubicSpline => values.chunks_exact(3).map(|c| c[1]).collect(),
        _ => values,
    }
}

fn read_clip<'a>(
    animation: &gltf::Animation<'a>,
    instances: &HashMap<usize, NodeId>,
    buffer_data: &impl Fn(gltf::Buffer<'a>) -> Option<&'a [u8]>,
) -> AnimationClip {
    let mut channels = Vec::new();
    for channel in animation.channels() {
        let Some(&target) = instances.get(&channel.target().node().index()) else {
            continue;
        };
        let interpolation = match channel.sampler().interpolation() {
            gltf::animation::Interpolation::Linear => Interpolation::Linear,
            gltf::animation::Interpolation::Step => Interpolation::Step,
            gltf::animation::Interpolation::CubicSpline => Interpolation::CubicSpline,
        };
        let reader = channel.reader(|b| buffer_data(b));
        let Some(times) = reader.read_inputs() else {
            continue;
        };
        let times: Vec<f32> = times.collect();
        let values = match reader.read_outputs() {
            Some(ReadOutputs::Translations(v)) => ChannelValues::Translation(keyframe_values(
                v.map(Vec3::from_array).collect(),
                interpolation,
            )),
            Some(ReadOutputs::Rotations(v)) => ChannelValues::Rotation(keyframe_values(
                v.into_f32().map(Quat::from_array).collect(),
                interpolation,
            )),
            Some(ReadOutputs::Scales(v)) => ChannelValues::Scale(keyframe_values(
                v.map(Vec3::from_array).collect(),
                interpolation,
            )),
            Some(ReadOutputs::MorphTargetWeights(_)) | None => {
                debug!(animation = animation.index(), "Skipping unsupported channel");
                continue;
            }
        };
        channels.push(Channel {
            target,
            times,
            values,
            interpolation,
        });
    }
    let name = animation
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("animation_{}", animation.index()));
    AnimationClip::new(name, channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(load_gltf(b"not a model"), Err(ModelError::Gltf(_))));
    }

    #[test]
    fn test_loads_node_tree_without_meshes() {
        let doc = r#"{
            "asset": {"version": "2.0"},
            "scene": 0,
            "scenes": [{"name": "Root", "nodes": [0]}],
            "nodes": [
                {"name": "arm", "children": [1], "translation": [1.0, 0.0, 0.0]},
                {"name": ""}
            ]
        }"#;
        let model = load_gltf(doc.as_bytes()).unwrap();
        let graph = &model.graph;
        assert_eq!(graph.get(graph.root()).unwrap().name, "Root");
        let arm = graph.find_by_name("arm").unwrap();
        assert_eq!(graph.children(arm).len(), 1);
        assert_eq!(
            graph.get(arm).unwrap().transform.translation,
            Vec3::new(1.0, 0.0, 0.0)
        );
        assert!(model.clips.is_empty());
    }

    #[test]
    fn test_line_primitive_keeps_node_without_geometry() {
        // Two zeroed positions as an embedded buffer
        let doc = r#"{
            "asset": {"version": "2.0"},
            "scene": 0,
            "scenes": [{"nodes": [0]}],
            "nodes": [{"name": "lines", "mesh": 0}],
            "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "mode": 1}]}],
            "accessors": [{
                "bufferView": 0, "componentType": 5126, "count": 2, "type": "VEC3",
                "min": [0.0, 0.0, 0.0], "max": [0.0, 0.0, 0.0]
            }],
            "bufferViews": [{"buffer": 0, "byteLength": 24}],
            "buffers": [{
                "byteLength": 24,
                "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"
            }]
        }"#;
        let model = load_gltf(doc.as_bytes()).unwrap();
        let lines = model.graph.find_by_name("lines").unwrap();
        let node = model.graph.get(lines).unwrap();
        assert!(node.geometry.is_none());
        assert!(node.material.is_some());
    }

    #[test]
    fn test_missing_scene_is_an_error() {
        let doc = r#"{"asset": {"version": "2.0"}}"#;
        assert!(matches!(load_gltf(doc.as_bytes()), Err(ModelError::NoScene)));
    }

    #[test]
    fn test_cubic_spline_keeps_middle_values() {
        let v = keyframe_values(vec![0, 1, 2, 3, 4, 5], Interpolation::CubicSpline);
        assert_eq!(v, vec![1, 4]);
    }
}
