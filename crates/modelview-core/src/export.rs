//! Textual glTF 2.0 export of the live scene graph
//!
//! All binary data (vertex attributes, indices, animation keyframes) goes
//! into a single buffer embedded as a base64 data URI, so the output is a
//! self-contained `.gltf` JSON document.

use base64::Engine;
use glam::{Quat, Vec3};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use crate::animation::{AnimationClip, ChannelValues};
use crate::hierarchy::HierarchyWalker;
use crate::scene_graph::{Geometry, Material, NodeId, SceneGraph};

/// Content type used when uploading an export
pub const GLTF_CONTENT_TYPE: &str = "application/json";
pub const DEFAULT_LOCAL_NAME: &str = "modified_model";
pub const DEFAULT_REMOTE_NAME: &str = "model";

const FLOAT: u32 = 5126;
const UNSIGNED_INT: u32 = 5125;
const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Resolve the exported file name: trimmed input or `default`, with a
/// `.gltf` extension appended when missing
pub fn file_name(input: Option<&str>, default: &str) -> String {
    let name = input.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(default);
    if name.to_ascii_lowercase().ends_with(".gltf") {
        name.to_string()
    } else {
        format!("{name}.gltf")
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    asset: Asset,
    scene: usize,
    scenes: Vec<Scene>,
    nodes: Vec<JsonNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    meshes: Vec<Mesh>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    materials: Vec<JsonMaterial>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    accessors: Vec<Accessor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    buffer_views: Vec<BufferView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    buffers: Vec<Buffer>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    animations: Vec<Animation>,
}

#[derive(Serialize)]
struct Asset {
    version: &'static str,
    generator: &'static str,
}

#[derive(Serialize)]
struct Scene {
    name: String,
    nodes: Vec<usize>,
}

#[derive(Serialize, Default)]
struct JsonNode {
    #[serde(skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mesh: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    translation: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rotation: Option<[f32; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scale: Option<[f32; 3]>,
}

#[derive(Serialize)]
struct Mesh {
    #[serde(skip_serializing_if = "String::is_empty")]
    name: String,
    primitives: Vec<Primitive>,
}

#[derive(Serialize)]
struct Primitive {
    attributes: HashMap<&'static str, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    indices: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    material: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonMaterial {
    pbr_metallic_roughness: Pbr,
    emissive_factor: [f32; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    alpha_mode: Option<&'static str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Pbr {
    base_color_factor: [f32; 4],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Accessor {
    buffer_view: usize,
    component_type: u32,
    count: usize,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<Vec<f32>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BufferView {
    buffer: usize,
    byte_offset: usize,
    byte_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Buffer {
    byte_length: usize,
    uri: String,
}

#[derive(Serialize)]
struct Animation {
    name: String,
    channels: Vec<AnimationChannel>,
    samplers: Vec<AnimationSampler>,
}

#[derive(Serialize)]
struct AnimationChannel {
    sampler: usize,
    target: ChannelTarget,
}

#[derive(Serialize)]
struct ChannelTarget {
    node: usize,
    path: &'static str,
}

#[derive(Serialize)]
struct AnimationSampler {
    input: usize,
    output: usize,
    interpolation: &'static str,
}

/// Accumulates binary data plus the accessors describing it
#[derive(Default)]
struct BinaryBuilder {
    data: Vec<u8>,
    views: Vec<BufferView>,
    accessors: Vec<Accessor>,
}

impl BinaryBuilder {
    fn push(
        &mut self,
        bytes: Vec<u8>,
        component_type: u32,
        count: usize,
        kind: &'static str,
        target: Option<u32>,
        bounds: Option<(Vec<f32>, Vec<f32>)>,
    ) -> usize {
        while self.data.len() % 4 != 0 {
            self.data.push(0);
        }
        self.views.push(BufferView {
            buffer: 0,
            byte_offset: self.data.len(),
            byte_length: bytes.len(),
            target,
        });
        self.data.extend_from_slice(&bytes);
        let (min, max) = bounds.unzip();
        self.accessors.push(Accessor {
            buffer_view: self.views.len() - 1,
            component_type,
            count,
            kind,
            min,
            max,
        });
        self.accessors.len() - 1
    }

    fn push_vec3(&mut self, values: &[Vec3], target: Option<u32>, with_bounds: bool) -> usize {
        let bytes = values.iter().flat_map(|v| v.to_array()).flat_map(f32::to_le_bytes).collect();
        let bounds = if with_bounds && !values.is_empty() {
            let (min, max) = values
                .iter()
                .fold((Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)), |(lo, hi), v| {
                    (lo.min(*v), hi.max(*v))
                });
            Some((min.to_array().to_vec(), max.to_array().to_vec()))
        } else {
            None
        };
        self.push(bytes, FLOAT, values.len(), "VEC3", target, bounds)
    }

    fn push_quat(&mut self, values: &[Quat]) -> usize {
        let bytes = values.iter().flat_map(|q| q.to_array()).flat_map(f32::to_le_bytes).collect();
        self.push(bytes, FLOAT, values.len(), "VEC4", None, None)
    }

    fn push_scalars(&mut self, values: &[f32]) -> usize {
        let bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let min = values.iter().copied().fold(f32::MAX, f32::min);
        let max = values.iter().copied().fold(f32::MIN, f32::max);
        self.push(bytes, FLOAT, values.len(), "SCALAR", None, Some((vec![min], vec![max])))
    }

    fn push_indices(&mut self, indices: &[u32]) -> usize {
        let bytes = indices.iter().flat_map(|i| i.to_le_bytes()).collect();
        self.push(
            bytes,
            UNSIGNED_INT,
            indices.len(),
            "SCALAR",
            Some(ELEMENT_ARRAY_BUFFER),
            None,
        )
    }

    fn finish(self) -> (Vec<BufferView>, Vec<Accessor>, Vec<Buffer>) {
        if self.data.is_empty() {
            return (self.views, self.accessors, Vec::new());
        }
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.data);
        let buffer = Buffer {
            byte_length: self.data.len(),
            uri: format!("data:application/octet-stream;base64,{encoded}"),
        };
        (self.views, self.accessors, vec![buffer])
    }
}

fn export_material(material: &Material) -> JsonMaterial {
    let [r, g, b] = material.color.to_array();
    JsonMaterial {
        pbr_metallic_roughness: Pbr {
            base_color_factor: [r, g, b, material.opacity],
        },
        emissive_factor: material.emissive.to_array(),
        alpha_mode: material.transparent.then_some("BLEND"),
    }
}

fn export_mesh(
    name: &str,
    geometry: &Geometry,
    material: Option<usize>,
    binary: &mut BinaryBuilder,
) -> Mesh {
    let mut attributes = HashMap::new();
    attributes.insert(
        "POSITION",
        binary.push_vec3(&geometry.positions, Some(ARRAY_BUFFER), true),
    );
    if let Some(normals) = geometry.normals.as_ref().filter(|n| n.len() == geometry.positions.len()) {
        attributes.insert("NORMAL", binary.push_vec3(normals, Some(ARRAY_BUFFER), false));
    }
    let indices = geometry.indices.as_deref().map(|i| binary.push_indices(i));
    Mesh {
        name: name.to_string(),
        primitives: vec![Primitive {
            attributes,
            indices,
            material,
        }],
    }
}

fn export_clip(
    clip: &AnimationClip,
    node_index: &HashMap<NodeId, usize>,
    binary: &mut BinaryBuilder,
) -> Option<Animation> {
    let mut channels = Vec::new();
    let mut samplers = Vec::new();
    for channel in &clip.channels {
        let Some(&node) = node_index.get(&channel.target) else {
            continue;
        };
        let keys = channel.times.len().min(channel.values.len());
        if keys == 0 {
            continue;
        }
        let input = binary.push_scalars(&channel.times[..keys]);
        let (output, path) = match &channel.values {
            ChannelValues::Translation(v) => (binary.push_vec3(&v[..keys], None, false), "translation"),
            ChannelValues::Rotation(v) => (binary.push_quat(&v[..keys]), "rotation"),
            ChannelValues::Scale(v) => (binary.push_vec3(&v[..keys], None, false), "scale"),
        };
        // Only keyframe values are kept, so cubic splines are written as linear
        let interpolation = match channel.interpolation {
            crate::animation::Interpolation::Step => "STEP",
            _ => "LINEAR",
        };
        samplers.push(AnimationSampler {
            input,
            output,
            interpolation,
        });
        channels.push(AnimationChannel {
            sampler: samplers.len() - 1,
            target: ChannelTarget { node, path },
        });
    }
    if channels.is_empty() {
        return None;
    }
    Some(Animation {
        name: clip.name.clone(),
        channels,
        samplers,
    })
}

/// Serialize `graph` and `clips` as pretty-printed glTF JSON
pub fn export_gltf(graph: &SceneGraph, clips: &[AnimationClip]) -> Result<String, ExportError> {
    let root = graph.root();
    let mut node_index: HashMap<NodeId, usize> = HashMap::new();
    let mut order = Vec::new();
    for entry in HierarchyWalker::from_root(graph).filter(|e| e.id != root) {
        node_index.insert(entry.id, order.len());
        order.push(entry.id);
    }

    let mut binary = BinaryBuilder::default();
    let mut meshes = Vec::new();
    let mut materials = Vec::new();
    let mut nodes = Vec::with_capacity(order.len());

    for id in &order {
        let Some(node) = graph.get(*id) else {
            continue;
        };
        let t = node.transform;
        let mut out = JsonNode {
            name: node.name.clone(),
            children: graph
                .children(*id)
                .iter()
                .filter_map(|c| node_index.get(c).copied())
                .collect(),
            translation: (t.translation != Vec3::ZERO).then(|| t.translation.to_array()),
            rotation: (t.rotation != Quat::IDENTITY).then(|| t.rotation.to_array()),
            scale: (t.scale != Vec3::ONE).then(|| t.scale.to_array()),
            ..Default::default()
        };
        if let Some(geometry) = node.geometry.as_ref().filter(|g| !g.positions.is_empty()) {
            let material = node.material.as_ref().map(|m| {
                materials.push(export_material(m));
                materials.len() - 1
            });
            meshes.push(export_mesh(&node.name, geometry, material, &mut binary));
            out.mesh = Some(meshes.len() - 1);
        }
        nodes.push(out);
    }

    let animations: Vec<Animation> = clips
        .iter()
        .filter_map(|clip| export_clip(clip, &node_index, &mut binary))
        .collect();

    let scene_nodes = graph
        .children(root)
        .iter()
        .filter_map(|c| node_index.get(c).copied())
        .collect();
    let scene_name = graph.get(root).map(|n| n.name.clone()).unwrap_or_default();

    let (buffer_views, accessors, buffers) = binary.finish();
    let document = Document {
        asset: Asset {
            version: "2.0",
            generator: concat!("modelview ", env!("CARGO_PKG_VERSION")),
        },
        scene: 0,
        scenes: vec![Scene {
            name: scene_name,
            nodes: scene_nodes,
        }],
        nodes,
        meshes,
        materials,
        accessors,
        buffer_views,
        buffers,
        animations,
    };
    debug!(
        nodes = document.nodes.len(),
        meshes = document.meshes.len(),
        animations = document.animations.len(),
        "Exporting glTF"
    );
    Ok(serde_json::to_string_pretty(&document)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{Channel, Interpolation};
    use crate::loader::load_gltf;
    use crate::scene_graph::{Node, Transform};

    fn sample_graph() -> (SceneGraph, NodeId) {
        let mut graph = SceneGraph::new("Showroom");
        let group = graph
            .add_child(
                graph.root(),
                Node::new("car").with_transform(Transform::from_translation(Vec3::new(0.0, 1.0, 0.0))),
            )
            .unwrap();
        let mut material = Material::default();
        material.set_opacity(0.5);
        let body = graph
            .add_child(
                group,
                Node::new("body")
                    .with_geometry(Geometry::new(
                        vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::ONE],
                        Some(vec![0, 1, 2, 1, 3, 2]),
                    ))
                    .with_material(material),
            )
            .unwrap();
        (graph, body)
    }

    #[test]
    fn test_file_name_defaults_and_extension() {
        assert_eq!(file_name(None, DEFAULT_LOCAL_NAME), "modified_model.gltf");
        assert_eq!(file_name(Some("   "), DEFAULT_REMOTE_NAME), "model.gltf");
        assert_eq!(file_name(Some(" car "), DEFAULT_REMOTE_NAME), "car.gltf");
        assert_eq!(file_name(Some("car.GLTF"), DEFAULT_REMOTE_NAME), "car.GLTF");
    }

    #[test]
    fn test_export_is_pretty_json() {
        let (graph, _) = sample_graph();
        let text = export_gltf(&graph, &[]).unwrap();
        assert!(text.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["asset"]["version"], "2.0");
        assert_eq!(value["scenes"][0]["name"], "Showroom");
        assert_eq!(value["materials"][0]["alphaMode"], "BLEND");
        assert!(value["buffers"][0]["uri"]
            .as_str()
            .unwrap()
            .starts_with("data:application/octet-stream;base64,"));
        assert!(value.get("animations").is_none());
    }

    #[test]
    fn test_export_loads_back() {
        let (mut graph, body) = sample_graph();
        graph.get_mut(body).unwrap().transform.scale = Vec3::splat(2.0);
        let clip = AnimationClip::new(
            "spin",
            vec![Channel {
                target: body,
                times: vec![0.0, 1.0],
                values: ChannelValues::Rotation(vec![Quat::IDENTITY, Quat::from_rotation_y(1.0)]),
                interpolation: Interpolation::Linear,
            }],
        );
        let text = export_gltf(&graph, &[clip]).unwrap();
        let model = load_gltf(text.as_bytes()).unwrap();

        let reloaded = &model.graph;
        let body = reloaded.find_by_name("body").unwrap();
        let node = reloaded.get(body).unwrap();
        assert_eq!(node.transform.scale, Vec3::splat(2.0));
        let geometry = node.geometry.as_ref().unwrap();
        assert_eq!(geometry.positions.len(), 4);
        assert_eq!(geometry.indices.as_deref(), Some(&[0, 1, 2, 1, 3, 2][..]));
        let material = node.material.as_ref().unwrap();
        assert!(material.transparent);
        assert_eq!(material.opacity, 0.5);

        assert_eq!(model.clips.len(), 1);
        assert_eq!(model.clips[0].name, "spin");
        assert_eq!(model.clips[0].duration, 1.0);
    }
}
