//! End-to-end: load a two-clip, single-mesh model and drive a session

use base64::Engine;
use modelview_core::hierarchy::HierarchyWalker;
use modelview_core::inspector::{Binding, ControlKind};
use modelview_core::picking::{HoverState, Ray, HIGHLIGHT_EMISSIVE};
use modelview_core::{load_gltf, LoadOutcome, Session};
use serde_json::json;

const VERTICES: usize = 50;
const INDICES: usize = 120;

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// glTF document with one 50-vertex mesh (120 indices) and two clips
/// animating the mesh's parent group
fn robot_gltf() -> Vec<u8> {
    let positions: Vec<f32> = (0..VERTICES)
        .flat_map(|i| [(i % 5) as f32, ((i / 5) % 5) as f32, (i / 25) as f32])
        .collect();
    let indices: Vec<u8> = (0..INDICES as u32 / 3)
        .flat_map(|t| [t, t + 1, t + 2])
        .flat_map(u32::to_le_bytes)
        .collect();
    let times = f32_bytes(&[0.0, 1.0]);
    let walk = f32_bytes(&[0.0, 0.0, 0.0, 4.0, 0.0, 0.0]);
    let jump = f32_bytes(&[0.0, 0.0, 0.0, 0.0, 9.0, 0.0]);

    let mut buffer = Vec::new();
    let mut views = Vec::new();
    for chunk in [f32_bytes(&positions), indices, times, walk, jump] {
        views.push(json!({"buffer": 0, "byteOffset": buffer.len(), "byteLength": chunk.len()}));
        buffer.extend(chunk);
    }
    let uri = format!(
        "data:application/octet-stream;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&buffer)
    );

    let doc = json!({
        "asset": {"version": "2.0"},
        "scene": 0,
        "scenes": [{"name": "Scene", "nodes": [0]}],
        "nodes": [
            {"name": "Robot", "children": [1]},
            {"name": "Body", "mesh": 0}
        ],
        "meshes": [{"name": "Body", "primitives": [{"attributes": {"POSITION": 0}, "indices": 1, "material": 0}]}],
        "materials": [{"pbrMetallicRoughness": {"baseColorFactor": [0.8, 0.2, 0.2, 1.0]}}],
        "accessors": [
            {"bufferView": 0, "componentType": 5126, "count": VERTICES, "type": "VEC3",
             "min": [0.0, 0.0, 0.0], "max": [4.0, 4.0, 1.0]},
            {"bufferView": 1, "componentType": 5125, "count": INDICES, "type": "SCALAR"},
            {"bufferView": 2, "componentType": 5126, "count": 2, "type": "SCALAR", "min": [0.0], "max": [1.0]},
            {"bufferView": 3, "componentType": 5126, "count": 2, "type": "VEC3"},
            {"bufferView": 4, "componentType": 5126, "count": 2, "type": "VEC3"}
        ],
        "bufferViews": views,
        "buffers": [{"byteLength": buffer.len(), "uri": uri}],
        "animations": [
            {"name": "Walk",
             "channels": [{"sampler": 0, "target": {"node": 0, "path": "translation"}}],
             "samplers": [{"input": 2, "output": 3}]},
            {"name": "Jump",
             "channels": [{"sampler": 0, "target": {"node": 0, "path": "translation"}}],
             "samplers": [{"input": 2, "output": 4}]}
        ]
    });
    serde_json::to_vec(&doc).unwrap()
}

fn loaded_session() -> Session {
    let mut session = Session::default();
    let ticket = session.begin_load("robot.gltf");
    let outcome = session.complete_load(ticket, "robot.gltf", load_gltf(&robot_gltf()));
    assert_eq!(outcome, LoadOutcome::Applied);
    session
}

#[test]
fn test_dimensions_computed_once() {
    let mut session = loaded_session();
    for _ in 0..30 {
        session.frame(None, false, 1.0 / 60.0);
    }
    assert_eq!(session.analysis_count(), 1);
    let d = session.dimensions();
    assert_eq!((d.width, d.height, d.depth), (4.0, 4.0, 1.0));
}

#[test]
fn test_triangle_count_from_index_buffer() {
    let mut session = loaded_session();
    let body = session.graph().unwrap().find_by_name("Body").unwrap();
    session.select(Some(body));
    let panel = session.mesh_panel().unwrap();
    match &panel.find(Binding::Triangles).unwrap().kind {
        ControlKind::Readout(v) => assert_eq!(v, "40"),
        other => panic!("unexpected control {other:?}"),
    }
    match &panel.find(Binding::Vertices).unwrap().kind {
        ControlKind::Readout(v) => assert_eq!(v, "50"),
        other => panic!("unexpected control {other:?}"),
    }
}

#[test]
fn test_hierarchy_yields_mesh_and_ancestors() {
    let session = loaded_session();
    let graph = session.graph().unwrap();
    let labels: Vec<_> = HierarchyWalker::from_root(graph)
        .map(|e| (e.label().to_string(), e.depth))
        .collect();
    assert_eq!(
        labels,
        vec![
            ("Scene".to_string(), 0),
            ("Robot".to_string(), 1),
            ("Body".to_string(), 2)
        ]
    );
    let meshes: Vec<_> = HierarchyWalker::from_root(graph)
        .filter(|e| e.node.is_mesh())
        .map(|e| e.label().to_string())
        .collect();
    assert_eq!(meshes, vec!["Body"]);
}

#[test]
fn test_only_first_clip_plays() {
    let mut session = loaded_session();
    assert_eq!(session.clips().len(), 2);
    for _ in 0..4 {
        session.frame(None, false, 0.125);
    }
    assert_eq!(session.animation().mixer().unwrap().clip().name, "Walk");

    let graph = session.graph().unwrap();
    let robot = graph.get(graph.find_by_name("Robot").unwrap()).unwrap();
    assert!((robot.transform.translation.x - 2.0).abs() < 1e-4);
    assert_eq!(robot.transform.translation.y, 0.0);
}

#[test]
fn test_stale_load_is_discarded() {
    let mut session = Session::default();
    let slow = session.begin_load("slow.gltf");
    let fast = session.begin_load("fast.gltf");
    assert_eq!(
        session.complete_load(fast, "fast.gltf", load_gltf(&robot_gltf())),
        LoadOutcome::Applied
    );
    assert_eq!(
        session.complete_load(slow, "slow.gltf", load_gltf(&robot_gltf())),
        LoadOutcome::Stale
    );
    assert_eq!(session.source(), Some("fast.gltf"));
    assert_eq!(session.analysis_count(), 1);
}

#[test]
fn test_hover_then_export_round_trip() {
    let mut session = loaded_session();
    // Straight down through the (3,0)-(4,0)-(0,1) triangles of both layers
    let ray = Ray::new(glam::Vec3::new(3.0, 0.2, 10.0), glam::Vec3::new(0.0, 0.0, -1.0));
    session.frame(Some(ray), false, 0.0);

    let body_id = session.graph().unwrap().find_by_name("Body").unwrap();
    match session.hover_state() {
        HoverState::Hovering { node, original } => {
            assert_eq!(node, body_id);
            assert_eq!(original.map(|c| c.to_hex()), Some(0));
        }
        HoverState::Idle => panic!("ray missed the mesh"),
    }
    let live = session.graph().unwrap().get(body_id).unwrap();
    assert_eq!(live.material.as_ref().unwrap().emissive.to_hex(), HIGHLIGHT_EMISSIVE);

    let exported = session.export_local(None).unwrap().unwrap();
    assert_eq!(exported.name, "modified_model.gltf");

    let reloaded = load_gltf(exported.contents.as_bytes()).unwrap();
    let body = reloaded.graph.find_by_name("Body").unwrap();
    let node = reloaded.graph.get(body).unwrap();
    assert_eq!(node.geometry.as_ref().unwrap().positions.len(), VERTICES);
    assert_eq!(node.material.as_ref().unwrap().emissive.to_hex(), 0);
    assert_eq!(reloaded.clips.len(), 2);
}
