//! Property inspector: editable state and the control panels bound to it
//!
//! Panels are plain descriptors built from a state snapshot. The UI draws
//! them and reports changes back as `(Binding, EditValue)` pairs, which
//! are applied here to the light, scene or selected mesh.

use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use thiserror::Error;

use crate::color::Rgb;
use crate::dimensions::Dimensions;
use crate::hierarchy::HierarchyWalker;
use crate::scene_graph::{Geometry, NodeId, SceneGraph};

pub const INTENSITY_RANGE: (f32, f32) = (0.0, 10.0);
pub const LIGHT_POSITION_RANGE: (f32, f32) = (-50.0, 50.0);
pub const GRID_RANGE: (u32, u32) = (1, 100);
pub const MESH_POSITION_RANGE: (f32, f32) = (-50.0, 50.0);
pub const MESH_ROTATION_RANGE: (f32, f32) = (-PI, PI);
pub const MESH_SCALE_RANGE: (f32, f32) = (0.1, 10.0);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    #[error("{binding:?} expects a {expected} value")]
    TypeMismatch {
        binding: Binding,
        expected: &'static str,
    },
    #[error("{0:?} is read-only")]
    ReadOnly(Binding),
    #[error("No mesh is selected")]
    NoSelection,
    #[error(transparent)]
    InvalidColor(#[from] crate::color::ColorParseError),
    #[error("Unknown choice {0}")]
    UnknownChoice(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn label(self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        }
    }

    fn get(self, v: Vec3) -> f32 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
            Axis::Z => v.z,
        }
    }

    fn set(self, v: &mut Vec3, value: f32) {
        match self {
            Axis::X => v.x = value,
            Axis::Y => v.y = value,
            Axis::Z => v.z = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightKind {
    #[default]
    Ambient,
    Directional,
    Point,
    Spot,
}

impl LightKind {
    pub const ALL: [LightKind; 4] = [
        LightKind::Ambient,
        LightKind::Directional,
        LightKind::Point,
        LightKind::Spot,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LightKind::Ambient => "Ambient",
            LightKind::Directional => "Directional",
            LightKind::Point => "Point",
            LightKind::Spot => "Spot",
        }
    }

    /// Ambient light has no position
    pub fn is_positioned(self) -> bool {
        !matches!(self, LightKind::Ambient)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub kind: LightKind,
    pub color: Rgb,
    pub intensity: f32,
    pub position: [f32; 3],
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            kind: LightKind::Ambient,
            color: Rgb::WHITE,
            intensity: 3.0,
            position: [10.0, 10.0, 10.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub wireframe: bool,
    pub auto_rotate: bool,
    pub background_color: Rgb,
    pub show_grid: bool,
    pub grid_size: u32,
    pub grid_divisions: u32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            wireframe: false,
            auto_rotate: false,
            background_color: Rgb::from_hex(0xaaaaaa),
            show_grid: false,
            grid_size: 50,
            grid_divisions: 50,
        }
    }
}

/// What a control is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binding {
    LightKind,
    LightColor,
    LightIntensity,
    LightPosition(Axis),
    SceneWireframe,
    SceneAutoRotate,
    SceneBackground,
    SceneShowGrid,
    SceneGridSize,
    SceneGridDivisions,
    Width,
    Height,
    Depth,
    MeshName,
    MeshColor,
    MeshWireframe,
    MeshTransparent,
    MeshOpacity,
    MeshPosition(Axis),
    MeshRotation(Axis),
    MeshScale(Axis),
    Vertices,
    Edges,
    Triangles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingScope {
    Light,
    Scene,
    Mesh,
    ReadOnly,
}

impl Binding {
    pub fn scope(self) -> BindingScope {
        match self {
            Self::LightKind | Self::LightColor | Self::LightIntensity | Self::LightPosition(_) => {
                BindingScope::Light
            }
            Self::SceneWireframe
            | Self::SceneAutoRotate
            | Self::SceneBackground
            | Self::SceneShowGrid
            | Self::SceneGridSize
            | Self::SceneGridDivisions => BindingScope::Scene,
            Self::MeshName
            | Self::MeshColor
            | Self::MeshWireframe
            | Self::MeshTransparent
            | Self::MeshOpacity
            | Self::MeshPosition(_)
            | Self::MeshRotation(_)
            | Self::MeshScale(_) => BindingScope::Mesh,
            Self::Width
            | Self::Height
            | Self::Depth
            | Self::Vertices
            | Self::Edges
            | Self::Triangles => BindingScope::ReadOnly,
        }
    }
}

/// Value reported by the UI for an edited control
#[derive(Debug, Clone, PartialEq)]
pub enum EditValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Choice(usize),
}

impl EditValue {
    fn as_bool(&self, binding: Binding) -> Result<bool, EditError> {
        match self {
            EditValue::Bool(b) => Ok(*b),
            _ => Err(EditError::TypeMismatch {
                binding,
                expected: "boolean",
            }),
        }
    }

    fn as_number(&self, binding: Binding, (min, max): (f32, f32)) -> Result<f32, EditError> {
        match self {
            EditValue::Number(n) => Ok((*n as f32).clamp(min, max)),
            _ => Err(EditError::TypeMismatch {
                binding,
                expected: "number",
            }),
        }
    }

    fn as_color(&self, binding: Binding) -> Result<Rgb, EditError> {
        match self {
            EditValue::Text(s) => Ok(Rgb::parse(s)?),
            _ => Err(EditError::TypeMismatch {
                binding,
                expected: "color text",
            }),
        }
    }

    fn as_text(&self, binding: Binding) -> Result<&str, EditError> {
        match self {
            EditValue::Text(s) => Ok(s.trim()),
            _ => Err(EditError::TypeMismatch {
                binding,
                expected: "text",
            }),
        }
    }

    fn as_choice(&self, binding: Binding) -> Result<usize, EditError> {
        match self {
            EditValue::Choice(i) => Ok(*i),
            _ => Err(EditError::TypeMismatch {
                binding,
                expected: "choice",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlKind {
    Choice { options: Vec<String>, selected: usize },
    Color(String),
    Number { value: f64, min: f64, max: f64, step: Option<f64> },
    Toggle(bool),
    Text(String),
    Readout(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub binding: Binding,
    pub label: String,
    pub kind: ControlKind,
}

impl Control {
    fn new(binding: Binding, label: &str, kind: ControlKind) -> Self {
        Self {
            binding,
            label: label.to_string(),
            kind,
        }
    }

    fn number(binding: Binding, label: &str, value: f32, (min, max): (f32, f32)) -> Self {
        Self::new(
            binding,
            label,
            ControlKind::Number {
                value: value as f64,
                min: min as f64,
                max: max as f64,
                step: None,
            },
        )
    }

    fn integer(binding: Binding, label: &str, value: u32, (min, max): (u32, u32)) -> Self {
        Self::new(
            binding,
            label,
            ControlKind::Number {
                value: value as f64,
                min: min as f64,
                max: max as f64,
                step: Some(1.0),
            },
        )
    }

    fn readout(binding: Binding, label: &str, value: impl ToString) -> Self {
        Self::new(binding, label, ControlKind::Readout(value.to_string()))
    }

    pub fn is_editable(&self) -> bool {
        self.binding.scope() != BindingScope::ReadOnly
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Folder {
    pub title: String,
    pub open: bool,
    /// Scene node this folder stands for (hierarchy folders only)
    pub node: Option<NodeId>,
    pub controls: Vec<Control>,
    pub folders: Vec<Folder>,
}

impl Folder {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    fn opened(mut self) -> Self {
        self.open = true;
        self
    }

    fn control(mut self, control: Control) -> Self {
        self.controls.push(control);
        self
    }

    fn folder(mut self, folder: Folder) -> Self {
        self.folders.push(folder);
        self
    }

    /// Depth-first search for the control bound to `binding`
    pub fn find(&self, binding: Binding) -> Option<&Control> {
        self.controls
            .iter()
            .find(|c| c.binding == binding)
            .or_else(|| self.folders.iter().find_map(|f| f.find(binding)))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Panel {
    pub folders: Vec<Folder>,
}

impl Panel {
    pub fn find(&self, binding: Binding) -> Option<&Control> {
        self.folders.iter().find_map(|f| f.find(binding))
    }

    pub fn folder(&self, title: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.title == title)
    }
}

/// Read-only mesh counters shown under "Mesh Info"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MeshStats {
    pub vertices: usize,
    /// Approximation: reported equal to the vertex count
    pub edges: usize,
    pub triangles: usize,
}

impl MeshStats {
    pub fn from_geometry(geometry: &Geometry) -> Self {
        let vertices = geometry.vertex_count();
        let triangles = match &geometry.indices {
            Some(indices) => indices.len() / 3,
            None => vertices / 3,
        };
        Self {
            vertices,
            edges: vertices,
            triangles,
        }
    }
}

fn fmt_dimension(v: f32) -> String {
    format!("{:.2}", v)
}

/// Nested folders mirroring the scene hierarchy
pub fn hierarchy_folder(graph: &SceneGraph) -> Option<Folder> {
    // stack[d] is the open folder at depth d; pre-order means a shallower
    // entry closes every deeper folder
    let mut stack: Vec<Folder> = Vec::new();
    for entry in HierarchyWalker::from_root(graph) {
        while stack.len() > entry.depth.max(1) {
            close_top(&mut stack);
        }
        let mut folder = Folder::new(entry.label());
        folder.node = Some(entry.id);
        stack.push(folder);
    }
    while stack.len() > 1 {
        close_top(&mut stack);
    }
    stack.pop()
}

fn close_top(stack: &mut Vec<Folder>) {
    if let Some(done) = stack.pop() {
        match stack.last_mut() {
            Some(parent) => parent.folders.push(done),
            None => stack.push(done),
        }
    }
}

/// The full inspector panel: light, scene, dimensions and hierarchy
pub fn build_main_panel(
    light: &LightConfig,
    scene: &SceneConfig,
    dimensions: &Dimensions,
    graph: Option<&SceneGraph>,
) -> Panel {
    let mut position = Folder::new("Position");
    for (axis, value) in Axis::ALL.into_iter().zip(light.position) {
        position = position.control(Control::number(
            Binding::LightPosition(axis),
            axis.label(),
            value,
            LIGHT_POSITION_RANGE,
        ));
    }

    let light_folder = Folder::new("Light Properties")
        .opened()
        .control(Control::new(
            Binding::LightKind,
            "Type",
            ControlKind::Choice {
                options: LightKind::ALL.iter().map(|k| k.label().to_string()).collect(),
                selected: LightKind::ALL
                    .iter()
                    .position(|k| *k == light.kind)
                    .unwrap_or(0),
            },
        ))
        .control(Control::new(
            Binding::LightColor,
            "Color",
            ControlKind::Color(light.color.to_css()),
        ))
        .control(Control::number(
            Binding::LightIntensity,
            "Intensity",
            light.intensity,
            INTENSITY_RANGE,
        ))
        .folder(position);

    let scene_folder = Folder::new("Scene Properties")
        .control(Control::new(
            Binding::SceneWireframe,
            "Wireframe",
            ControlKind::Toggle(scene.wireframe),
        ))
        .control(Control::new(
            Binding::SceneAutoRotate,
            "Auto Rotate",
            ControlKind::Toggle(scene.auto_rotate),
        ))
        .control(Control::new(
            Binding::SceneBackground,
            "Background Color",
            ControlKind::Color(scene.background_color.to_css()),
        ))
        .control(Control::new(
            Binding::SceneShowGrid,
            "Show Grid",
            ControlKind::Toggle(scene.show_grid),
        ))
        .control(Control::integer(
            Binding::SceneGridSize,
            "Grid Size",
            scene.grid_size,
            GRID_RANGE,
        ))
        .control(Control::integer(
            Binding::SceneGridDivisions,
            "Grid Divisions",
            scene.grid_divisions,
            GRID_RANGE,
        ));

    let dimensions_folder = Folder::new("Dimensions")
        .control(Control::readout(Binding::Width, "Width", fmt_dimension(dimensions.width)))
        .control(Control::readout(Binding::Height, "Height", fmt_dimension(dimensions.height)))
        .control(Control::readout(Binding::Depth, "Depth", fmt_dimension(dimensions.depth)));

    let mut hierarchy = Folder::new("Mesh Hierarchy");
    if let Some(tree) = graph.and_then(hierarchy_folder) {
        hierarchy = hierarchy.folder(tree);
    }

    Panel {
        folders: vec![light_folder, scene_folder, dimensions_folder, hierarchy],
    }
}

/// The per-mesh sub-panel. `None` unless `node` resolves to a mesh.
pub fn build_mesh_panel(graph: &SceneGraph, node: NodeId) -> Option<Panel> {
    let mesh = graph.get(node)?;
    let geometry = mesh.geometry.as_ref()?;
    let material = mesh.material.clone().unwrap_or_default();
    let stats = MeshStats::from_geometry(geometry);
    let transform = mesh.transform;
    let (rx, ry, rz) = transform.rotation.to_euler(EulerRot::XYZ);
    let rotation = Vec3::new(rx, ry, rz);

    let axis_folder = |title: &str,
                       make: fn(Axis) -> Binding,
                       v: Vec3,
                       range: (f32, f32)| {
        Axis::ALL.into_iter().fold(Folder::new(title), |f, axis| {
            f.control(Control::number(make(axis), axis.label(), axis.get(v), range))
        })
    };

    let info = Folder::new("Mesh Info")
        .control(Control::readout(Binding::Vertices, "Vertices", stats.vertices))
        .control(Control::readout(Binding::Edges, "Edges", stats.edges))
        .control(Control::readout(Binding::Triangles, "Triangles", stats.triangles));

    let folder = Folder::new("Mesh Properties")
        .opened()
        .control(Control::new(
            Binding::MeshName,
            "Selected Mesh",
            ControlKind::Text(mesh.label().to_string()),
        ))
        .control(Control::new(
            Binding::MeshColor,
            "Color",
            ControlKind::Color(material.color.to_css()),
        ))
        .control(Control::new(
            Binding::MeshWireframe,
            "Wireframe",
            ControlKind::Toggle(material.wireframe),
        ))
        .control(Control::new(
            Binding::MeshTransparent,
            "Transparent",
            ControlKind::Toggle(material.transparent),
        ))
        .control(Control::number(
            Binding::MeshOpacity,
            "Opacity",
            material.opacity,
            (0.0, 1.0),
        ))
        .folder(axis_folder(
            "Position",
            Binding::MeshPosition,
            transform.translation,
            MESH_POSITION_RANGE,
        ))
        .folder(axis_folder(
            "Rotation",
            Binding::MeshRotation,
            rotation,
            MESH_ROTATION_RANGE,
        ))
        .folder(axis_folder(
            "Scale",
            Binding::MeshScale,
            transform.scale,
            MESH_SCALE_RANGE,
        ))
        .folder(info);

    Some(Panel {
        folders: vec![folder],
    })
}

pub fn apply_light_edit(
    light: &mut LightConfig,
    binding: Binding,
    value: &EditValue,
) -> Result<(), EditError> {
    match binding {
        Binding::LightKind => {
            let i = value.as_choice(binding)?;
            light.kind = *LightKind::ALL.get(i).ok_or(EditError::UnknownChoice(i))?;
        }
        Binding::LightColor => light.color = value.as_color(binding)?,
        Binding::LightIntensity => light.intensity = value.as_number(binding, INTENSITY_RANGE)?,
        Binding::LightPosition(axis) => {
            let v = value.as_number(binding, LIGHT_POSITION_RANGE)?;
            let mut p = Vec3::from_array(light.position);
            axis.set(&mut p, v);
            light.position = p.to_array();
        }
        other => return Err(EditError::ReadOnly(other)),
    }
    Ok(())
}

/// Apply a scene edit; the scene-wide wireframe switch is pushed into every
/// material of `graph`
pub fn apply_scene_edit(
    scene: &mut SceneConfig,
    graph: Option<&mut SceneGraph>,
    binding: Binding,
    value: &EditValue,
) -> Result<(), EditError> {
    let grid = |v: &EditValue| -> Result<u32, EditError> {
        let (min, max) = GRID_RANGE;
        Ok(v.as_number(binding, (min as f32, max as f32))?.round() as u32)
    };
    match binding {
        Binding::SceneWireframe => {
            let on = value.as_bool(binding)?;
            scene.wireframe = on;
            if let Some(graph) = graph {
                graph.for_each_material(|m| m.wireframe = on);
            }
        }
        Binding::SceneAutoRotate => scene.auto_rotate = value.as_bool(binding)?,
        Binding::SceneBackground => scene.background_color = value.as_color(binding)?,
        Binding::SceneShowGrid => scene.show_grid = value.as_bool(binding)?,
        Binding::SceneGridSize => scene.grid_size = grid(value)?,
        Binding::SceneGridDivisions => scene.grid_divisions = grid(value)?,
        other => return Err(EditError::ReadOnly(other)),
    }
    Ok(())
}

pub fn apply_mesh_edit(
    graph: &mut SceneGraph,
    node: NodeId,
    binding: Binding,
    value: &EditValue,
) -> Result<(), EditError> {
    if binding.scope() != BindingScope::Mesh {
        return Err(EditError::ReadOnly(binding));
    }
    let mesh = graph
        .get_mut(node)
        .filter(|n| n.is_mesh())
        .ok_or(EditError::NoSelection)?;

    match binding {
        Binding::MeshPosition(axis) => {
            let v = value.as_number(binding, MESH_POSITION_RANGE)?;
            axis.set(&mut mesh.transform.translation, v);
            return Ok(());
        }
        Binding::MeshRotation(axis) => {
            let v = value.as_number(binding, MESH_ROTATION_RANGE)?;
            let (x, y, z) = mesh.transform.rotation.to_euler(EulerRot::XYZ);
            let mut euler = Vec3::new(x, y, z);
            axis.set(&mut euler, v);
            mesh.transform.rotation = Quat::from_euler(EulerRot::XYZ, euler.x, euler.y, euler.z);
            return Ok(());
        }
        Binding::MeshScale(axis) => {
            let v = value.as_number(binding, MESH_SCALE_RANGE)?;
            axis.set(&mut mesh.transform.scale, v);
            return Ok(());
        }
        Binding::MeshName => {
            mesh.name = value.as_text(binding)?.to_string();
            return Ok(());
        }
        _ => {}
    }

    let material = mesh.material.get_or_insert_with(Default::default);
    match binding {
        Binding::MeshColor => material.color = value.as_color(binding)?,
        Binding::MeshWireframe => material.wireframe = value.as_bool(binding)?,
        Binding::MeshTransparent => material.transparent = value.as_bool(binding)?,
        Binding::MeshOpacity => material.set_opacity(value.as_number(binding, (0.0, 1.0))?),
        other => return Err(EditError::ReadOnly(other)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_graph::{Material, Node};

    fn graph_with_mesh(indices: Option<Vec<u32>>, vertices: usize) -> (SceneGraph, NodeId) {
        let mut graph = SceneGraph::new("Scene");
        let group = graph.add_child(graph.root(), Node::new("group")).unwrap();
        let mesh = graph
            .add_child(
                group,
                Node::new("mesh")
                    .with_geometry(Geometry::new(vec![Vec3::ZERO; vertices], indices))
                    .with_material(Material::default()),
            )
            .unwrap();
        (graph, mesh)
    }

    fn readout(panel: &Panel, binding: Binding) -> String {
        match &panel.find(binding).unwrap().kind {
            ControlKind::Readout(s) => s.clone(),
            other => panic!("not a readout: {other:?}"),
        }
    }

    #[test]
    fn test_triangle_count_with_index_buffer() {
        let (graph, mesh) = graph_with_mesh(Some(vec![0; 300]), 12);
        let stats = MeshStats::from_geometry(graph.get(mesh).unwrap().geometry.as_ref().unwrap());
        assert_eq!(stats.triangles, 100);
        assert_eq!(stats.edges, stats.vertices);
    }

    #[test]
    fn test_triangle_count_without_index_buffer() {
        let (graph, mesh) = graph_with_mesh(None, 9);
        let panel = build_mesh_panel(&graph, mesh).unwrap();
        assert_eq!(readout(&panel, Binding::Triangles), "3");
        assert_eq!(readout(&panel, Binding::Vertices), "9");
        assert_eq!(readout(&panel, Binding::Edges), "9");
    }

    #[test]
    fn test_mesh_panel_requires_geometry() {
        let (graph, _) = graph_with_mesh(None, 3);
        let group = graph.find_by_name("group").unwrap();
        assert!(build_mesh_panel(&graph, group).is_none());
    }

    #[test]
    fn test_opacity_side_effects() {
        let (mut graph, mesh) = graph_with_mesh(None, 3);
        apply_mesh_edit(&mut graph, mesh, Binding::MeshOpacity, &EditValue::Number(0.5)).unwrap();
        let m = graph.get(mesh).unwrap().material.clone().unwrap();
        assert!(m.transparent);
        assert!(!m.depth_write);
        assert_eq!(m.opacity, 0.5);

        apply_mesh_edit(&mut graph, mesh, Binding::MeshOpacity, &EditValue::Number(1.0)).unwrap();
        assert!(graph.get(mesh).unwrap().material.as_ref().unwrap().depth_write);
    }

    #[test]
    fn test_mesh_name_edit_is_trimmed() {
        let (mut graph, mesh) = graph_with_mesh(None, 3);
        apply_mesh_edit(&mut graph, mesh, Binding::MeshName, &EditValue::Text("  wheel ".into()))
            .unwrap();
        assert_eq!(graph.get(mesh).unwrap().name, "wheel");
    }

    #[test]
    fn test_mesh_color_parses_text() {
        let (mut graph, mesh) = graph_with_mesh(None, 3);
        apply_mesh_edit(
            &mut graph,
            mesh,
            Binding::MeshColor,
            &EditValue::Text("#ff8000".into()),
        )
        .unwrap();
        let color = graph.get(mesh).unwrap().material.as_ref().unwrap().color;
        assert_eq!(color.to_hex(), 0xff8000);

        let err = apply_mesh_edit(
            &mut graph,
            mesh,
            Binding::MeshColor,
            &EditValue::Text("nope".into()),
        );
        assert!(matches!(err, Err(EditError::InvalidColor(_))));
    }

    #[test]
    fn test_mesh_rotation_round_trips_through_euler() {
        let (mut graph, mesh) = graph_with_mesh(None, 3);
        apply_mesh_edit(
            &mut graph,
            mesh,
            Binding::MeshRotation(Axis::Y),
            &EditValue::Number(0.5),
        )
        .unwrap();
        let (_, y, _) = graph
            .get(mesh)
            .unwrap()
            .transform
            .rotation
            .to_euler(EulerRot::XYZ);
        assert!((y - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_values_are_clamped() {
        let mut light = LightConfig::default();
        apply_light_edit(&mut light, Binding::LightIntensity, &EditValue::Number(42.0)).unwrap();
        assert_eq!(light.intensity, 10.0);

        let mut scene = SceneConfig::default();
        apply_scene_edit(&mut scene, None, Binding::SceneGridSize, &EditValue::Number(0.0))
            .unwrap();
        assert_eq!(scene.grid_size, 1);
    }

    #[test]
    fn test_light_kind_choice() {
        let mut light = LightConfig::default();
        apply_light_edit(&mut light, Binding::LightKind, &EditValue::Choice(3)).unwrap();
        assert_eq!(light.kind, LightKind::Spot);
        assert_eq!(
            apply_light_edit(&mut light, Binding::LightKind, &EditValue::Choice(9)),
            Err(EditError::UnknownChoice(9))
        );
    }

    #[test]
    fn test_scene_wireframe_reaches_every_material() {
        let (mut graph, mesh) = graph_with_mesh(None, 3);
        let mut scene = SceneConfig::default();
        apply_scene_edit(
            &mut scene,
            Some(&mut graph),
            Binding::SceneWireframe,
            &EditValue::Bool(true),
        )
        .unwrap();
        assert!(graph.get(mesh).unwrap().material.as_ref().unwrap().wireframe);
    }

    #[test]
    fn test_readonly_and_type_errors() {
        let (mut graph, mesh) = graph_with_mesh(None, 3);
        assert_eq!(
            apply_mesh_edit(&mut graph, mesh, Binding::Vertices, &EditValue::Number(1.0)),
            Err(EditError::ReadOnly(Binding::Vertices))
        );
        assert!(matches!(
            apply_mesh_edit(&mut graph, mesh, Binding::MeshWireframe, &EditValue::Number(1.0)),
            Err(EditError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_main_panel_layout() {
        let (graph, _) = graph_with_mesh(None, 3);
        let dims = Dimensions {
            width: 1.5,
            height: 2.0,
            depth: 0.25,
        };
        let panel = build_main_panel(
            &LightConfig::default(),
            &SceneConfig::default(),
            &dims,
            Some(&graph),
        );
        let titles: Vec<_> = panel.folders.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Light Properties", "Scene Properties", "Dimensions", "Mesh Hierarchy"]
        );
        assert_eq!(readout(&panel, Binding::Width), "1.50");

        let tree = &panel.folder("Mesh Hierarchy").unwrap().folders[0];
        assert_eq!(tree.title, "Scene");
        assert_eq!(tree.folders[0].title, "group");
        assert_eq!(tree.folders[0].folders[0].title, "mesh");
    }
}
