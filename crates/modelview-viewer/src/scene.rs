//! 3D scene: camera, lights, grid and the entity mirror of the model graph

use bevy::asset::RenderAssetUsages;
use bevy::input::mouse::{MouseMotion, MouseWheel};
use bevy::mesh::{Indices, PrimitiveTopology};
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use std::collections::{HashMap, HashSet};

use modelview_core::hierarchy::HierarchyWalker;
use modelview_core::scene_graph::{Geometry, Material, Transform as NodeTransform};
use modelview_core::{LightConfig, LightKind, NodeId, Ray, SceneConfig, SceneGraph};

use crate::app::{to_color, CameraSettings, ViewerSession};

pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ModelEntities>()
            .add_systems(Startup, setup_scene)
            .add_systems(
                Update,
                (
                    drive_session,
                    sync_model,
                    apply_camera_fit,
                    update_camera,
                    sync_light,
                    sync_environment,
                )
                    .chain(),
            );
    }
}

/// Marker for the main camera
#[derive(Component)]
pub struct MainCamera;

/// Marker for the configurable light
#[derive(Component)]
pub struct SceneLight;

/// Marker for the fixed fill lights
#[derive(Component)]
pub struct RigLight;

/// Ambient fill always present under the configurable light
const RIG_AMBIENT_INTENSITY: f32 = 0.5;
const RIG_SPOT_POSITION: Vec3 = Vec3::splat(10.0);
const RIG_POINT_POSITION: Vec3 = Vec3::splat(-10.0);

/// Marker for grid lines
#[derive(Component)]
pub struct GridLine;

/// Entity standing for a scene-graph node
#[derive(Component)]
pub struct ModelNode(pub NodeId);

/// Render-side state of one mesh node
struct MeshAssets {
    solid: Handle<Mesh>,
    wire: Handle<Mesh>,
    material: Handle<StandardMaterial>,
    applied: Material,
}

/// Entities and assets mirroring the current graph
#[derive(Resource, Default)]
pub struct ModelEntities {
    /// Root of the mirrored graph; a different root means a new model
    root: Option<NodeId>,
    revision: u64,
    entities: HashMap<NodeId, Entity>,
    meshes: HashMap<NodeId, MeshAssets>,
}

impl ModelEntities {
    fn clear(&mut self, commands: &mut Commands) {
        if let Some(root) = self.root.take().and_then(|id| self.entities.get(&id)) {
            commands.entity(*root).despawn();
        }
        self.entities.clear();
        self.meshes.clear();
    }
}

fn setup_scene(mut commands: Commands, settings: Res<CameraSettings>) {
    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: 75f32.to_radians(),
            near: 0.01,
            far: 10_000.0,
            ..default()
        }),
        Transform::from_translation(settings.eye()).looking_at(settings.target, Vec3::Y),
        MainCamera,
    ));

    // Fixed rig: spot and point fill at unit intensity
    commands.spawn((
        SpotLight {
            intensity: light_scale(LightKind::Spot),
            range: 1000.0,
            ..default()
        },
        Transform::from_translation(RIG_SPOT_POSITION).looking_at(Vec3::ZERO, Vec3::Y),
        RigLight,
    ));
    commands.spawn((
        PointLight {
            intensity: light_scale(LightKind::Point),
            range: 1000.0,
            ..default()
        },
        Transform::from_translation(RIG_POINT_POSITION),
        RigLight,
    ));
}

fn to_vec3(v: modelview_core::glam::Vec3) -> Vec3 {
    Vec3::from_array(v.to_array())
}

fn to_transform(t: &NodeTransform) -> Transform {
    Transform {
        translation: to_vec3(t.translation),
        rotation: Quat::from_array(t.rotation.to_array()),
        scale: to_vec3(t.scale),
    }
}

fn to_visibility(visible: bool) -> Visibility {
    if visible {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    }
}

fn to_standard_material(material: &Material) -> StandardMaterial {
    let c = material.color;
    StandardMaterial {
        // glTF factors are linear
        base_color: Color::linear_rgba(c.r, c.g, c.b, material.opacity),
        emissive: LinearRgba::rgb(material.emissive.r, material.emissive.g, material.emissive.b),
        alpha_mode: if material.transparent {
            AlphaMode::Blend
        } else {
            AlphaMode::Opaque
        },
        double_sided: true,
        cull_mode: None,
        ..default()
    }
}

/// Indexed triangle mesh; normals are computed when the source has none
fn build_solid_mesh(geometry: &Geometry) -> Mesh {
    let positions: Vec<[f32; 3]> = geometry.positions.iter().map(|p| p.to_array()).collect();
    let indices: Vec<u32> = geometry
        .triangles()
        .into_iter()
        .flatten()
        .map(|i| i as u32)
        .collect();

    let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default())
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_indices(Indices::U32(indices));
    match &geometry.normals {
        Some(normals) if normals.len() == geometry.positions.len() => {
            let normals: Vec<[f32; 3]> = normals.iter().map(|n| n.to_array()).collect();
            mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
        }
        _ => mesh.compute_smooth_normals(),
    }
    mesh
}

/// Unique triangle edges as a line list sharing the solid mesh's vertices
fn build_wire_mesh(geometry: &Geometry, solid: &Mesh) -> Mesh {
    let mut seen = HashSet::new();
    let mut indices = Vec::new();
    for [a, b, c] in geometry.triangles() {
        for (u, v) in [(a, b), (b, c), (c, a)] {
            if seen.insert((u.min(v), u.max(v))) {
                indices.extend([u as u32, v as u32]);
            }
        }
    }

    let positions: Vec<[f32; 3]> = geometry.positions.iter().map(|p| p.to_array()).collect();
    let mut mesh = Mesh::new(PrimitiveTopology::LineList, RenderAssetUsages::default())
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    if let Some(normals) = solid.attribute(Mesh::ATTRIBUTE_NORMAL) {
        mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals.clone());
    }
    mesh.insert_indices(Indices::U32(indices));
    mesh
}

/// Feed the pointer ray, click and frame time into the session
fn drive_session(
    mut session: ResMut<ViewerSession>,
    camera_query: Query<(&Camera, &GlobalTransform), With<MainCamera>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    time: Res<Time>,
    mut contexts: bevy_egui::EguiContexts,
) {
    let egui_wants_pointer = contexts
        .ctx_mut()
        .map(|ctx| ctx.is_pointer_over_area() || ctx.wants_pointer_input())
        .unwrap_or(false);

    let ray = if egui_wants_pointer {
        None
    } else {
        pointer_ray(&camera_query, &windows)
    };
    let clicked = ray.is_some() && mouse_button.just_pressed(MouseButton::Left);
    session.frame(ray, clicked, time.delta_secs());
}

fn pointer_ray(
    camera_query: &Query<(&Camera, &GlobalTransform), With<MainCamera>>,
    windows: &Query<&Window, With<PrimaryWindow>>,
) -> Option<Ray> {
    let cursor = windows.single().ok()?.cursor_position()?;
    let (camera, camera_transform) = camera_query.single().ok()?;
    let ray = camera.viewport_to_world(camera_transform, cursor).ok()?;
    Some(Ray::new(
        modelview_core::glam::Vec3::from_array(ray.origin.to_array()),
        modelview_core::glam::Vec3::from_array(ray.direction.to_array()),
    ))
}

/// Keep entities in step with the session's graph
fn sync_model(
    mut commands: Commands,
    session: Res<ViewerSession>,
    mut mirror: ResMut<ModelEntities>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut nodes: Query<(&mut Transform, &mut Visibility), With<ModelNode>>,
) {
    let Some(graph) = session.graph() else {
        if mirror.root.is_some() {
            mirror.clear(&mut commands);
        }
        return;
    };

    if mirror.root != Some(graph.root()) || mirror.entities.len() != graph.len() {
        mirror.clear(&mut commands);
        spawn_model(&mut commands, graph, &mut mirror, &mut meshes, &mut materials);
        return;
    }
    if mirror.revision == graph.revision() {
        return;
    }
    mirror.revision = graph.revision();

    let ModelEntities {
        entities,
        meshes: mesh_assets,
        ..
    } = &mut *mirror;
    for (id, entity) in entities.iter() {
        let Some(node) = graph.get(*id) else {
            continue;
        };
        if let Ok((mut transform, mut visibility)) = nodes.get_mut(*entity) {
            let target = to_transform(&node.transform);
            if *transform != target {
                *transform = target;
            }
            visibility.set_if_neq(to_visibility(node.visible));
        }

        let (Some(assets), Some(material)) = (mesh_assets.get_mut(id), node.material.as_ref())
        else {
            continue;
        };
        if assets.applied == *material {
            continue;
        }
        if assets.applied.wireframe != material.wireframe {
            let handle = if material.wireframe {
                assets.wire.clone()
            } else {
                assets.solid.clone()
            };
            commands.entity(*entity).insert(Mesh3d(handle));
        }
        if let Some(standard) = materials.get_mut(&assets.material) {
            *standard = to_standard_material(material);
        }
        assets.applied = material.clone();
    }
}

fn spawn_model(
    commands: &mut Commands,
    graph: &SceneGraph,
    mirror: &mut ModelEntities,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
) {
    for entry in HierarchyWalker::from_root(graph) {
        let node = entry.node;
        let mut entity = commands.spawn((
            Name::new(entry.label().to_string()),
            to_transform(&node.transform),
            to_visibility(node.visible),
            ModelNode(entry.id),
        ));
        if let Some(parent) = node.parent().and_then(|p| mirror.entities.get(&p)) {
            entity.insert(ChildOf(*parent));
        }

        if let Some(geometry) = &node.geometry {
            let material = node.material.clone().unwrap_or_default();
            let solid_mesh = build_solid_mesh(geometry);
            let wire = meshes.add(build_wire_mesh(geometry, &solid_mesh));
            let solid = meshes.add(solid_mesh);
            let handle = materials.add(to_standard_material(&material));
            let shown = if material.wireframe {
                wire.clone()
            } else {
                solid.clone()
            };
            entity.insert((Mesh3d(shown), MeshMaterial3d(handle.clone())));
            mirror.meshes.insert(
                entry.id,
                MeshAssets {
                    solid,
                    wire,
                    material: handle,
                    applied: material,
                },
            );
        }
        let id = entity.id();
        mirror.entities.insert(entry.id, id);
    }
    mirror.root = Some(graph.root());
    mirror.revision = graph.revision();
    tracing::info!("Spawned {} model entities", mirror.entities.len());
}

fn apply_camera_fit(mut session: ResMut<ViewerSession>, mut settings: ResMut<CameraSettings>) {
    if let Some(fit) = session.take_camera_fit() {
        settings.apply_fit(&fit);
    }
}

fn update_camera(
    mut camera_query: Query<&mut Transform, With<MainCamera>>,
    mut settings: ResMut<CameraSettings>,
    session: Res<ViewerSession>,
    mut mouse_motion: MessageReader<MouseMotion>,
    mut mouse_wheel: MessageReader<MouseWheel>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    touch_input: Res<Touches>,
    time: Res<Time>,
    mut contexts: bevy_egui::EguiContexts,
) {
    let egui_wants_pointer = contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_pointer_input())
        .unwrap_or(false);

    let mut total_motion = Vec2::ZERO;
    for motion in mouse_motion.read() {
        total_motion += motion.delta;
    }

    // Orbit with left drag
    if mouse_button.pressed(MouseButton::Left) && !egui_wants_pointer {
        settings.azimuth += total_motion.x * settings.sensitivity;
        settings.elevation =
            (settings.elevation + total_motion.y * settings.sensitivity).clamp(-1.5, 1.5);
    }

    // Pan with right drag in the view plane
    if mouse_button.pressed(MouseButton::Right) && !egui_wants_pointer {
        let right = Vec3::new(-settings.azimuth.sin(), 0.0, settings.azimuth.cos());
        let pan_speed = settings.distance * 0.002;
        settings.target_focus -= right * total_motion.x * pan_speed;
        settings.target_focus += Vec3::Y * total_motion.y * pan_speed;
    }

    if !egui_wants_pointer {
        for scroll in mouse_wheel.read() {
            let zoom_factor = 1.0 - scroll.y * settings.zoom_speed * 0.3;
            settings.target_distance = (settings.target_distance * zoom_factor)
                .clamp(CameraSettings::MIN_DISTANCE, CameraSettings::MAX_DISTANCE);
        }
    } else {
        // Drain so scrolling a panel doesn't zoom later
        for _ in mouse_wheel.read() {}
    }

    if touch_input.iter().count() == 1 && !egui_wants_pointer {
        for touch in touch_input.iter() {
            let delta = touch.delta();
            settings.azimuth += delta.x * settings.sensitivity;
            settings.elevation =
                (settings.elevation + delta.y * settings.sensitivity).clamp(-1.5, 1.5);
        }
    }

    // Pinch to zoom
    if touch_input.iter().count() == 2 {
        let touches: Vec<_> = touch_input.iter().collect();
        if let [t1, t2] = touches.as_slice() {
            let curr_dist = t1.position().distance(t2.position());
            let prev_dist = (t1.position() - t1.delta()).distance(t2.position() - t2.delta());
            let zoom_factor = prev_dist / curr_dist.max(1.0);
            settings.target_distance = (settings.target_distance * zoom_factor)
                .clamp(CameraSettings::MIN_DISTANCE, CameraSettings::MAX_DISTANCE);
        }
    }

    let dt = time.delta_secs();
    if session.scene().auto_rotate {
        settings.azimuth += settings.auto_rotate_speed * dt;
    }

    let lerp_factor = 1.0 - (-settings.smooth_factor * 60.0 * dt).exp();
    settings.distance += (settings.target_distance - settings.distance) * lerp_factor;
    settings.target = settings.target + (settings.target_focus - settings.target) * lerp_factor;

    if let Ok(mut transform) = camera_query.single_mut() {
        transform.translation = settings.eye();
        transform.look_at(settings.target, Vec3::Y);
    }
}

/// Brightness scale from inspector intensity to each light type's unit
fn light_scale(kind: LightKind) -> f32 {
    match kind {
        LightKind::Ambient => 150.0,
        LightKind::Directional => 2_500.0,
        LightKind::Point | LightKind::Spot => 500_000.0,
    }
}

/// Rig ambient fill, blended with the configurable light when that is
/// ambient too
fn ambient_light(light: &LightConfig) -> AmbientLight {
    let fill = RIG_AMBIENT_INTENSITY * light_scale(LightKind::Ambient);
    if light.kind != LightKind::Ambient {
        return AmbientLight {
            color: Color::WHITE,
            brightness: fill,
            ..default()
        };
    }
    let extra = light.intensity.max(0.0) * light_scale(LightKind::Ambient);
    let total = fill + extra;
    let weight = extra / total;
    let c = to_color(light.color).to_linear();
    let mix = |channel: f32| 1.0 - weight + channel * weight;
    AmbientLight {
        color: Color::LinearRgba(LinearRgba::rgb(mix(c.red), mix(c.green), mix(c.blue))),
        brightness: total,
        ..default()
    }
}

/// Respawn the light whenever its settings change
fn sync_light(
    mut commands: Commands,
    session: Res<ViewerSession>,
    lights: Query<Entity, With<SceneLight>>,
    mut applied: Local<Option<LightConfig>>,
) {
    let light = session.light();
    if applied.as_ref() == Some(light) {
        return;
    }
    for entity in lights.iter() {
        commands.entity(entity).despawn();
    }

    let color = to_color(light.color);
    let brightness = light.intensity * light_scale(light.kind);
    let position = Vec3::from_array(light.position);
    let placed = Transform::from_translation(position).looking_at(Vec3::ZERO, Vec3::Y);

    commands.insert_resource(ambient_light(light));

    match light.kind {
        LightKind::Ambient => {}
        LightKind::Directional => {
            commands.spawn((
                DirectionalLight {
                    color,
                    illuminance: brightness,
                    shadows_enabled: false,
                    ..default()
                },
                placed,
                SceneLight,
            ));
        }
        LightKind::Point => {
            commands.spawn((
                PointLight {
                    color,
                    intensity: brightness,
                    range: 1000.0,
                    ..default()
                },
                placed,
                SceneLight,
            ));
        }
        LightKind::Spot => {
            commands.spawn((
                SpotLight {
                    color,
                    intensity: brightness,
                    range: 1000.0,
                    ..default()
                },
                placed,
                SceneLight,
            ));
        }
    }
    tracing::debug!("Light set to {:?}", light.kind);
    *applied = Some(light.clone());
}

/// Background color and grid
fn sync_environment(
    mut commands: Commands,
    session: Res<ViewerSession>,
    mut clear_color: ResMut<ClearColor>,
    grid_lines: Query<Entity, With<GridLine>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut applied: Local<Option<SceneConfig>>,
) {
    let scene = session.scene();
    let previous = applied.replace(scene.clone());
    if previous.as_ref() == Some(scene) {
        return;
    }

    clear_color.0 = to_color(scene.background_color);

    let grid_changed = previous.is_none_or(|p| {
        p.show_grid != scene.show_grid
            || p.grid_size != scene.grid_size
            || p.grid_divisions != scene.grid_divisions
    });
    if !grid_changed {
        return;
    }
    for entity in grid_lines.iter() {
        commands.entity(entity).despawn();
    }
    if scene.show_grid {
        spawn_grid(&mut commands, scene, &mut meshes, &mut materials);
    }
}

/// Square grid on the ground plane centered on the origin
fn spawn_grid(
    commands: &mut Commands,
    scene: &SceneConfig,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
) {
    let size = scene.grid_size.max(1) as f32;
    let divisions = scene.grid_divisions.max(1);
    let step = size / divisions as f32;
    let half = size / 2.0;
    let thickness = (size * 0.0005).max(0.002);

    let material = materials.add(StandardMaterial {
        base_color: Color::srgba(0.3, 0.3, 0.3, 0.6),
        alpha_mode: AlphaMode::Blend,
        unlit: true,
        ..default()
    });
    let along_x = meshes.add(Cuboid::new(size, thickness, thickness));
    let along_z = meshes.add(Cuboid::new(thickness, thickness, size));

    for i in 0..=divisions {
        let offset = -half + i as f32 * step;
        commands.spawn((
            Mesh3d(along_x.clone()),
            MeshMaterial3d(material.clone()),
            Transform::from_xyz(0.0, 0.0, offset),
            GridLine,
        ));
        commands.spawn((
            Mesh3d(along_z.clone()),
            MeshMaterial3d(material.clone()),
            Transform::from_xyz(offset, 0.0, 0.0),
            GridLine,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelview_core::glam::Vec3 as GVec3;
    use modelview_core::Rgb;

    fn quad() -> Geometry {
        Geometry::new(
            vec![
                GVec3::new(0.0, 0.0, 0.0),
                GVec3::new(1.0, 0.0, 0.0),
                GVec3::new(1.0, 1.0, 0.0),
                GVec3::new(0.0, 1.0, 0.0),
            ],
            Some(vec![0, 1, 2, 0, 2, 3]),
        )
    }

    #[test]
    fn test_solid_mesh_has_normals_and_indices() {
        let mesh = build_solid_mesh(&quad());
        assert_eq!(mesh.count_vertices(), 4);
        assert_eq!(mesh.indices().map(|i| i.len()), Some(6));
        assert!(mesh.attribute(Mesh::ATTRIBUTE_NORMAL).is_some());
    }

    #[test]
    fn test_wire_mesh_shares_diagonal_once() {
        let geometry = quad();
        let solid = build_solid_mesh(&geometry);
        let wire = build_wire_mesh(&geometry, &solid);
        // Four sides plus the shared diagonal
        assert_eq!(wire.indices().map(|i| i.len()), Some(10));
        assert_eq!(wire.primitive_topology(), PrimitiveTopology::LineList);
    }

    #[test]
    fn test_rig_ambient_survives_non_ambient_light() {
        let directional = LightConfig {
            kind: LightKind::Directional,
            ..Default::default()
        };
        let ambient = ambient_light(&directional);
        assert_eq!(ambient.brightness, RIG_AMBIENT_INTENSITY * light_scale(LightKind::Ambient));
        assert_eq!(ambient.color, Color::WHITE);

        let extra = LightConfig {
            kind: LightKind::Ambient,
            intensity: 1.0,
            ..Default::default()
        };
        assert!(ambient_light(&extra).brightness > ambient.brightness);
    }

    #[test]
    fn test_material_color_stays_linear() {
        let material = Material {
            color: Rgb::new(0.8, 0.2, 0.2),
            ..Default::default()
        };
        let base = to_standard_material(&material).base_color.to_linear();
        assert!((base.red - 0.8).abs() < 1e-6);
        assert!((base.green - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_transparent_material_blends() {
        let mut material = Material {
            color: Rgb::from_hex(0xff0000),
            ..Default::default()
        };
        material.set_opacity(0.5);
        let standard = to_standard_material(&material);
        assert_eq!(standard.alpha_mode, AlphaMode::Blend);
        assert!((standard.base_color.alpha() - 0.5).abs() < 1e-6);

        let opaque = to_standard_material(&Material::default());
        assert_eq!(opaque.alpha_mode, AlphaMode::Opaque);
    }
}
