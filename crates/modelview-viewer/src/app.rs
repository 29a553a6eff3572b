//! Bevy application setup

use bevy::prelude::*;
use bevy::winit::WinitSettings;
use bevy_egui::EguiPlugin;
use bevy_picking::DefaultPickingPlugins;
use std::collections::HashMap;

use modelview_core::{Binding, CameraFit, Rgb, Session, ViewerConfig};

use crate::file_loader::FileLoaderPlugin;
use crate::scene::ScenePlugin;
use crate::ui::UiPlugin;

/// The viewer session: model slot, inspector state and remote listing
#[derive(Resource, Deref, DerefMut)]
pub struct ViewerSession(pub Session);

impl Default for ViewerSession {
    fn default() -> Self {
        Self(Session::new(ViewerConfig::default()))
    }
}

/// Orbit camera state (Y up)
#[derive(Debug, Clone, Resource)]
pub struct CameraSettings {
    pub distance: f32,
    pub target_distance: f32, // For smooth zoom
    pub azimuth: f32,
    pub elevation: f32,
    pub target: Vec3,
    pub target_focus: Vec3, // For smooth re-centering
    pub sensitivity: f32,
    pub zoom_speed: f32,
    pub smooth_factor: f32,
    /// Radians per second while auto-rotate is on
    pub auto_rotate_speed: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            distance: 5.0,
            target_distance: 5.0,
            azimuth: std::f32::consts::FRAC_PI_2,
            elevation: 0.0,
            target: Vec3::ZERO,
            target_focus: Vec3::ZERO,
            sensitivity: 0.005,
            zoom_speed: 0.1,
            smooth_factor: 0.15,
            auto_rotate_speed: std::f32::consts::TAU / 30.0,
        }
    }
}

impl CameraSettings {
    pub const MIN_DISTANCE: f32 = 0.01;
    pub const MAX_DISTANCE: f32 = 5000.0;

    /// Jump to a fitted placement
    pub fn apply_fit(&mut self, fit: &CameraFit) {
        let look_at = Vec3::from_array(fit.look_at.to_array());
        let offset = Vec3::from_array(fit.position.to_array()) - look_at;
        let distance = offset.length().max(Self::MIN_DISTANCE);

        self.target = look_at;
        self.target_focus = look_at;
        self.distance = distance;
        self.target_distance = distance;
        self.azimuth = offset.z.atan2(offset.x);
        self.elevation = (offset.y / distance).clamp(-1.0, 1.0).asin();
    }

    /// Camera position for the current orbit
    pub fn eye(&self) -> Vec3 {
        let x = self.distance * self.azimuth.cos() * self.elevation.cos();
        let y = self.distance * self.elevation.sin();
        let z = self.distance * self.azimuth.sin() * self.elevation.cos();
        self.target + Vec3::new(x, y, z)
    }
}

/// UI-only state that outlives a single egui pass
#[derive(Debug, Clone, Resource, Default)]
pub struct UiState {
    /// Name typed for local export
    pub export_name: String,
    /// Text fields being edited, keyed by control
    pub drafts: HashMap<Binding, String>,
}

pub fn to_color(c: Rgb) -> Color {
    Color::srgb(c.r, c.g, c.b)
}

pub fn run() {
    let config = ViewerConfig::default();
    App::new()
        .insert_resource(ClearColor(to_color(config.scene.background_color)))
        .insert_resource(WinitSettings::default())
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "Model Viewer".to_string(),
                        canvas: Some("#viewer-canvas".to_string()),
                        fit_canvas_to_parent: true,
                        prevent_default_event_handling: false,
                        ..default()
                    }),
                    ..default()
                })
                .set(AssetPlugin {
                    file_path: "".to_string(),
                    meta_check: bevy::asset::AssetMetaCheck::Never,
                    ..default()
                }),
        )
        // Must come before EguiPlugin so it can detect PickingPlugin
        .add_plugins(DefaultPickingPlugins)
        .add_plugins(EguiPlugin::default())
        .insert_resource(ViewerSession(Session::new(config)))
        .init_resource::<CameraSettings>()
        .init_resource::<UiState>()
        .add_plugins(FileLoaderPlugin)
        .add_plugins(ScenePlugin)
        .add_plugins(UiPlugin)
        .run();
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelview_core::dimensions::{camera_fit, Aabb};

    #[test]
    fn test_fit_places_eye_at_fitted_position() {
        let bounds = Aabb::from_points([
            modelview_core::glam::Vec3::new(-1.0, 0.0, -1.0),
            modelview_core::glam::Vec3::new(1.0, 2.0, 1.0),
        ])
        .unwrap();
        let fit = camera_fit(&bounds);
        let mut settings = CameraSettings::default();
        settings.apply_fit(&fit);

        let eye = settings.eye();
        let expected = Vec3::from_array(fit.position.to_array());
        assert!((eye - expected).length() < 1e-3, "{eye:?} vs {expected:?}");
        assert_eq!(settings.target_distance, settings.distance);
    }
}
