//! Application state for one viewer instance
//!
//! [`Session`] owns the current model slot together with everything derived
//! from it (dimensions, selection, hover, animation, inspector panels).
//! Rendering and input live elsewhere and talk to it through a small API:
//!
//! - `begin_load` / `complete_load` for asynchronous model loads
//! - `frame` once per rendered frame
//! - `apply_edit` for inspector changes
//! - `main_panel` / `mesh_panel` for the panel descriptors

use tracing::{debug, error, info, warn};

use crate::animation::{AnimationClip, AnimationController};
use crate::config::{StoreConfig, ViewerConfig};
use crate::dimensions::{analyze, CameraFit, Dimensions, Measurement};
use crate::export::{export_gltf, file_name, ExportError};
use crate::inspector::{
    apply_light_edit, apply_mesh_edit, apply_scene_edit, build_main_panel, build_mesh_panel,
    Binding, BindingScope, EditError, EditValue, LightConfig, Panel, SceneConfig,
};
use crate::loader::{LoadedModel, ModelError};
use crate::picking::{HoverState, PickResolver, Ray};
use crate::scene_graph::{NodeId, SceneGraph};
use crate::storage::{Listing, RemoteFileEntry, StorageError};

/// Identifies one requested load; only the latest ticket is honored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Applied,
    /// A newer load was requested before this one finished
    Stale,
    Failed(String),
}

/// Message surfaced to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::Info(m) | Notice::Error(m) => m,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub hovered: Option<NodeId>,
    pub selected: Option<NodeId>,
}

/// A serialized export ready to download or upload
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedFile {
    pub name: String,
    pub contents: String,
}

#[derive(Debug)]
struct ModelSlot {
    source: String,
    graph: SceneGraph,
    clips: Vec<AnimationClip>,
}

#[derive(Debug, Default)]
struct Cached<T> {
    version: u64,
    value: T,
}

pub struct Session {
    config: ViewerConfig,
    light: LightConfig,
    scene: SceneConfig,
    model: Option<ModelSlot>,
    generation: u64,
    loading: bool,
    selected: Option<NodeId>,
    picker: PickResolver,
    animation: AnimationController,
    measurement: Measurement,
    analyses: u64,
    pending_fit: Option<CameraFit>,
    main_version: u64,
    mesh_version: u64,
    main_panel: Cached<Panel>,
    mesh_panel: Cached<Option<Panel>>,
    main_builds: u64,
    mesh_builds: u64,
    remote_files: Vec<RemoteFileEntry>,
    notices: Vec<Notice>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ViewerConfig::default())
    }
}

impl Session {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            light: config.light.clone(),
            scene: config.scene.clone(),
            config,
            model: None,
            generation: 0,
            loading: false,
            selected: None,
            picker: PickResolver::default(),
            animation: AnimationController::default(),
            measurement: Measurement::default(),
            analyses: 0,
            pending_fit: None,
            // Caches start one version behind so the first request builds
            main_version: 1,
            mesh_version: 1,
            main_panel: Cached::default(),
            mesh_panel: Cached::default(),
            main_builds: 0,
            mesh_builds: 0,
            remote_files: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Store settings, adjustable before the first listing
    pub fn store_mut(&mut self) -> &mut StoreConfig {
        &mut self.config.store
    }

    pub fn light(&self) -> &LightConfig {
        &self.light
    }

    pub fn scene(&self) -> &SceneConfig {
        &self.scene
    }

    pub fn graph(&self) -> Option<&SceneGraph> {
        self.model.as_ref().map(|m| &m.graph)
    }

    pub fn clips(&self) -> &[AnimationClip] {
        self.model.as_ref().map(|m| m.clips.as_slice()).unwrap_or(&[])
    }

    /// Where the current model came from (file name or URL)
    pub fn source(&self) -> Option<&str> {
        self.model.as_ref().map(|m| m.source.as_str())
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    // ---- Loading ----

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a load; any earlier ticket becomes stale
    pub fn begin_load(&mut self, source: &str) -> LoadTicket {
        self.generation += 1;
        self.loading = true;
        info!(source, generation = self.generation, "Loading model");
        LoadTicket(self.generation)
    }

    /// Deliver the result of a load started with `begin_load`
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        source: &str,
        result: Result<LoadedModel, ModelError>,
    ) -> LoadOutcome {
        if ticket.0 != self.generation {
            debug!(
                source,
                ticket = ticket.0,
                current = self.generation,
                "Discarding stale load result"
            );
            return LoadOutcome::Stale;
        }
        self.loading = false;
        match result {
            Ok(model) => {
                self.replace_model(source, model);
                LoadOutcome::Applied
            }
            Err(e) => {
                error!(source, error = %e, "Failed to load model");
                let message = format!("Failed to load model: {e}");
                self.notices.push(Notice::Error(message.clone()));
                LoadOutcome::Failed(message)
            }
        }
    }

    /// Attach a model, releasing the previous one first
    pub fn replace_model(&mut self, source: &str, model: LoadedModel) {
        self.release_model();

        let LoadedModel { mut graph, clips } = model;
        if self.scene.wireframe {
            graph.for_each_material(|m| m.wireframe = true);
        }
        self.animation.attach(&clips);
        self.measurement = analyze(&graph);
        self.analyses += 1;
        self.pending_fit = self.measurement.camera_fit;
        info!(
            source,
            width = self.measurement.dimensions.width,
            height = self.measurement.dimensions.height,
            depth = self.measurement.dimensions.depth,
            "Model attached"
        );
        self.model = Some(ModelSlot {
            source: source.to_string(),
            graph,
            clips,
        });
        self.main_version += 1;
        self.mesh_version += 1;
    }

    /// Detach the current model
    pub fn unload(&mut self) {
        if self.model.is_some() {
            self.release_model();
            self.measurement = Measurement::default();
            self.main_version += 1;
            self.mesh_version += 1;
        }
    }

    fn release_model(&mut self) {
        self.animation.release();
        self.picker.reset();
        self.selected = None;
        self.pending_fit = None;
        if let Some(old) = self.model.take() {
            debug!(source = %old.source, nodes = old.graph.len(), "Released model");
        }
    }

    // ---- Dimensions / camera ----

    pub fn dimensions(&self) -> Dimensions {
        self.measurement.dimensions
    }

    pub fn measurement(&self) -> &Measurement {
        &self.measurement
    }

    /// How many times dimensions have been computed
    pub fn analysis_count(&self) -> u64 {
        self.analyses
    }

    /// Re-measure the current model and queue a camera fit. No-op without a
    /// model.
    pub fn request_camera_fit(&mut self) -> bool {
        let Some(model) = self.model.as_ref() else {
            return false;
        };
        self.measurement = analyze(&model.graph);
        self.analyses += 1;
        self.pending_fit = self.measurement.camera_fit;
        self.main_version += 1;
        self.pending_fit.is_some()
    }

    /// Camera placement the renderer should apply, consumed once
    pub fn take_camera_fit(&mut self) -> Option<CameraFit> {
        self.pending_fit.take()
    }

    // ---- Per-frame driver ----

    /// Run one frame: pick/hover resolution first, then animation.
    /// `ray` is `None` while the pointer is outside the viewport.
    pub fn frame(&mut self, ray: Option<Ray>, clicked: bool, delta: f32) {
        let Some(model) = self.model.as_mut() else {
            return;
        };
        self.picker.update(&mut model.graph, ray.as_ref());
        if clicked {
            if let Some(node) = self.picker.click() {
                self.select(Some(node));
            }
        }
        if let Some(model) = self.model.as_mut() {
            self.animation.tick(&mut model.graph, delta);
        }
    }

    pub fn hover_state(&self) -> HoverState {
        self.picker.state()
    }

    pub fn selection(&self) -> SelectionState {
        SelectionState {
            hovered: self.picker.hovered(),
            selected: self.selected(),
        }
    }

    /// Selected node, if it still resolves in the current graph
    pub fn selected(&self) -> Option<NodeId> {
        let graph = self.graph()?;
        self.selected.filter(|id| graph.contains(*id))
    }

    pub fn select(&mut self, node: Option<NodeId>) {
        let node = node.filter(|id| self.graph().is_some_and(|g| g.contains(*id)));
        if node != self.selected {
            debug!(?node, "Selection changed");
            self.selected = node;
            self.mesh_version += 1;
        }
    }

    // ---- Inspector ----

    /// Apply one inspector edit and bump the versions of the affected panels
    pub fn apply_edit(&mut self, binding: Binding, value: EditValue) -> Result<(), EditError> {
        match binding.scope() {
            BindingScope::Light => {
                apply_light_edit(&mut self.light, binding, &value)?;
                self.main_version += 1;
            }
            BindingScope::Scene => {
                let graph = self.model.as_mut().map(|m| &mut m.graph);
                apply_scene_edit(&mut self.scene, graph, binding, &value)?;
                self.main_version += 1;
                if binding == Binding::SceneWireframe {
                    self.mesh_version += 1;
                }
            }
            BindingScope::Mesh => {
                let node = self.selected().ok_or(EditError::NoSelection)?;
                let model = self.model.as_mut().ok_or(EditError::NoSelection)?;
                apply_mesh_edit(&mut model.graph, node, binding, &value)?;
                self.mesh_version += 1;
                if binding == Binding::MeshName {
                    self.main_version += 1;
                }
            }
            BindingScope::ReadOnly => return Err(EditError::ReadOnly(binding)),
        }
        debug!(?binding, ?value, "Applied edit");
        Ok(())
    }

    fn refresh_main_panel(&mut self) {
        if self.main_panel.version != self.main_version {
            self.main_panel = Cached {
                version: self.main_version,
                value: build_main_panel(
                    &self.light,
                    &self.scene,
                    &self.measurement.dimensions,
                    self.model.as_ref().map(|m| &m.graph),
                ),
            };
            self.main_builds += 1;
        }
    }

    fn refresh_mesh_panel(&mut self) {
        if self.mesh_panel.version != self.mesh_version {
            let panel = match (self.selected(), self.graph()) {
                (Some(node), Some(graph)) => build_mesh_panel(graph, node),
                _ => None,
            };
            self.mesh_panel = Cached {
                version: self.mesh_version,
                value: panel,
            };
            self.mesh_builds += 1;
        }
    }

    /// The main panel, rebuilt only when its inputs changed
    pub fn main_panel(&mut self) -> &Panel {
        self.refresh_main_panel();
        &self.main_panel.value
    }

    /// The selected mesh's panel, rebuilt on selection or mesh changes
    pub fn mesh_panel(&mut self) -> Option<&Panel> {
        self.refresh_mesh_panel();
        self.mesh_panel.value.as_ref()
    }

    /// Both panels at once, for renderers that draw them side by side
    pub fn panels(&mut self) -> (&Panel, Option<&Panel>) {
        self.refresh_main_panel();
        self.refresh_mesh_panel();
        (&self.main_panel.value, self.mesh_panel.value.as_ref())
    }

    /// Number of (main, mesh) panel rebuilds so far
    pub fn panel_builds(&self) -> (u64, u64) {
        (self.main_builds, self.mesh_builds)
    }

    // ---- Animation ----

    pub fn is_playing(&self) -> bool {
        self.animation.is_playing()
    }

    pub fn toggle_playback(&mut self) -> bool {
        let playing = self.animation.toggle();
        info!(playing, "Animation playback toggled");
        playing
    }

    pub fn animation(&self) -> &AnimationController {
        &self.animation
    }

    // ---- Remote store ----

    pub fn remote_files(&self) -> &[RemoteFileEntry] {
        &self.remote_files
    }

    pub fn set_remote_listing(&mut self, result: Result<Listing, StorageError>) {
        match result {
            Ok(listing) => {
                if !listing.failures.is_empty() {
                    let names: Vec<_> = listing.failures.iter().map(|f| f.name.as_str()).collect();
                    warn!(count = names.len(), "Some remote models are unavailable");
                    self.notices.push(Notice::Error(format!(
                        "Could not resolve: {}",
                        names.join(", ")
                    )));
                }
                self.remote_files = listing.entries;
            }
            Err(e) => {
                error!(error = %e, "Failed to list remote models");
                self.notices
                    .push(Notice::Error(format!("Failed to list remote models: {e}")));
            }
        }
    }

    // ---- Export ----

    /// Serialize the live model with any hover highlight removed.
    /// `Ok(None)` when no model is loaded.
    pub fn export_document(&mut self) -> Result<Option<String>, ExportError> {
        let Some(model) = self.model.as_mut() else {
            debug!("Export requested without a model");
            return Ok(None);
        };
        let clips = &model.clips;
        self.picker
            .with_highlight_reverted(&mut model.graph, |graph| export_gltf(graph, clips))
            .map(Some)
    }

    /// Export for a local download
    pub fn export_local(&mut self, name: Option<&str>) -> Result<Option<ExportedFile>, ExportError> {
        let default = self.config.export.local_name.clone();
        self.export_named(name, &default)
    }

    /// Export for an upload to the object store
    pub fn export_remote(&mut self, name: Option<&str>) -> Result<Option<ExportedFile>, ExportError> {
        let default = self.config.export.remote_name.clone();
        self.export_named(name, &default)
    }

    fn export_named(
        &mut self,
        name: Option<&str>,
        default: &str,
    ) -> Result<Option<ExportedFile>, ExportError> {
        let result = self.export_document();
        if let Err(e) = &result {
            error!(error = %e, "Export failed");
            self.notices.push(Notice::Error(format!("Export failed: {e}")));
        }
        Ok(result?.map(|contents| ExportedFile {
            name: file_name(name, default),
            contents,
        }))
    }

    /// Record the outcome of an upload as a notice
    pub fn record_upload(&mut self, result: Result<String, StorageError>) {
        match result {
            Ok(message) => self.notices.push(Notice::Info(message)),
            Err(e) => {
                error!(error = %e, "Upload failed");
                self.notices.push(Notice::Error(format!("Upload failed: {e}")));
            }
        }
    }

    // ---- Notices ----

    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}
