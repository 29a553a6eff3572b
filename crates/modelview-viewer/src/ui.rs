//! Inspector and toolbar overlays using bevy_egui

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use std::collections::HashMap;

use modelview_core::inspector::{Control, ControlKind, Folder};
use modelview_core::{Binding, EditValue, NodeId, Rgb};

use crate::app::{UiState, ViewerSession};
use crate::file_loader::{
    create_file_picker, download_model, load_from_url, prompt_file_name, upload_model, PendingLoad,
};

/// Grouped system parameters for the UI system
#[derive(SystemParam)]
pub struct UiParams<'w, 's> {
    pub contexts: EguiContexts<'w, 's>,
    pub session: ResMut<'w, ViewerSession>,
    pub ui_state: ResMut<'w, UiState>,
    pub pending: Res<'w, PendingLoad>,
}

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, handle_deselection)
            // bevy_egui 0.38+ draws in its own schedule
            .add_systems(EguiPrimaryContextPass, ui_system);
    }
}

/// What the user asked for during one UI pass
#[derive(Debug, Clone, PartialEq)]
enum UiAction {
    Edit(Binding, EditValue),
    Select(Option<NodeId>),
    OpenFile,
    LoadRemote(String),
    TogglePlayback,
    FitCamera,
    ExportLocal,
    ExportRemote,
}

/// Escape clears the selection
fn handle_deselection(mut session: ResMut<ViewerSession>, keyboard: Res<ButtonInput<KeyCode>>) {
    if keyboard.just_pressed(KeyCode::Escape) {
        session.select(None);
    }
}

fn ui_system(mut params: UiParams) {
    let UiParams {
        contexts,
        session,
        ui_state,
        pending,
    } = &mut params;

    let Ok(ctx) = contexts.ctx_mut() else { return };

    let mut actions = Vec::new();
    let loading = session.is_loading();
    let has_model = session.has_model();
    let can_play = session.animation().mixer().is_some();
    let playing = session.is_playing();
    let store_enabled = session.config().store.is_enabled();
    let local_default = session.config().export.local_name.clone();
    let remote_files = session.remote_files().to_vec();
    let selected = session.selected();

    egui::SidePanel::right("inspector")
        .default_width(320.0)
        .resizable(true)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.heading("Model Viewer");
                ui.separator();

                ui.horizontal(|ui| {
                    if ui.button("Load File").clicked() {
                        actions.push(UiAction::OpenFile);
                    }
                    if loading {
                        ui.spinner();
                        ui.label("Loading...");
                    }
                });

                if !remote_files.is_empty() {
                    egui::ComboBox::from_id_salt("remote_files")
                        .selected_text("Remote models")
                        .show_ui(ui, |ui| {
                            for entry in &remote_files {
                                if ui.selectable_label(false, entry.name.as_str()).clicked() {
                                    actions.push(UiAction::LoadRemote(entry.url.clone()));
                                }
                            }
                        });
                }

                ui.horizontal(|ui| {
                    let label = if playing { "Pause" } else { "Play" };
                    if ui.add_enabled(can_play, egui::Button::new(label)).clicked() {
                        actions.push(UiAction::TogglePlayback);
                    }
                    if ui.add_enabled(has_model, egui::Button::new("Fit View")).clicked() {
                        actions.push(UiAction::FitCamera);
                    }
                });

                ui.add(
                    egui::TextEdit::singleline(&mut ui_state.export_name)
                        .hint_text(local_default.as_str()),
                );
                ui.horizontal(|ui| {
                    if ui.add_enabled(has_model, egui::Button::new("Export")).clicked() {
                        actions.push(UiAction::ExportLocal);
                    }
                    let upload = egui::Button::new("Export to Cloud");
                    if ui.add_enabled(has_model && store_enabled, upload).clicked() {
                        actions.push(UiAction::ExportRemote);
                    }
                });
                ui.separator();

                let (main, mesh) = session.panels();
                for folder in &main.folders {
                    folder_ui(ui, folder, selected, &mut ui_state.drafts, &mut actions);
                }
                if let Some(mesh) = mesh {
                    ui.separator();
                    for folder in &mesh.folders {
                        folder_ui(ui, folder, selected, &mut ui_state.drafts, &mut actions);
                    }
                }
            });
        });

    for action in actions {
        match action {
            UiAction::Edit(binding, value) => {
                if let Err(e) = session.apply_edit(binding, value) {
                    tracing::warn!("Edit of {:?} rejected: {}", binding, e);
                }
            }
            UiAction::Select(node) => session.select(node),
            UiAction::OpenFile => create_file_picker(pending),
            UiAction::LoadRemote(url) => load_from_url(session, pending, url),
            UiAction::TogglePlayback => {
                session.toggle_playback();
            }
            UiAction::FitCamera => {
                session.request_camera_fit();
            }
            UiAction::ExportLocal => download_model(session, Some(ui_state.export_name.as_str())),
            UiAction::ExportRemote => {
                let default = session.config().export.remote_name.clone();
                let name = prompt_file_name(&default);
                upload_model(session, pending, name.as_deref());
            }
        }
    }
}

fn folder_ui(
    ui: &mut egui::Ui,
    folder: &Folder,
    selected: Option<NodeId>,
    drafts: &mut HashMap<Binding, String>,
    actions: &mut Vec<UiAction>,
) {
    if let Some(node) = folder.node {
        hierarchy_ui(ui, folder, node, selected, actions);
        return;
    }
    egui::CollapsingHeader::new(folder.title.as_str())
        .default_open(folder.open)
        .show(ui, |ui| {
            for control in &folder.controls {
                control_ui(ui, control, drafts, actions);
            }
            for child in &folder.folders {
                folder_ui(ui, child, selected, drafts, actions);
            }
        });
}

/// Hierarchy entries: the label selects, the arrow expands
fn hierarchy_ui(
    ui: &mut egui::Ui,
    folder: &Folder,
    node: NodeId,
    selected: Option<NodeId>,
    actions: &mut Vec<UiAction>,
) {
    let is_selected = selected == Some(node);
    if folder.folders.is_empty() {
        if ui.selectable_label(is_selected, folder.title.as_str()).clicked() {
            actions.push(UiAction::Select(Some(node)));
        }
        return;
    }

    let id = ui.make_persistent_id(node);
    egui::collapsing_header::CollapsingState::load_with_default_open(ui.ctx(), id, true)
        .show_header(ui, |ui| {
            if ui.selectable_label(is_selected, folder.title.as_str()).clicked() {
                actions.push(UiAction::Select(Some(node)));
            }
        })
        .body(|ui| {
            for child in &folder.folders {
                if let Some(child_node) = child.node {
                    hierarchy_ui(ui, child, child_node, selected, actions);
                }
            }
        });
}

fn control_ui(
    ui: &mut egui::Ui,
    control: &Control,
    drafts: &mut HashMap<Binding, String>,
    actions: &mut Vec<UiAction>,
) {
    let binding = control.binding;
    ui.horizontal(|ui| {
        ui.label(control.label.as_str());
        match &control.kind {
            ControlKind::Choice { options, selected } => {
                let mut choice = *selected;
                let current = options.get(choice).map(String::as_str).unwrap_or("-");
                egui::ComboBox::from_id_salt(binding)
                    .selected_text(current)
                    .show_ui(ui, |ui| {
                        for (i, option) in options.iter().enumerate() {
                            ui.selectable_value(&mut choice, i, option.as_str());
                        }
                    });
                if choice != *selected {
                    actions.push(UiAction::Edit(binding, EditValue::Choice(choice)));
                }
            }
            ControlKind::Color(css) => {
                let Ok(rgb) = Rgb::parse(css) else {
                    ui.label(css.as_str());
                    return;
                };
                let mut srgb = rgb.to_u8();
                if ui.color_edit_button_srgb(&mut srgb).changed() {
                    let [r, g, b] = srgb;
                    let css = Rgb::from_u8(r, g, b).to_css();
                    actions.push(UiAction::Edit(binding, EditValue::Text(css)));
                }
            }
            ControlKind::Number {
                value,
                min,
                max,
                step,
            } => {
                let mut v = *value;
                let mut drag = egui::DragValue::new(&mut v)
                    .range(*min..=*max)
                    .speed(step.unwrap_or((max - min) / 200.0));
                if step.is_some() {
                    drag = drag.fixed_decimals(0);
                }
                if ui.add(drag).changed() {
                    actions.push(UiAction::Edit(binding, EditValue::Number(v)));
                }
            }
            ControlKind::Toggle(on) => {
                let mut on = *on;
                if ui.checkbox(&mut on, "").changed() {
                    actions.push(UiAction::Edit(binding, EditValue::Bool(on)));
                }
            }
            ControlKind::Text(value) => {
                let draft = drafts.entry(binding).or_insert_with(|| value.clone());
                let response = ui.text_edit_singleline(draft);
                if response.lost_focus() {
                    if *draft != *value {
                        actions.push(UiAction::Edit(binding, EditValue::Text(draft.clone())));
                    }
                    drafts.remove(&binding);
                } else if !response.has_focus() {
                    // Track outside changes, e.g. a new selection
                    *draft = value.clone();
                }
            }
            ControlKind::Readout(text) => {
                ui.label(text.as_str());
            }
        }
    });
}
