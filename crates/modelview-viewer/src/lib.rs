//! Modelview Viewer - Browser glTF viewer
//!
//! Loads a model from `?model=`, a local file or the remote store, renders it
//! with Bevy and exposes the live property inspector through egui.

mod app;
mod file_loader;
mod scene;
mod ui;

use wasm_bindgen::prelude::*;

/// WASM entry point
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();

    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(tracing::Level::WARN)
            .build(),
    );

    app::run();
}
