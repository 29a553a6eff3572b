//! Modelview Core - Model inspection and live-editing pipeline
//!
//! This crate holds everything the viewer does that does not need a GPU:
//! - glTF loading into an arena scene graph
//! - Dimension analysis and camera fitting
//! - Hierarchy walking, ray picking and hover highlighting
//! - Single-clip animation playback
//! - Property inspector panel descriptors and typed edits
//! - glTF export and the object-store bridge contract
//! - The [`Session`] tying it all together per frame

pub mod animation;
pub mod color;
pub mod config;
pub mod dimensions;
pub mod export;
pub mod hierarchy;
pub mod inspector;
pub mod loader;
pub mod picking;
pub mod scene_graph;
pub mod session;
pub mod storage;

pub use glam;

pub use animation::{AnimationClip, AnimationController};
pub use color::Rgb;
pub use config::{ExportConfig, StoreConfig, ViewerConfig};
pub use dimensions::{CameraFit, Dimensions};
pub use export::{export_gltf, ExportError};
pub use hierarchy::HierarchyWalker;
pub use inspector::{Binding, EditError, EditValue, LightConfig, LightKind, Panel, SceneConfig};
pub use loader::{load_gltf, LoadedModel, ModelError};
pub use picking::{CameraView, Ray};
pub use scene_graph::{NodeId, SceneGraph};
pub use session::{LoadOutcome, LoadTicket, Notice, Session};
pub use storage::{ObjectRef, ObjectStore, RemoteFileEntry, StorageError};
