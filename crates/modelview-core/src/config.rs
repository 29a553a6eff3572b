//! Configuration shared by the viewer and the CLI

use serde::{Deserialize, Serialize};

use crate::export::{DEFAULT_LOCAL_NAME, DEFAULT_REMOTE_NAME};
use crate::inspector::{LightConfig, SceneConfig};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub export: ExportConfig,
    /// Initial light settings
    #[serde(default)]
    pub light: LightConfig,
    /// Initial scene settings
    #[serde(default)]
    pub scene: SceneConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Object-store REST endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bucket holding the models; empty disables the remote store
    #[serde(default)]
    pub bucket: String,
    /// Prefix models are listed from and uploaded to; empty means the bucket root
    #[serde(default)]
    pub prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            bucket: String::new(),
            prefix: String::new(),
        }
    }
}

impl StoreConfig {
    pub fn is_enabled(&self) -> bool {
        !self.bucket.trim().is_empty()
    }
}

fn default_base_url() -> String {
    "https://firebasestorage.googleapis.com".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// File name used for local downloads when none is given
    #[serde(default = "default_local_name")]
    pub local_name: String,
    /// File name suggested for uploads
    #[serde(default = "default_remote_name")]
    pub remote_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            local_name: default_local_name(),
            remote_name: default_remote_name(),
        }
    }
}

fn default_local_name() -> String {
    DEFAULT_LOCAL_NAME.to_string()
}

fn default_remote_name() -> String {
    DEFAULT_REMOTE_NAME.to_string()
}
