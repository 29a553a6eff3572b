//! Configuration loading

use anyhow::{Context, Result};
use modelview_core::config::ViewerConfig;
use std::path::Path;
use tracing::info;

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<ViewerConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ViewerConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(ViewerConfig::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let mut config = ViewerConfig::default();
    config.store.bucket = "my-project.appspot.com".to_string();
    let content = toml::to_string_pretty(&config)?;
    std::fs::write(path, content)?;
    Ok(())
}
