//! CLI commands.

pub mod config;
pub mod dump;
pub mod layout;
pub mod parse;
mod teach;

use std::path::PathBuf;

use tracing::debug;

use layex_core::LayexConfig;

/// Configuration file location: the `--config` argument or the user default.
pub(crate) fn config_path(explicit: Option<&str>) -> PathBuf {
    match explicit {
        Some(path) => PathBuf::from(path),
        None => dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("layex")
            .join("config.json"),
    }
}

/// Load configuration, falling back to defaults when the file does not exist.
pub(crate) fn load_config(explicit: Option<&str>) -> anyhow::Result<LayexConfig> {
    let path = config_path(explicit);
    if path.exists() {
        debug!("Loading configuration from {}", path.display());
        Ok(LayexConfig::from_file(&path)?)
    } else {
        debug!("No configuration at {}, using defaults", path.display());
        Ok(LayexConfig::default())
    }
}
