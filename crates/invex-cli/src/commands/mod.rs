//! CLI subcommands.

pub mod batch;
pub mod config;
pub mod models;
mod output;
pub mod process;

use std::path::{Path, PathBuf};

use tracing::debug;

use invex_core::OllamaBackend;
use invex_core::models::config::InvexConfig;

/// Location of the user configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("invex")
        .join("config.json")
}

/// Load the configuration from `--config`, else the user file, else defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<InvexConfig> {
    if let Some(path) = config_path {
        return Ok(InvexConfig::from_file(Path::new(path))?);
    }

    let path = default_config_path();
    if path.exists() {
        debug!("Loading configuration from {}", path.display());
        Ok(InvexConfig::from_file(&path)?)
    } else {
        Ok(InvexConfig::default())
    }
}

/// Build the Ollama backend described by the configuration.
///
/// Must be called off the async runtime: the client is blocking.
pub fn build_backend(config: &InvexConfig) -> anyhow::Result<OllamaBackend> {
    let generation = &config.generation;
    let backend = OllamaBackend::new(&generation.base_url, &generation.model, generation.timeout_secs)?;
    Ok(match generation.temperature {
        Some(t) => backend.with_temperature(t),
        None => backend,
    })
}
