//! Subcommand implementations

pub mod config;
pub mod credentials;
pub mod evaluate;

use quill_core::config::{ConfigLoader, EngineConfig};
use std::path::Path;

/// Defaults, then the optional file, then `QUILL_*` variables
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let mut loader = ConfigLoader::new().with_defaults();
    if let Some(path) = path {
        loader = loader.with_file(path);
    }
    Ok(loader.with_env().load()?)
}
