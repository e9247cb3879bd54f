//! `quill config`

use quill_core::EngineConfig;

/// Print the effective configuration as JSON
pub fn show(config: &EngineConfig) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
