//! `quill credentials`

use anyhow::Context;
use quill_core::EngineConfig;
use quill_core::credential::{CredentialStore, load_credentials_file};
use std::path::Path;

/// List enabled credentials in failover order
pub async fn list(config: &EngineConfig, credentials: &Path) -> anyhow::Result<()> {
    let store = load_credentials_file(credentials)
        .with_context(|| format!("loading credentials from {}", credentials.display()))?;
    let ranked = store.list_enabled_ordered().await?;

    if ranked.is_empty() {
        println!("No enabled credentials.");
        return Ok(());
    }

    println!(
        "{:<4} {:<6} {:<20} {:<12} {:<28} {:>8} {:>8}",
        "#", "id", "name", "provider", "model", "priority", "failures"
    );
    for (position, credential) in ranked.iter().enumerate() {
        let marker = if position < config.candidate_cap() { "" } else { " (beyond fallback cap)" };
        println!(
            "{:<4} {:<6} {:<20} {:<12} {:<28} {:>8} {:>8}{}{}",
            position + 1,
            credential.id.0,
            credential.name,
            credential.provider,
            credential.model,
            credential.priority,
            credential.failure_count,
            if credential.is_default { " [default]" } else { "" },
            marker,
        );
    }
    Ok(())
}
