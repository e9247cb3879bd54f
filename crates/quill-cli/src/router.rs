//! Command routing logic for CLI

use quill_core::EngineConfig;

use crate::args::{Cli, Commands};
use crate::commands;

/// Route CLI commands to their respective handlers
pub async fn route(cli: Cli, config: EngineConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Evaluate {
            credentials,
            task,
            file,
            credential,
            locale,
            topic,
            word_count,
        } => {
            commands::evaluate::run(
                config,
                commands::evaluate::EvaluateOptions {
                    credentials,
                    task,
                    file,
                    credential,
                    locale,
                    topic,
                    word_count,
                },
            )
            .await
        }
        Commands::Credentials { credentials } => {
            commands::credentials::list(&config, &credentials).await
        }
        Commands::Config => commands::config::show(&config),
    }
}
