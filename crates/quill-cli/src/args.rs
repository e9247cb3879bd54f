//! CLI argument definitions using clap

use clap::{Parser, Subcommand};
use quill_core::LoggingConfig;
use std::path::PathBuf;

/// Default credentials file name used across all CLI commands.
pub const DEFAULT_CREDENTIALS_FILE: &str = "quill_credentials.json";

#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(about = "Quill - streaming essay evaluation with provider failover")]
#[command(version)]
pub struct Cli {
    /// Engine configuration file (JSON); QUILL_* variables override it
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level or filter directive, used when RUST_LOG is unset
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Logging settings given on the command line. Empty fields leave the
    /// configured value in place when merged.
    pub fn logging_overrides(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone().unwrap_or_default(),
            format: if self.log_json { "json".to_string() } else { String::new() },
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score one essay and stream the session events as JSON lines
    Evaluate {
        /// Credentials file (JSON array)
        #[arg(long, env = "QUILL_CREDENTIALS", default_value = DEFAULT_CREDENTIALS_FILE)]
        credentials: PathBuf,

        /// task1 or task2
        #[arg(long, short)]
        task: String,

        /// Essay text file; reads stdin when omitted
        #[arg(long, short)]
        file: Option<PathBuf>,

        /// Pin the session to one credential id
        #[arg(long)]
        credential: Option<u64>,

        /// Locale for explanations and feedback
        #[arg(long)]
        locale: Option<String>,

        /// Topic identifier recorded with the submission
        #[arg(long)]
        topic: Option<String>,

        /// Override the computed word count
        #[arg(long)]
        word_count: Option<u32>,
    },

    /// List enabled credentials in the order they are tried
    Credentials {
        /// Credentials file (JSON array)
        #[arg(long, env = "QUILL_CREDENTIALS", default_value = DEFAULT_CREDENTIALS_FILE)]
        credentials: PathBuf,
    },

    /// Print the effective engine configuration
    Config,
}
