//! Quill CLI application
//!
//! Runs one essay evaluation against the configured credential pool and prints
//! every session event as a JSON line on stdout. Logs go to stderr.
//!
//! ```bash
//! quill evaluate --credentials creds.json --task task2 --file essay.txt
//! quill credentials --credentials creds.json
//! quill config
//! ```

mod args;
mod commands;
mod router;
mod signal_handler;

use clap::Parser;
use quill_core::LoggingConfig;
use tracing_subscriber::EnvFilter;

use args::Cli;

fn init_tracing(logging: &LoggingConfig) {
    // RUST_LOG wins over configured levels
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.is_json() {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    let mut logging = config.logging.clone();
    logging.merge(cli.logging_overrides());
    init_tracing(&logging);

    router::route(cli, config).await
}
