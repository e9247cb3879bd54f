//! `quill evaluate`

use anyhow::{Context, anyhow, bail};
use futures::StreamExt;
use quill_core::credential::{CredentialId, load_credentials_file};
use quill_core::{EngineConfig, EvaluationRequest, EventPayload, HttpTransport, SessionRegistry};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::signal_handler::SignalHandler;

pub struct EvaluateOptions {
    pub credentials: PathBuf,
    pub task: String,
    pub file: Option<PathBuf>,
    pub credential: Option<u64>,
    pub locale: Option<String>,
    pub topic: Option<String>,
    pub word_count: Option<u32>,
}

/// Whitespace-separated word count
pub fn count_words(text: &str) -> u32 {
    u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX)
}

fn read_essay(file: Option<&PathBuf>) -> anyhow::Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading essay from {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading essay from stdin")?;
            Ok(text)
        }
    }
}

/// Run one session and print its events as JSON lines
pub async fn run(config: EngineConfig, options: EvaluateOptions) -> anyhow::Result<()> {
    let store = load_credentials_file(&options.credentials).with_context(|| {
        format!("loading credentials from {}", options.credentials.display())
    })?;
    let transport = HttpTransport::new(config.connect_timeout)?;
    let registry = SessionRegistry::builder(Arc::new(store), Arc::new(transport))
        .config(config)
        .build()?;

    let content = read_essay(options.file.as_ref())?;
    let word_count = options.word_count.unwrap_or_else(|| count_words(&content));
    let request = EvaluationRequest {
        task_type: options.task,
        topic_id: options.topic,
        content,
        word_count,
        credential_id: options.credential.map(CredentialId),
        locale: options.locale,
    };

    let (session_id, mut events) = registry.start_stream(request)?;
    let mut signals = SignalHandler::new();
    signals.start(registry.clone(), session_id)?;
    info!(session_id = %session_id, word_count, "evaluation started");

    let mut failure = None;
    let mut completed = false;
    while let Some(event) = events.next().await {
        println!("{}", serde_json::to_string(&event)?);
        match &event.payload {
            EventPayload::Complete(_) => completed = true,
            EventPayload::Error(report) => {
                failure = Some(anyhow!("evaluation failed ({}): {}", report.code, report.message));
            }
            _ => {}
        }
    }
    signals.stop();
    registry.shutdown();

    if let Some(error) = failure {
        return Err(error);
    }
    if !completed {
        bail!("evaluation cancelled");
    }
    Ok(())
}
