//! Ctrl+C handling for a running evaluation

use futures::stream::StreamExt;
use quill_core::{SessionId, SessionRegistry};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use tokio::task::JoinHandle;
use tracing::warn;

/// Cancels the watched session when SIGINT or SIGTERM arrives
pub struct SignalHandler {
    /// Handle to the signal handling task
    task_handle: Option<JoinHandle<()>>,
    signals_handle: Option<signal_hook_tokio::Handle>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self {
            task_handle: None,
            signals_handle: None,
        }
    }

    /// Start watching for signals on behalf of `session_id`
    pub fn start(&mut self, registry: SessionRegistry, session_id: SessionId) -> std::io::Result<()> {
        if self.task_handle.is_some() {
            return Ok(());
        }

        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        self.signals_handle = Some(signals.handle());

        let handle = tokio::spawn(async move {
            while let Some(signal) = signals.next().await {
                if signal == SIGINT || signal == SIGTERM {
                    if registry.cancel(session_id) {
                        eprintln!("\nEvaluation cancelled.");
                    } else {
                        warn!(session_id = %session_id, "signal received after session ended");
                    }
                }
            }
        });

        self.task_handle = Some(handle);
        Ok(())
    }

    /// Stop signal handling
    pub fn stop(&mut self) {
        if let Some(handle) = self.signals_handle.take() {
            handle.close();
        }
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

impl Drop for SignalHandler {
    fn drop(&mut self) {
        self.stop();
    }
}
