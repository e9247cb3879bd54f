//! Builder for session registries

use std::sync::Arc;

use super::pipeline::EngineContext;
use super::registry::SessionRegistry;
use crate::config::EngineConfig;
use crate::credential::SharedCredentialStore;
use crate::error::QuillResult;
use crate::evaluation::{NoopSink, SharedPromptSource, SharedResultSink, StaticPromptSource};
use crate::llm::{OrchestratorConfig, ProviderOrchestrator, SharedTransport};

/// Builder for [`SessionRegistry`]
pub struct SessionRegistryBuilder {
    store: SharedCredentialStore,
    transport: SharedTransport,
    config: EngineConfig,
    prompts: Option<SharedPromptSource>,
    sink: Option<SharedResultSink>,
}

impl SessionRegistryBuilder {
    /// Create a new builder over a credential pool and a transport
    pub fn new(store: SharedCredentialStore, transport: SharedTransport) -> Self {
        Self {
            store,
            transport,
            config: EngineConfig::default(),
            prompts: None,
            sink: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Prompt source; the built-in prompts are used when unset
    pub fn prompts(mut self, prompts: SharedPromptSource) -> Self {
        self.prompts = Some(prompts);
        self
    }

    /// Result sink; results are discarded when unset
    pub fn sink(mut self, sink: SharedResultSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Validate the configuration and build the registry
    pub fn build(self) -> QuillResult<SessionRegistry> {
        self.config.validate()?;
        let orchestrator = ProviderOrchestrator::new(
            self.store,
            self.transport,
            OrchestratorConfig::from(&self.config),
        );
        let context = EngineContext {
            orchestrator,
            prompts: self
                .prompts
                .unwrap_or_else(|| Arc::new(StaticPromptSource::new())),
            sink: self.sink.unwrap_or_else(|| Arc::new(NoopSink)),
            config: self.config,
        };
        Ok(SessionRegistry::from_context(context))
    }
}
