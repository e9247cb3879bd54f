//! Keyed registry of live evaluation sessions
//!
//! The registry owns every live session: its channel (status, event log,
//! subscribers), its interrupt switch and its deadline timer. A session leaves the
//! registry as soon as it reaches a terminal state.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::builder::SessionRegistryBuilder;
use super::bus::{EventStream, SessionChannel, Subscription};
use super::events::{ErrorReport, EvaluationEvent, EventPayload};
use super::pipeline::{self, EngineContext, PipelineInput};
use super::types::{EvaluationRequest, SessionId, SessionInfo, SessionStatus};
use crate::config::EngineConfig;
use crate::credential::SharedCredentialStore;
use crate::error::{QuillError, QuillResult};
use crate::evaluation::SubmissionMeta;
use crate::interrupt::{InterruptReason, SessionInterrupt};
use crate::llm::SharedTransport;

#[derive(Clone)]
struct LiveSession {
    channel: Arc<SessionChannel>,
    interrupt: SessionInterrupt,
}

type SessionMap = Arc<DashMap<SessionId, LiveSession>>;

/// Coordinator for evaluation sessions. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: SessionMap,
    context: Arc<EngineContext>,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("live_sessions", &self.sessions.len())
            .field("config", &self.context.config)
            .finish_non_exhaustive()
    }
}

impl SessionRegistry {
    pub fn builder(store: SharedCredentialStore, transport: SharedTransport) -> SessionRegistryBuilder {
        SessionRegistryBuilder::new(store, transport)
    }

    pub(crate) fn from_context(context: EngineContext) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            context: Arc::new(context),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.context.config
    }

    /// Validate `request`, create the session and launch its pipeline.
    ///
    /// Returns as soon as the pipeline is spawned. Must be called from within a
    /// Tokio runtime. A session that fails fast may already be gone by the time
    /// [`subscribe`](Self::subscribe) is called; use [`start_stream`](Self::start_stream)
    /// or [`start_with`](Self::start_with) to observe every event.
    pub fn start(&self, request: EvaluationRequest) -> QuillResult<SessionId> {
        self.launch(request, |_, _| Some(())).map(|(id, ())| id)
    }

    /// Start a session with a stream attached before the pipeline runs
    pub fn start_stream(&self, request: EvaluationRequest) -> QuillResult<(SessionId, EventStream)> {
        self.launch(request, |channel, _| channel.stream())
    }

    /// Start a session with `handler` attached before the pipeline runs
    pub fn start_with<F>(
        &self,
        request: EvaluationRequest,
        handler: F,
    ) -> QuillResult<(SessionId, Subscription)>
    where
        F: FnMut(EvaluationEvent) + Send + 'static,
    {
        self.launch(request, move |channel, runtime| channel.subscribe(runtime, handler))
    }

    fn launch<T>(
        &self,
        request: EvaluationRequest,
        attach: impl FnOnce(&Arc<SessionChannel>, &Handle) -> Option<T>,
    ) -> QuillResult<(SessionId, T)> {
        let task_type = request.validate()?;
        let runtime = Handle::try_current()
            .map_err(|_| QuillError::internal("start requires a running Tokio runtime"))?;

        let id = SessionId::new();
        let channel = Arc::new(SessionChannel::new(
            id,
            task_type,
            request.topic_id.clone(),
            request.word_count,
        ));
        // Attach while the session is still pending so nothing can be missed
        let attached = attach(&channel, &runtime)
            .ok_or_else(|| QuillError::internal("failed to attach session subscriber"))?;
        let interrupt = SessionInterrupt::new();
        self.sessions.insert(
            id,
            LiveSession {
                channel: channel.clone(),
                interrupt: interrupt.clone(),
            },
        );

        let timer = runtime.spawn(deadline_timer(
            self.sessions.clone(),
            channel.clone(),
            interrupt.clone(),
            self.context.config.session_timeout,
        ));
        channel.set_deadline_timer(timer.abort_handle());

        let input = PipelineInput {
            submission: SubmissionMeta {
                session_id: id,
                task_type,
                topic_id: request.topic_id,
                content: request.content,
                word_count: request.word_count,
                submitted_at: Utc::now(),
            },
            pinned: request.credential_id,
            locale: request.locale,
        };
        let pipeline = runtime.spawn(pipeline::run(
            channel.clone(),
            input,
            self.context.clone(),
            interrupt.cancellation_token(),
        ));
        runtime.spawn(supervise(self.sessions.clone(), channel, interrupt, pipeline));

        info!(session_id = %id, task_type = %task_type, "session started");
        Ok((id, attached))
    }

    /// Cancel a live session. False for unknown or already finished ids.
    pub fn cancel(&self, id: SessionId) -> bool {
        let Some(session) = self.sessions.get(&id).map(|entry| entry.value().clone()) else {
            return false;
        };
        session.interrupt.interrupt(InterruptReason::UserCancel);
        let cancelled = session.channel.finish(SessionStatus::Cancelled, None);
        self.sessions.remove(&id);
        if cancelled {
            info!(session_id = %id, "session cancelled");
        }
        cancelled
    }

    /// Invoke `handler` for every event of the session, backlog first
    pub fn subscribe<F>(&self, id: SessionId, handler: F) -> QuillResult<Subscription>
    where
        F: FnMut(EvaluationEvent) + Send + 'static,
    {
        let runtime = Handle::try_current()
            .map_err(|_| QuillError::internal("subscribe requires a running Tokio runtime"))?;
        self.channel(id)?
            .subscribe(&runtime, handler)
            .ok_or_else(|| QuillError::session_not_found(id.to_string()))
    }

    /// Stream every event of the session, backlog first
    pub fn subscribe_stream(&self, id: SessionId) -> QuillResult<EventStream> {
        self.channel(id)?
            .stream()
            .ok_or_else(|| QuillError::session_not_found(id.to_string()))
    }

    /// Status of a live session
    pub fn status(&self, id: SessionId) -> Option<SessionStatus> {
        self.sessions.get(&id).map(|entry| entry.channel.status())
    }

    pub fn info(&self, id: SessionId) -> Option<SessionInfo> {
        self.sessions.get(&id).map(|entry| entry.channel.info())
    }

    pub fn active_sessions(&self) -> Vec<SessionInfo> {
        self.sessions
            .iter()
            .map(|entry| entry.channel.info())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Cancel every live session
    pub fn shutdown(&self) {
        let live: Vec<LiveSession> = self.sessions.iter().map(|e| e.value().clone()).collect();
        let count = live.len();
        for session in live {
            session.interrupt.interrupt(InterruptReason::Shutdown);
            session.channel.finish(SessionStatus::Cancelled, None);
            self.sessions.remove(&session.channel.id());
        }
        info!(count, "registry shut down");
    }

    fn channel(&self, id: SessionId) -> QuillResult<Arc<SessionChannel>> {
        self.sessions
            .get(&id)
            .map(|entry| entry.channel.clone())
            .ok_or_else(|| QuillError::session_not_found(id.to_string()))
    }
}

async fn deadline_timer(
    sessions: SessionMap,
    channel: Arc<SessionChannel>,
    interrupt: SessionInterrupt,
    deadline: Duration,
) {
    tokio::time::sleep(deadline).await;
    interrupt.interrupt(InterruptReason::Timeout(deadline));
    let error = interrupt.to_error();
    if channel.finish(
        SessionStatus::TimedOut,
        Some(EventPayload::Error(ErrorReport::from(&error))),
    ) {
        warn!(session_id = %channel.id(), seconds = deadline.as_secs(), "session timed out");
    }
    sessions.remove(&channel.id());
}

/// Turn the pipeline's result, or its panic, into the terminal state
async fn supervise(
    sessions: SessionMap,
    channel: Arc<SessionChannel>,
    interrupt: SessionInterrupt,
    pipeline: JoinHandle<QuillResult<()>>,
) {
    let failure = match pipeline.await {
        Ok(Ok(())) => None,
        Ok(Err(error)) => Some(error),
        Err(join_error) if join_error.is_panic() => {
            error!(session_id = %channel.id(), "evaluation task panicked");
            Some(QuillError::internal("evaluation task panicked"))
        }
        Err(_) => Some(QuillError::Cancelled),
    };

    if let Some(error) = failure {
        let error = if interrupt.is_interrupted() {
            interrupt.to_error()
        } else {
            error
        };
        conclude(&channel, error);
    }
    sessions.remove(&channel.id());
}

fn conclude(channel: &SessionChannel, error: QuillError) {
    let (status, last) = match &error {
        QuillError::Cancelled => (SessionStatus::Cancelled, None),
        QuillError::Timeout { .. } => (
            SessionStatus::TimedOut,
            Some(EventPayload::Error(ErrorReport::from(&error))),
        ),
        _ => (
            SessionStatus::Failed,
            Some(EventPayload::Error(ErrorReport::from(&error))),
        ),
    };
    if channel.finish(status, last) {
        warn!(
            session_id = %channel.id(),
            code = error.code(),
            error = %error,
            "session ended with error"
        );
    }
}
