//! The evaluation pipeline run by every session
//!
//! starting → calling_llm → streaming (per delta) → parsing → score → sentence*
//! → feedback → sending_results → complete

use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::bus::SessionChannel;
use super::events::{CompletionSummary, EventPayload, ProgressStep};
use super::types::{SessionStatus, TaskType};
use crate::config::EngineConfig;
use crate::credential::CredentialId;
use crate::error::{QuillError, QuillResult};
use crate::evaluation::{
    EvaluationRecord, RejectedEvaluation, SharedPromptSource, SharedResultSink, SubmissionMeta,
    validate_response,
};
use crate::interrupt::run_cancellable;
use crate::llm::{CompletionRequest, ProviderOrchestrator};

/// Collaborators shared by every session of a registry
pub(crate) struct EngineContext {
    pub(crate) orchestrator: ProviderOrchestrator,
    pub(crate) prompts: SharedPromptSource,
    pub(crate) sink: SharedResultSink,
    pub(crate) config: EngineConfig,
}

/// Validated input of one session
#[derive(Debug, Clone)]
pub(crate) struct PipelineInput {
    pub(crate) submission: SubmissionMeta,
    pub(crate) pinned: Option<CredentialId>,
    pub(crate) locale: Option<String>,
}

impl PipelineInput {
    fn task_type(&self) -> TaskType {
        self.submission.task_type
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Run the pipeline to completion. On success the channel has already been
/// finished with the `complete` event; errors are finished by the caller.
#[instrument(skip_all, fields(session_id = %channel.id()))]
pub(crate) async fn run(
    channel: Arc<SessionChannel>,
    input: PipelineInput,
    context: Arc<EngineContext>,
    cancel: CancellationToken,
) -> QuillResult<()> {
    let started = Instant::now();
    channel.advance(SessionStatus::Running);
    channel.emit_progress(ProgressStep::Starting);

    let template = run_cancellable(
        &cancel,
        context
            .prompts
            .prompt_for(input.task_type(), input.locale.as_deref()),
    )
    .await?;
    let request = CompletionRequest {
        messages: template.build_messages(&input.submission.content, input.submission.word_count),
        temperature: context.config.temperature.for_task(input.task_type()),
        max_tokens: context.config.max_tokens,
    };

    channel.emit_progress(ProgressStep::CallingLlm);
    let mut on_delta = |_delta: &str| {
        channel.advance(SessionStatus::Streaming);
        channel.emit_progress(ProgressStep::Streaming);
    };
    let outcome = match context
        .orchestrator
        .execute(input.pinned, &request, &cancel, &mut on_delta)
        .await
    {
        Ok(outcome) => outcome,
        Err(failure) => {
            debug!(attempts = failure.path.attempt_count(), "provider orchestration failed");
            return Err(failure.error);
        }
    };
    let credential_id = outcome.credential.id;
    channel.set_credential(credential_id);
    info!(
        credential_id = %credential_id,
        attempts = outcome.path.attempt_count(),
        chars = outcome.text.len(),
        "completion received"
    );

    channel.emit_progress(ProgressStep::Parsing);
    let result = match validate_response(&outcome.text) {
        Ok(result) => result,
        Err(validation) => {
            warn!(violations = validation.violations().len(), "model output rejected");
            let rejected = RejectedEvaluation {
                submission: input.submission.clone(),
                credential_id,
                raw: outcome.text.clone(),
                violations: validation.violations().to_vec(),
            };
            match run_cancellable(&cancel, context.sink.persist_failure(&rejected)).await {
                Ok(()) => {}
                Err(QuillError::Cancelled) => return Err(QuillError::Cancelled),
                Err(error) => warn!(error = %error, "failed to persist rejected output"),
            }
            return Err(QuillError::Validation(validation));
        }
    };

    channel.emit(EventPayload::Score(result.scores));
    for sentence in &result.sentences {
        channel.emit(EventPayload::Sentence(sentence.clone()));
    }
    if let Some(feedback) = &result.overall_feedback {
        channel.emit(EventPayload::Feedback(feedback.clone()));
    }

    channel.emit_progress(ProgressStep::SendingResults);
    let record = EvaluationRecord {
        submission: input.submission,
        credential_id,
        model: outcome.credential.model.clone(),
        result,
        provider_path: outcome.path.clone(),
        duration_ms: elapsed_ms(started),
    };
    match run_cancellable(&cancel, context.sink.persist(&record)).await {
        Ok(()) => {}
        Err(QuillError::Cancelled) => return Err(QuillError::Cancelled),
        Err(error) => warn!(error = %error, "failed to persist evaluation"),
    }

    let summary = CompletionSummary {
        credential_id,
        provider_path: outcome.path,
        duration_ms: elapsed_ms(started),
    };
    if channel.finish(SessionStatus::Completed, Some(EventPayload::Complete(summary))) {
        info!(duration_ms = record.duration_ms, "evaluation completed");
    }
    Ok(())
}
