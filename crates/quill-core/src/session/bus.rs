//! Per-session event fan-out
//!
//! A [`SessionChannel`] owns the session status, the log of emitted events and the
//! subscriber senders behind one mutex, so a status change and the event that goes
//! with it are observed together. Every subscriber gets its own unbounded channel:
//! emission never waits on a slow reader, and a late subscriber is first replayed
//! the log so it sees the same ordered sequence as an early one.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{trace, warn};

use super::events::{EvaluationEvent, EventPayload, ProgressStep};
use super::types::{SessionId, SessionInfo, SessionStatus, TaskType};
use crate::credential::CredentialId;

/// Ordered event stream for one subscriber. Ends after the terminal event, or when
/// the session is cancelled.
pub type EventStream = UnboundedReceiverStream<EvaluationEvent>;

struct Subscriber {
    id: u64,
    sender: mpsc::UnboundedSender<EvaluationEvent>,
}

struct ChannelState {
    status: SessionStatus,
    credential_id: Option<CredentialId>,
    log: Vec<EvaluationEvent>,
    subscribers: Vec<Subscriber>,
    next_subscriber: u64,
    deadline_timer: Option<AbortHandle>,
}

/// Status, event log and subscribers of one live session
pub(crate) struct SessionChannel {
    id: SessionId,
    created_at: DateTime<Utc>,
    task_type: TaskType,
    topic_id: Option<String>,
    word_count: u32,
    state: Mutex<ChannelState>,
}

impl SessionChannel {
    pub(crate) fn new(
        id: SessionId,
        task_type: TaskType,
        topic_id: Option<String>,
        word_count: u32,
    ) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            task_type,
            topic_id,
            word_count,
            state: Mutex::new(ChannelState {
                status: SessionStatus::Pending,
                credential_id: None,
                log: Vec::new(),
                subscribers: Vec::new(),
                next_subscriber: 0,
                deadline_timer: None,
            }),
        }
    }

    pub(crate) fn id(&self) -> SessionId {
        self.id
    }

    pub(crate) fn status(&self) -> SessionStatus {
        self.state.lock().status
    }

    pub(crate) fn info(&self) -> SessionInfo {
        let state = self.state.lock();
        SessionInfo {
            id: self.id,
            status: state.status,
            created_at: self.created_at,
            task_type: self.task_type,
            topic_id: self.topic_id.clone(),
            word_count: self.word_count,
            credential_id: state.credential_id,
        }
    }

    pub(crate) fn set_deadline_timer(&self, timer: AbortHandle) {
        let mut state = self.state.lock();
        if state.status.is_terminal() {
            timer.abort();
        } else {
            state.deadline_timer = Some(timer);
        }
    }

    pub(crate) fn set_credential(&self, id: CredentialId) {
        self.state.lock().credential_id = Some(id);
    }

    /// Move to a non-terminal status. Returns false if that would go backwards.
    pub(crate) fn advance(&self, next: SessionStatus) -> bool {
        debug_assert!(!next.is_terminal());
        let mut state = self.state.lock();
        if state.status.can_advance_to(next) {
            state.status = next;
            true
        } else {
            false
        }
    }

    /// Deliver a non-terminal event. Dropped once the session is terminal.
    pub(crate) fn emit(&self, payload: EventPayload) -> bool {
        debug_assert!(!payload.is_terminal());
        let mut state = self.state.lock();
        if state.status.is_terminal() {
            trace!(session_id = %self.id, kind = payload.kind(), "dropping event after terminal state");
            return false;
        }
        let event = EvaluationEvent::new(self.id, payload);
        deliver(&mut state, event);
        true
    }

    pub(crate) fn emit_progress(&self, step: ProgressStep) -> bool {
        self.emit(EventPayload::progress(step))
    }

    /// Enter a terminal status exactly once, emitting `last` (if any) as the final
    /// event and closing every subscriber. Returns false if the session had already
    /// finished.
    pub(crate) fn finish(&self, status: SessionStatus, last: Option<EventPayload>) -> bool {
        debug_assert!(status.is_terminal());
        let timer = {
            let mut state = self.state.lock();
            if state.status.is_terminal() {
                return false;
            }
            state.status = status;
            if let Some(payload) = last {
                let event = EvaluationEvent::new(self.id, payload);
                deliver(&mut state, event);
            }
            state.subscribers.clear();
            state.deadline_timer.take()
        };
        if let Some(timer) = timer {
            timer.abort();
        }
        true
    }

    /// Register a subscriber, replaying the log into its channel first.
    /// `None` once the session is terminal.
    fn attach(&self) -> Option<(u64, mpsc::UnboundedReceiver<EvaluationEvent>)> {
        let mut state = self.state.lock();
        if state.status.is_terminal() {
            return None;
        }
        let (sender, receiver) = mpsc::unbounded_channel();
        for event in &state.log {
            if sender.send(event.clone()).is_err() {
                return None;
            }
        }
        let id = state.next_subscriber;
        state.next_subscriber += 1;
        state.subscribers.push(Subscriber { id, sender });
        Some((id, receiver))
    }

    fn detach(&self, subscriber: u64) {
        self.state.lock().subscribers.retain(|s| s.id != subscriber);
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    /// Stream of this session's events
    pub(crate) fn stream(&self) -> Option<EventStream> {
        self.attach()
            .map(|(_, receiver)| UnboundedReceiverStream::new(receiver))
    }

    /// Run `handler` for every event on a dedicated task
    pub(crate) fn subscribe<F>(self: &Arc<Self>, runtime: &Handle, mut handler: F) -> Option<Subscription>
    where
        F: FnMut(EvaluationEvent) + Send + 'static,
    {
        let (id, mut receiver) = self.attach()?;
        let task = runtime.spawn(async move {
            while let Some(event) = receiver.recv().await {
                handler(event);
            }
        });
        Some(Subscription {
            id,
            channel: Arc::downgrade(self),
            task,
        })
    }
}

fn deliver(state: &mut ChannelState, event: EvaluationEvent) {
    // Receivers that were dropped are pruned here
    state
        .subscribers
        .retain(|subscriber| subscriber.sender.send(event.clone()).is_ok());
    state.log.push(event);
}

/// Handle to a callback subscription.
///
/// Dropping it leaves the handler running until the session ends; call
/// [`unsubscribe`](Self::unsubscribe) to stop delivery early.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    channel: Weak<SessionChannel>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Stop delivery. Events still queued for the handler are discarded.
    pub fn unsubscribe(self) {
        if let Some(channel) = self.channel.upgrade() {
            channel.detach(self.id);
        }
        self.task.abort();
    }

    /// Wait until the handler has seen the last event of the session
    pub async fn finished(self) {
        if let Err(error) = self.task.await {
            if error.is_panic() {
                warn!(subscriber = self.id, "event handler panicked");
            }
        }
    }
}
