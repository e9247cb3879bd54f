//! End-to-end session tests through the public registry API

mod common;

use async_trait::async_trait;
use common::{Reply, ScriptedTransport, chunked, collect, credential, labels, store, valid_output};
use parking_lot::Mutex;
use quill_core::config::{BackoffConfig, EngineConfig};
use quill_core::credential::{CredentialId, DecryptedCredential};
use quill_core::error::QuillResult;
use quill_core::evaluation::{EvaluationRecord, RejectedEvaluation};
use quill_core::llm::{CompletionRequest, DeltaSink, ProviderTransport};
use quill_core::{
    CollectingSink, EvaluationEvent, EvaluationRequest, ErrorKind, QuillError, ResultSink,
    SessionRegistry, TaskType,
};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn registry_with(
    store: Arc<quill_core::InMemoryCredentialStore>,
    transport: Arc<ScriptedTransport>,
    sink: Arc<CollectingSink>,
    config: EngineConfig,
) -> SessionRegistry {
    SessionRegistry::builder(store, transport)
        .config(config)
        .sink(sink)
        .build()
        .unwrap()
}

fn essay(task_type: TaskType) -> EvaluationRequest {
    EvaluationRequest::new(task_type, "The chart show the sales. Sales rose steadily.", 180)
        .with_topic("topic-42")
}

fn data_of(events: &[EvaluationEvent], kind: &str) -> Vec<Value> {
    events
        .iter()
        .filter(|e| e.payload.kind() == kind)
        .map(|e| serde_json::to_value(e).unwrap()["data"].clone())
        .collect()
}

#[tokio::test]
async fn test_successful_session_emits_ordered_events() {
    let store = store(vec![credential(1, 0, 2)]);
    let transport = Arc::new(
        ScriptedTransport::new().script(1, vec![Reply::Deltas(chunked(&valid_output(), 4))]),
    );
    let sink = Arc::new(CollectingSink::new());
    let registry = registry_with(store, transport.clone(), sink.clone(), EngineConfig::default());

    let id = registry.start(essay(TaskType::Task1)).unwrap();
    let events = collect(registry.subscribe_stream(id).unwrap()).await;

    let mut expected = vec!["progress:starting", "progress:calling_llm"];
    expected.extend(std::iter::repeat_n("progress:streaming", 4));
    expected.extend([
        "progress:parsing",
        "score",
        "sentence",
        "sentence",
        "feedback",
        "progress:sending_results",
        "complete",
    ]);
    assert_eq!(labels(&events), expected);
    assert!(events.iter().all(|e| e.session_id == id));

    let score = &data_of(&events, "score")[0];
    assert_eq!(score["total_score"], 6.5);
    assert_eq!(data_of(&events, "feedback")[0], "A clear overview.");

    let complete = &data_of(&events, "complete")[0];
    assert_eq!(complete["credentialId"], 1);
    assert_eq!(complete["providerPath"][0]["outcome"], "success");

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].submission.word_count, 180);
    assert_eq!(records[0].submission.topic_id.as_deref(), Some("topic-42"));
    assert_eq!(records[0].result.sentences.len(), 2);
    assert_eq!(transport.temperatures(), vec![0.3]);

    assert!(registry.status(id).is_none());
    assert!(!registry.cancel(id));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_twice_then_success_on_same_credential() {
    let store = store(vec![credential(1, 0, 2)]);
    let transport = Arc::new(ScriptedTransport::new().script(
        1,
        vec![
            Reply::Status(429),
            Reply::Status(429),
            Reply::Deltas(vec![valid_output()]),
        ],
    ));
    let sink = Arc::new(CollectingSink::new());
    let registry = registry_with(store.clone(), transport.clone(), sink, EngineConfig::default());

    let started = Instant::now();
    let id = registry.start(essay(TaskType::Task2)).unwrap();
    let events = collect(registry.subscribe_stream(id).unwrap()).await;

    assert_eq!(transport.calls(), vec![1, 1, 1]);
    let complete = &data_of(&events, "complete")[0];
    let outcomes: Vec<&str> = complete["providerPath"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["outcome"].as_str().unwrap())
        .collect();
    assert_eq!(
        outcomes,
        vec!["retryable_failure", "retryable_failure", "success"]
    );
    assert_eq!(complete["providerPath"][0]["errorKind"], "rate_limited");
    // 500ms after the first failure, 1500ms after the second
    assert!(started.elapsed() >= Duration::from_millis(2000));
    assert_eq!(store.snapshot(CredentialId(1)).unwrap().failure_count, 0);
}

#[tokio::test]
async fn test_invalid_primary_fails_over_to_backup() {
    let store = store(vec![credential(1, 0, 2), credential(2, 1, 2)]);
    let transport = Arc::new(
        ScriptedTransport::new()
            .script(1, vec![Reply::Status(401)])
            .script(2, vec![Reply::Deltas(vec![valid_output()])]),
    );
    let sink = Arc::new(CollectingSink::new());
    let registry = registry_with(store.clone(), transport.clone(), sink.clone(), EngineConfig::default());

    let id = registry.start(essay(TaskType::Task1)).unwrap();
    let events = collect(registry.subscribe_stream(id).unwrap()).await;

    assert_eq!(transport.calls(), vec![1, 2]);
    assert_eq!(labels(&events).last().map(String::as_str), Some("complete"));
    let complete = &data_of(&events, "complete")[0];
    assert_eq!(complete["credentialId"], 2);
    assert_eq!(complete["providerPath"][0]["outcome"], "fatal_failure");
    assert_eq!(complete["providerPath"][0]["errorKind"], "invalid_credential");

    assert_eq!(store.snapshot(CredentialId(1)).unwrap().failure_count, 1);
    assert_eq!(sink.records()[0].credential_id, CredentialId(2));
}

#[tokio::test]
async fn test_out_of_range_score_fails_validation() {
    let mut output: Value = serde_json::from_str(&valid_output()).unwrap();
    output["lexical_resource"] = Value::from(11);
    let raw = output.to_string();

    let store = store(vec![credential(1, 0, 2)]);
    let transport =
        Arc::new(ScriptedTransport::new().script(1, vec![Reply::Deltas(vec![raw.clone()])]));
    let sink = Arc::new(CollectingSink::new());
    let registry = registry_with(store, transport, sink.clone(), EngineConfig::default());

    let id = registry.start(essay(TaskType::Task2)).unwrap();
    let events = collect(registry.subscribe_stream(id).unwrap()).await;

    let kinds = labels(&events);
    assert!(!kinds.iter().any(|k| k == "score" || k == "sentence"));
    assert_eq!(kinds.last().map(String::as_str), Some("error"));

    let error = &data_of(&events, "error")[0];
    assert_eq!(error["code"], "validation_error");
    assert!(error["message"].as_str().unwrap().contains("lexical_resource"));
    assert_eq!(error["detail"]["violations"][0]["path"], "lexical_resource");

    assert!(sink.records().is_empty());
    let rejected = sink.rejected();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].raw, raw);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_connecting_emits_no_error() {
    let store = store(vec![credential(1, 0, 2)]);
    let transport = Arc::new(ScriptedTransport::new().script(
        1,
        vec![Reply::Delayed(Duration::from_secs(5), vec![valid_output()])],
    ));
    let sink = Arc::new(CollectingSink::new());
    let registry = registry_with(store.clone(), transport, sink.clone(), EngineConfig::default());

    let id = registry.start(essay(TaskType::Task1)).unwrap();
    let stream = registry.subscribe_stream(id).unwrap();

    let canceller = registry.clone();
    let cancel_task = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let first = canceller.cancel(id);
        let second = canceller.cancel(id);
        (first, second)
    });

    let started = Instant::now();
    let events = collect(stream).await;
    let (first, second) = cancel_task.await.unwrap();

    assert!(first);
    assert!(!second);
    assert_eq!(
        labels(&events),
        vec!["progress:starting", "progress:calling_llm"]
    );
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(registry.status(id).is_none());
    assert_eq!(store.snapshot(CredentialId(1)).unwrap().failure_count, 0);
    assert!(sink.records().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_does_not_wait_it_out() {
    let config = EngineConfig {
        backoff: BackoffConfig {
            first: Duration::from_secs(30),
            subsequent: Duration::from_secs(30),
        },
        ..Default::default()
    };
    let store = store(vec![credential(1, 0, 2)]);
    let transport = Arc::new(ScriptedTransport::new().script(1, vec![Reply::Status(503)]));
    let registry = registry_with(store, transport.clone(), Arc::new(CollectingSink::new()), config);

    let id = registry.start(essay(TaskType::Task1)).unwrap();
    let stream = registry.subscribe_stream(id).unwrap();

    let canceller = registry.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel(id);
    });

    let started = Instant::now();
    let events = collect(stream).await;

    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!labels(&events).iter().any(|k| k == "error"));
    assert_eq!(transport.calls(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_emits_single_timeout_error() {
    let config = EngineConfig {
        session_timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let store = store(vec![credential(1, 0, 2)]);
    let transport = Arc::new(ScriptedTransport::new().script(1, vec![Reply::Hang]));
    let registry = registry_with(store.clone(), transport, Arc::new(CollectingSink::new()), config);

    let id = registry.start(essay(TaskType::Task2)).unwrap();
    let events = collect(registry.subscribe_stream(id).unwrap()).await;

    let errors = data_of(&events, "error");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["code"], "timeout");
    assert_eq!(labels(&events).last().map(String::as_str), Some("error"));
    assert!(registry.status(id).is_none());
    assert!(!registry.cancel(id));
    assert_eq!(store.snapshot(CredentialId(1)).unwrap().failure_count, 0);
}

#[tokio::test]
async fn test_all_candidates_failing_reports_last_error() {
    let credentials = (1..=5).map(|id| credential(id, id as i32, 0)).collect();
    let store = store(credentials);
    let transport = Arc::new(ScriptedTransport::new());
    let registry = registry_with(store, transport.clone(), Arc::new(CollectingSink::new()), EngineConfig::default());

    let id = registry.start(essay(TaskType::Task1)).unwrap();
    let events = collect(registry.subscribe_stream(id).unwrap()).await;

    assert_eq!(transport.calls(), vec![1, 2, 3]);
    let error = &data_of(&events, "error")[0];
    assert_eq!(error["code"], "server_error");
    assert_eq!(error["detail"]["credentialId"], "3");
}

#[tokio::test]
async fn test_empty_pool_fails_immediately() {
    let registry = registry_with(
        store(Vec::new()),
        Arc::new(ScriptedTransport::new()),
        Arc::new(CollectingSink::new()),
        EngineConfig::default(),
    );

    let id = registry.start(essay(TaskType::Task1)).unwrap();
    let events = collect(registry.subscribe_stream(id).unwrap()).await;

    assert_eq!(
        labels(&events),
        vec!["progress:starting", "progress:calling_llm", "error"]
    );
    assert_eq!(data_of(&events, "error")[0]["code"], "no_usable_credential");
}

#[tokio::test]
async fn test_pinned_credential_disables_fallback() {
    let store = store(vec![credential(1, 0, 0), credential(2, 1, 0)]);
    let transport = Arc::new(ScriptedTransport::new().script(2, vec![Reply::Status(404)]));
    let registry = registry_with(store, transport.clone(), Arc::new(CollectingSink::new()), EngineConfig::default());

    let request = essay(TaskType::Task1).with_credential(CredentialId(2));
    let id = registry.start(request).unwrap();
    let events = collect(registry.subscribe_stream(id).unwrap()).await;

    assert_eq!(transport.calls(), vec![2]);
    assert_eq!(data_of(&events, "error")[0]["code"], "model_not_found");
}

#[tokio::test]
async fn test_callback_and_stream_subscribers_see_same_sequence() {
    let store = store(vec![credential(1, 0, 2)]);
    let transport = Arc::new(
        ScriptedTransport::new().script(1, vec![Reply::Deltas(chunked(&valid_output(), 3))]),
    );
    let registry = registry_with(store, transport, Arc::new(CollectingSink::new()), EngineConfig::default());

    let id = registry.start(essay(TaskType::Task2)).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscription = registry
        .subscribe(id, move |event| sink.lock().push(event))
        .unwrap();
    let streamed = collect(registry.subscribe_stream(id).unwrap()).await;
    subscription.finished().await;

    let called = seen.lock().clone();
    assert_eq!(labels(&called), labels(&streamed));
    assert_eq!(labels(&streamed).last().map(String::as_str), Some("complete"));
}

#[tokio::test]
async fn test_handler_may_cancel_its_own_session() {
    let store = store(vec![credential(1, 0, 2)]);
    let transport = Arc::new(ScriptedTransport::new().script(1, vec![Reply::Hang]));
    let registry = registry_with(store, transport, Arc::new(CollectingSink::new()), EngineConfig::default());

    let id = registry.start(essay(TaskType::Task1)).unwrap();
    let canceller = registry.clone();
    let outcome = Arc::new(Mutex::new(None));
    let slot = outcome.clone();
    let subscription = registry
        .subscribe(id, move |event| {
            if serde_json::to_value(&event).unwrap()["data"]["step"] == "calling_llm" {
                *slot.lock() = Some(canceller.cancel(event.session_id));
            }
        })
        .unwrap();
    subscription.finished().await;

    assert_eq!(*outcome.lock(), Some(true));
    assert_eq!(registry.active_count(), 0);
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let registry = registry_with(
        store(Vec::new()),
        Arc::new(ScriptedTransport::new()),
        Arc::new(CollectingSink::new()),
        EngineConfig::default(),
    );
    let id = quill_core::SessionId::new();

    assert!(!registry.cancel(id));
    let error = registry.subscribe_stream(id).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::SessionNotFound);
    assert!(registry.subscribe(id, |_| {}).is_err());
}

#[tokio::test]
async fn test_invalid_request_is_rejected_synchronously() {
    let registry = registry_with(
        store(vec![credential(1, 0, 2)]),
        Arc::new(ScriptedTransport::new()),
        Arc::new(CollectingSink::new()),
        EngineConfig::default(),
    );

    let mut request = essay(TaskType::Task1);
    request.task_type = "task9".to_string();
    assert!(matches!(
        registry.start(request),
        Err(QuillError::InvalidRequest { .. })
    ));
    let empty = EvaluationRequest::new(TaskType::Task1, "", 10);
    assert_eq!(registry.start(empty).unwrap_err().code(), "invalid_request");
    assert_eq!(registry.active_count(), 0);
}

#[tokio::test]
async fn test_sessions_listed_while_live() {
    let store = store(vec![credential(1, 0, 2)]);
    let transport = Arc::new(ScriptedTransport::new().script(1, vec![Reply::Hang]));
    let registry = registry_with(store, transport, Arc::new(CollectingSink::new()), EngineConfig::default());

    let first = registry.start(essay(TaskType::Task1)).unwrap();
    let second = registry.start(essay(TaskType::Task2)).unwrap();
    let infos = registry.active_sessions();
    assert_eq!(infos.len(), 2);
    assert!(infos.iter().any(|i| i.id == first && i.task_type == TaskType::Task1));

    let stream = registry.subscribe_stream(second).unwrap();
    registry.shutdown();
    assert_eq!(registry.active_count(), 0);
    assert!(!labels(&collect(stream).await).iter().any(|k| k == "error"));
}

struct PanickingTransport;

#[async_trait]
impl ProviderTransport for PanickingTransport {
    async fn stream_completion(
        &self,
        _credential: &DecryptedCredential,
        _request: &CompletionRequest,
        _cancel: &CancellationToken,
        _on_delta: &mut DeltaSink<'_>,
    ) -> QuillResult<()> {
        panic!("transport exploded");
    }
}

#[tokio::test]
async fn test_pipeline_panic_becomes_internal_error() {
    let registry = SessionRegistry::builder(
        store(vec![credential(1, 0, 2)]),
        Arc::new(PanickingTransport),
    )
    .build()
    .unwrap();

    let id = registry.start(essay(TaskType::Task1)).unwrap();
    let events = collect(registry.subscribe_stream(id).unwrap()).await;

    assert_eq!(data_of(&events, "error")[0]["code"], "internal");
    assert!(registry.status(id).is_none());
}

struct FailingSink;

#[async_trait]
impl ResultSink for FailingSink {
    async fn persist(&self, _record: &EvaluationRecord) -> QuillResult<()> {
        Err(QuillError::store("disk full"))
    }

    async fn persist_failure(&self, _rejected: &RejectedEvaluation) -> QuillResult<()> {
        Err(QuillError::store("disk full"))
    }
}

#[tokio::test]
async fn test_sink_failure_does_not_fail_session() {
    let transport = Arc::new(
        ScriptedTransport::new().script(1, vec![Reply::Deltas(vec![valid_output()])]),
    );
    let registry = SessionRegistry::builder(store(vec![credential(1, 0, 2)]), transport)
        .sink(Arc::new(FailingSink))
        .build()
        .unwrap();

    let id = registry.start(essay(TaskType::Task1)).unwrap();
    let events = collect(registry.subscribe_stream(id).unwrap()).await;

    assert_eq!(labels(&events).last().map(String::as_str), Some("complete"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_start_stream_sees_fast_failure() {
    let registry = registry_with(
        store(Vec::new()),
        Arc::new(ScriptedTransport::new()),
        Arc::new(CollectingSink::new()),
        EngineConfig::default(),
    );

    for _ in 0..200 {
        let (id, stream) = registry.start_stream(essay(TaskType::Task1)).unwrap();
        let events = collect(stream).await;

        assert_eq!(labels(&events).first().map(String::as_str), Some("progress:starting"));
        assert_eq!(data_of(&events, "error")[0]["code"], "no_usable_credential");
        assert!(registry.status(id).is_none());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_start_with_handler_sees_fast_failure() {
    let registry = registry_with(
        store(Vec::new()),
        Arc::new(ScriptedTransport::new()),
        Arc::new(CollectingSink::new()),
        EngineConfig::default(),
    );

    for _ in 0..200 {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let (_, subscription) = registry
            .start_with(essay(TaskType::Task2), move |event| sink.lock().push(event))
            .unwrap();
        subscription.finished().await;

        let events = seen.lock().clone();
        assert_eq!(
            labels(&events),
            vec!["progress:starting", "progress:calling_llm", "error"]
        );
    }
}

struct HangingSink {
    released: Arc<AtomicBool>,
}

struct ReleaseOnDrop(Arc<AtomicBool>);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ResultSink for HangingSink {
    async fn persist(&self, _record: &EvaluationRecord) -> QuillResult<()> {
        Ok(())
    }

    async fn persist_failure(&self, _rejected: &RejectedEvaluation) -> QuillResult<()> {
        let _guard = ReleaseOnDrop(self.released.clone());
        std::future::pending::<()>().await;
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_deadline_interrupts_hanging_rejection_sink() {
    let released = Arc::new(AtomicBool::new(false));
    let transport = Arc::new(
        ScriptedTransport::new().script(1, vec![Reply::Deltas(vec!["not json".to_string()])]),
    );
    let registry = SessionRegistry::builder(store(vec![credential(1, 0, 2)]), transport)
        .config(EngineConfig {
            session_timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .sink(Arc::new(HangingSink {
            released: released.clone(),
        }))
        .build()
        .unwrap();

    let (_, stream) = registry.start_stream(essay(TaskType::Task1)).unwrap();
    let events = collect(stream).await;
    assert_eq!(data_of(&events, "error")[0]["code"], "timeout");

    for _ in 0..10 {
        if released.load(Ordering::SeqCst) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(released.load(Ordering::SeqCst));
}
