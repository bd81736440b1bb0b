use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use marshal_core::{
    CompletionHandler, Governor, InboxMessage, Model, ProcessorLauncher, ResultPayload, TaskId,
    TaskResult, TaskSpec, TaskSubmit,
};
use tokio::sync::mpsc;

struct NoopModel;

#[async_trait]
impl Model for NoopModel {
    async fn call(
        &self,
        _method: &str,
        _kwargs: &marshal_core::KwArgs,
        _resolver_context: &marshal_core::KwArgs,
    ) -> Result<serde_json::Value, marshal_core::ModelError> {
        Ok(serde_json::Value::Null)
    }
}

/// A launcher that immediately posts a `Complete` result without actually
/// spawning anything, so the governor loop can be exercised without a real
/// child process.
struct ImmediateLauncher {
    spawned: AtomicUsize,
}

impl ImmediateLauncher {
    fn new() -> Self {
        Self {
            spawned: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ProcessorLauncher for ImmediateLauncher {
    async fn spawn(
        &self,
        proc_id: TaskId,
        _spec: TaskSpec,
        _model: Arc<dyn Model>,
        inbox: mpsc::UnboundedSender<InboxMessage>,
    ) {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        let _ = inbox.send(InboxMessage::Result(TaskResult {
            task_id: proc_id,
            payload: ResultPayload::Complete {
                return_value: serde_json::Value::Null,
            },
        }));
    }
}

/// A launcher that never responds, to exercise the unknown-task-id and
/// capacity-saturation paths.
struct HangingLauncher;

#[async_trait]
impl ProcessorLauncher for HangingLauncher {
    async fn spawn(
        &self,
        _proc_id: TaskId,
        _spec: TaskSpec,
        _model: Arc<dyn Model>,
        _inbox: mpsc::UnboundedSender<InboxMessage>,
    ) {
    }
}

fn nothing_spec() -> TaskSpec {
    TaskSpec {
        model_class: "NothingEtl".to_string(),
        method: "run".to_string(),
        method_kwargs: Default::default(),
        resolver_context: Default::default(),
    }
}

#[tokio::test]
async fn submit_rejects_unknown_class() {
    let governor = Governor::with_capacity(Arc::new(HangingLauncher), 2);
    let handle = governor.handle();
    let err = handle
        .submit(TaskSubmit::local(TaskSpec {
            model_class: "DoesNotExist".to_string(),
            ..nothing_spec()
        }))
        .unwrap_err();
    assert!(err.is_invalid_task_spec());
}

#[tokio::test]
async fn happy_path_completes_and_moves_to_previous_tasks() {
    let governor = Governor::with_capacity(Arc::new(ImmediateLauncher::new()), 2);
    governor
        .register_class("NothingEtl", Arc::new(NoopModel))
        .unwrap();
    let handle = governor.handle();
    let shutdown = governor.shutdown_handle();
    let loop_handle = tokio::spawn(governor.run());

    let task_id = handle.submit(TaskSubmit::local(nothing_spec())).unwrap();

    // Give the loop a moment to process submit + result.
    let mut attempts = 0;
    loop {
        if let Some(entry) = handle.tables().get(&task_id).await {
            if entry.is_finished() {
                assert!(matches!(entry.result, Some(ResultPayload::Complete { .. })));
                break;
            }
        }
        attempts += 1;
        assert!(attempts < 100, "task never completed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(handle.tables().running_count().await, 0);

    let _ = shutdown.send(true);
    let _ = loop_handle.await;
}

#[tokio::test]
async fn unknown_task_result_is_logged_and_dropped_not_fatal() {
    let governor = Governor::with_capacity(Arc::new(HangingLauncher), 2);
    let handle = governor.handle();
    let shutdown = governor.shutdown_handle();
    let loop_handle = tokio::spawn(governor.run());

    // Post a TaskResult for a task_id the governor never admitted.
    handle
        .inbox_sender()
        .send(InboxMessage::Result(TaskResult {
            task_id: TaskId::generate(),
            payload: ResultPayload::Complete {
                return_value: serde_json::Value::Null,
            },
        }))
        .unwrap();

    // The loop should still be alive and able to accept further work.
    governor_still_alive(&handle).await;

    let _ = shutdown.send(true);
    let _ = loop_handle.await;
}

async fn governor_still_alive(handle: &marshal_core::GovernorHandle) {
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(handle.tables().running_count().await, 0);
}

#[tokio::test]
async fn capacity_scoreboard_reflects_free_slots_when_inbox_is_idle() {
    let governor = Governor::with_capacity(Arc::new(HangingLauncher), 3);
    let handle = governor.handle();
    let shutdown = governor.shutdown_handle();

    assert!(!handle.has_capacity(), "capacity reads 0 before the loop runs");

    let loop_handle = tokio::spawn(governor.run());

    let mut attempts = 0;
    while !handle.has_capacity() {
        attempts += 1;
        assert!(attempts < 200, "capacity counter never went positive");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(handle.max_concurrent_tasks(), 3);

    let _ = shutdown.send(true);
    let _ = loop_handle.await;
}

#[tokio::test]
async fn duplicate_class_registration_fails() {
    let governor = Governor::with_capacity(Arc::new(HangingLauncher), 1);
    governor.register_class("NothingEtl", Arc::new(NoopModel)).unwrap();
    let err = governor
        .register_class("NothingEtl", Arc::new(NoopModel))
        .unwrap_err();
    assert!(!err.is_invalid_task_spec());
}

struct RecordingHandler {
    seen: std::sync::Mutex<Vec<TaskId>>,
}

impl CompletionHandler for RecordingHandler {
    fn on_complete(&self, result: &TaskResult, _original: &TaskSpec) {
        self.seen.lock().unwrap().push(result.task_id.clone());
    }
}

#[tokio::test]
async fn sidecar_tagged_submission_invokes_its_own_handler() {
    let governor = Governor::with_capacity(Arc::new(ImmediateLauncher::new()), 2);
    governor.register_class("NothingEtl", Arc::new(NoopModel)).unwrap();
    let recorder = Arc::new(RecordingHandler {
        seen: std::sync::Mutex::new(Vec::new()),
    });
    governor.attach_sidecar("rmq-1", recorder.clone() as Arc<dyn CompletionHandler>).await;

    let handle = governor.handle();
    let shutdown = governor.shutdown_handle();
    let loop_handle = tokio::spawn(governor.run());

    let task_id = TaskId::composite("corr-1", "reply-q");
    handle
        .submit(TaskSubmit::from_sidecar(task_id.clone(), nothing_spec(), "rmq-1"))
        .unwrap();

    let mut attempts = 0;
    while recorder.seen.lock().unwrap().is_empty() {
        attempts += 1;
        assert!(attempts < 200, "handler never invoked");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(recorder.seen.lock().unwrap()[0], task_id);

    let _ = shutdown.send(true);
    let _ = loop_handle.await;
}
