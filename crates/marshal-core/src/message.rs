use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::TaskId;

/// Opaque key/value map carried alongside a task: `method_kwargs` or
/// `resolver_context`.
pub type KwArgs = HashMap<String, serde_json::Value>;

/// The immutable description of what to run: a whitelisted class, a method
/// selected on it, and the two opaque argument maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub model_class: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub method_kwargs: KwArgs,
    #[serde(default)]
    pub resolver_context: KwArgs,
}

/// Selects which registered [`CompletionHandler`](crate::CompletionHandler)
/// the Governor invokes once a task finishes.
///
/// The source implementation passes a function reference through the inbox;
/// a systems-language inbox can only carry data, so the behavior is selected
/// by this tag instead, and the handler itself is registered ahead of time
/// via `attach_sidecar` (or the always-present no-op for directly submitted
/// tasks).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackTag {
    /// No completion side effect beyond recording the result in the tables.
    None,
    /// Invoke the handler registered under this name (a sidecar's id).
    Named(String),
}

/// A task submission, as it travels through the inbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSubmit {
    /// `Some` for sidecar-injected tasks, carrying the composite
    /// `correlation-id::reply-queue` id. `None` for directly submitted
    /// tasks, which the Governor assigns a fresh id to on dequeue.
    pub task_id: Option<TaskId>,
    pub spec: TaskSpec,
    #[serde(default = "default_callback")]
    pub callback: CallbackTag,
}

fn default_callback() -> CallbackTag {
    CallbackTag::None
}

impl TaskSubmit {
    pub fn local(spec: TaskSpec) -> Self {
        Self {
            task_id: None,
            spec,
            callback: CallbackTag::None,
        }
    }

    pub fn from_sidecar(task_id: TaskId, spec: TaskSpec, sidecar_name: impl Into<String>) -> Self {
        Self {
            task_id: Some(task_id),
            spec,
            callback: CallbackTag::Named(sidecar_name.into()),
        }
    }
}

/// The outcome of a finished task: success or failure, keyed by `task_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultPayload {
    Complete {
        return_value: serde_json::Value,
    },
    Failed {
        exception: String,
        traceback: String,
        /// For a partitioned task, the sub-task id that originated the
        /// failure (see scenario "Partial failure propagation").
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failure_origin_task_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exception_class_name: Option<String>,
    },
}

impl ResultPayload {
    pub fn is_failed(&self) -> bool {
        matches!(self, ResultPayload::Failed { .. })
    }

    pub fn failed(exception: impl Into<String>, traceback: impl Into<String>) -> Self {
        ResultPayload::Failed {
            exception: exception.into(),
            traceback: traceback.into(),
            failure_origin_task_id: None,
            exception_class_name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub payload: ResultPayload,
}

/// The tagged variants multiplexed on the single-consumer inbox (C1).
#[derive(Debug)]
pub enum InboxMessage {
    Submit(TaskSubmit),
    Result(TaskResult),
    Terminate,
}
