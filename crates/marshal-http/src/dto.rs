use marshal_core::{CallbackTag, KwArgs, ProcessEntry, ResultPayload};
use serde::{Deserialize, Serialize};

/// `POST <base>/task` request body (§6).
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitTaskRequest {
    pub model_class: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub method_kwargs: KwArgs,
    #[serde(default)]
    pub resolver_context: KwArgs,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskLinks {
    pub task: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    pub links: TaskLinks,
}

/// `200` response to a successful `POST <base>/task` admission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitTaskResponse {
    pub task_id: String,
    pub governor_accepted_ident: String,
    #[serde(rename = "_metadata")]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// `GET <base>/task/<id>` response shape (§6).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskStatusResponse {
    pub status: TaskStatus,
    pub started: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<serde_json::Value>,
}

impl TaskStatusResponse {
    pub fn from_entry(entry: &ProcessEntry) -> Self {
        let started = format_instant(entry.started);
        let finished = entry.finished.map(format_instant);

        let (status, results) = match &entry.result {
            None => (TaskStatus::Running, None),
            Some(ResultPayload::Complete { return_value }) => (
                TaskStatus::Complete,
                Some(serde_json::json!({ "return_value": return_value })),
            ),
            Some(ResultPayload::Failed {
                exception,
                traceback,
                failure_origin_task_id,
                exception_class_name,
            }) => (
                TaskStatus::Failed,
                Some(serde_json::json!({
                    "payload": {
                        "exception": exception,
                        "traceback": traceback,
                        "failure_origin_task_id": failure_origin_task_id,
                        "exception_class_name": exception_class_name,
                    }
                })),
            ),
        };

        Self {
            status,
            started,
            finished,
            results,
        }
    }
}

fn format_instant(instant: std::time::SystemTime) -> String {
    jiff::Timestamp::try_from(instant)
        .map(|ts| ts.to_string())
        .unwrap_or_else(|_| "unrepresentable-timestamp".to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeInfo {
    pub node_ident: String,
    pub max_concurrent_tasks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunningTaskSummary {
    pub task_id: String,
    pub model_class: String,
    pub started: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentTaskSummary {
    pub task_id: String,
    pub model_class: String,
    pub status: TaskStatus,
    pub started: String,
    pub finished: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeInfoResponse {
    pub node_info: NodeInfo,
    pub running_tasks: Vec<RunningTaskSummary>,
    pub recent_completed_tasks: Vec<RecentTaskSummary>,
}

pub fn running_summary(entry: &ProcessEntry) -> RunningTaskSummary {
    RunningTaskSummary {
        task_id: entry.task_id.as_str().to_string(),
        model_class: entry.spec.model_class.clone(),
        started: format_instant(entry.started),
    }
}

pub fn recent_summary(entry: &ProcessEntry) -> RecentTaskSummary {
    let status = match &entry.result {
        Some(ResultPayload::Failed { .. }) => TaskStatus::Failed,
        Some(ResultPayload::Complete { .. }) => TaskStatus::Complete,
        None => TaskStatus::Running,
    };
    RecentTaskSummary {
        task_id: entry.task_id.as_str().to_string(),
        model_class: entry.spec.model_class.clone(),
        status,
        started: format_instant(entry.started),
        finished: entry.finished.map(format_instant),
    }
}

/// Whether a task originated from a directly submitted request (as opposed
/// to a sidecar-injected one) — the HTTP adapter only ever creates these.
pub fn local_callback() -> CallbackTag {
    CallbackTag::None
}
