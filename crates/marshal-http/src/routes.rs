use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use marshal_core::{GovernorHandle, TaskId, TaskSpec, TaskSubmit};

use crate::dto::{
    recent_summary, running_summary, Metadata, NodeInfo, NodeInfoResponse, SubmitTaskRequest,
    SubmitTaskResponse, TaskLinks, TaskStatusResponse,
};
use crate::error::ApiError;

/// Builds the thin HTTP front door described in spec.md §6 — out of the
/// Governor's core, but documented and implemented here since §8's
/// testable scenarios exercise it directly.
pub fn router(governor: GovernorHandle) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/task", post(submit_task))
        .route("/task/{id}", get(task_status))
        .route("/node_info", get(node_info))
        .with_state(governor)
}

async fn liveness() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "hello": "world" }))
}

async fn submit_task(
    State(governor): State<GovernorHandle>,
    Json(request): Json<SubmitTaskRequest>,
) -> Result<Json<SubmitTaskResponse>, ApiError> {
    if !governor.has_capacity() {
        return Err(ApiError::NoCapacity);
    }

    let spec = TaskSpec {
        model_class: request.model_class.clone(),
        method: request.method,
        method_kwargs: request.method_kwargs,
        resolver_context: request.resolver_context,
    };

    let task_id = governor
        .submit(TaskSubmit::local(spec))
        .map_err(|_| ApiError::InvalidClass(request.model_class))?;

    Ok(Json(SubmitTaskResponse {
        task_id: task_id.as_str().to_string(),
        governor_accepted_ident: governor.identity().to_string(),
        metadata: Metadata {
            links: TaskLinks {
                task: format!("/task/{task_id}"),
            },
        },
    }))
}

async fn task_status(
    State(governor): State<GovernorHandle>,
    Path(id): Path<String>,
) -> Result<Json<TaskStatusResponse>, ApiError> {
    let task_id = TaskId::from(id.clone());
    let entry = governor
        .tables()
        .get(&task_id)
        .await
        .ok_or(ApiError::NotFound(id))?;
    Ok(Json(TaskStatusResponse::from_entry(&entry)))
}

async fn node_info(State(governor): State<GovernorHandle>) -> Json<NodeInfoResponse> {
    let running = governor.tables().running_snapshot().await;
    let previous = governor.tables().previous_snapshot().await;

    Json(NodeInfoResponse {
        node_info: NodeInfo {
            node_ident: governor.identity().to_string(),
            max_concurrent_tasks: governor.max_concurrent_tasks(),
        },
        running_tasks: running.iter().map(running_summary).collect(),
        recent_completed_tasks: previous.iter().map(recent_summary).collect(),
    })
}
