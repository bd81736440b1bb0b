use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use marshal_core::{Governor, InboxMessage, Model, ProcessorLauncher, ResultPayload, TaskId, TaskResult, TaskSpec};
use tokio::sync::mpsc;
use tower::ServiceExt as _;

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

struct ImmediateLauncher;

#[async_trait]
impl ProcessorLauncher for ImmediateLauncher {
    async fn spawn(
        &self,
        proc_id: TaskId,
        _spec: TaskSpec,
        _model: Arc<dyn Model>,
        inbox: mpsc::UnboundedSender<InboxMessage>,
    ) {
        let _ = inbox.send(InboxMessage::Result(TaskResult {
            task_id: proc_id,
            payload: ResultPayload::Complete {
                return_value: serde_json::Value::Null,
            },
        }));
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn liveness_stub_returns_hello_world() {
    let governor = Governor::with_capacity(Arc::new(ImmediateLauncher), 2);
    let router = marshal_http::router(governor.handle());

    let response = router
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({ "hello": "world" }));
}

#[tokio::test]
async fn submitting_unknown_class_returns_400() {
    let governor = Governor::with_capacity(Arc::new(ImmediateLauncher), 2);
    let handle = governor.handle();
    let shutdown = governor.shutdown_handle();
    let loop_handle = tokio::spawn(governor.run());

    // Wait for the scoreboard to go positive so the 400 isn't masked by 503.
    while !handle.has_capacity() {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let router = marshal_http::router(handle);
    let body = serde_json::json!({ "model_class": "NopeNotRegistered" }).to_string();
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/task")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let _ = shutdown.send(true);
    let _ = loop_handle.await;
}

#[tokio::test]
async fn nothing_etl_happy_path_reaches_complete() {
    let governor = Governor::with_capacity(Arc::new(ImmediateLauncher), 2);
    governor.register_class("NothingEtl", Arc::new(NoopModel)).unwrap();
    let handle = governor.handle();
    let shutdown = governor.shutdown_handle();
    let loop_handle = tokio::spawn(governor.run());

    while !handle.has_capacity() {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let router = marshal_http::router(handle.clone());
    let body = serde_json::json!({ "model_class": "NothingEtl" }).to_string();
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/task")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let submitted = body_json(response).await;
    let task_id = submitted["task_id"].as_str().unwrap().to_string();

    let mut status = serde_json::Value::Null;
    for _ in 0..100 {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/task/{task_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        status = body_json(response).await;
        if status["status"] == "complete" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(status["status"], "complete");
    assert!(status["finished"].is_string());

    let _ = shutdown.send(true);
    let _ = loop_handle.await;
}

#[tokio::test]
async fn unknown_task_id_returns_404() {
    let governor = Governor::with_capacity(Arc::new(ImmediateLauncher), 2);
    let router = marshal_http::router(governor.handle());
    let response = router
        .oneshot(
            Request::builder()
                .uri("/task/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
