use async_trait::async_trait;

use crate::message::KwArgs;

/// One independent unit of work a partitioned model wants fanned out.
#[derive(Debug, Clone)]
pub struct SubtaskDef {
    pub method: String,
    pub kwargs: KwArgs,
}

/// What a sub-task ultimately produced, after the Pool's retry policy ran
/// its course.
#[derive(Debug, Clone)]
pub struct SubtaskOutcome {
    pub subtask_id: String,
    pub ordinal: usize,
    pub result: Result<serde_json::Value, SubtaskFailure>,
}

#[derive(Debug, Clone)]
pub struct SubtaskFailure {
    pub exception: String,
    pub traceback: String,
    pub exception_class_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("{exception}")]
    Failed {
        exception: String,
        traceback: String,
        failure_origin_task_id: Option<String>,
        exception_class_name: Option<String>,
    },
    #[error("model `{0}` is not partitioned and cannot be fanned out")]
    NotPartitioned(&'static str),
}

impl ModelError {
    pub fn simple(exception: impl Into<String>, traceback: impl Into<String>) -> Self {
        ModelError::Failed {
            exception: exception.into(),
            traceback: traceback.into(),
            failure_origin_task_id: None,
            exception_class_name: None,
        }
    }

    pub fn from_subtask_failure(subtask_id: impl Into<String>, failure: &SubtaskFailure) -> Self {
        ModelError::Failed {
            exception: failure.exception.clone(),
            traceback: failure.traceback.clone(),
            failure_origin_task_id: Some(subtask_id.into()),
            exception_class_name: Some(failure.exception_class_name.clone()),
        }
    }

    pub fn from_panic_payload(class: &str, payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        ModelError::simple(
            format!("{class}: {message}"),
            "<no traceback: task panicked>",
        )
    }
}

/// The whitelist entry: a class handle the Isolated Processor instantiates
/// and drives. The user-supplied business logic behind this trait is
/// explicitly out of scope (spec.md §1) — this crate only needs the seam.
#[async_trait]
pub trait Model: Send + Sync {
    /// Whether this class fans a task out into sub-tasks instead of
    /// answering directly.
    fn is_partitioned(&self) -> bool {
        false
    }

    /// Non-partitioned entry point: run `method` directly and produce the
    /// final result.
    async fn call(
        &self,
        method: &str,
        kwargs: &KwArgs,
        resolver_context: &KwArgs,
    ) -> Result<serde_json::Value, ModelError> {
        let _ = (method, kwargs, resolver_context);
        Err(ModelError::NotPartitioned("call"))
    }

    /// Partitioned entry point: produce the ordered list of sub-tasks for
    /// `method`.
    async fn partition(
        &self,
        method: &str,
        kwargs: &KwArgs,
        resolver_context: &KwArgs,
    ) -> Result<Vec<SubtaskDef>, ModelError> {
        let _ = (method, kwargs, resolver_context);
        Err(ModelError::NotPartitioned("partition"))
    }

    /// Combines every sub-task's outcome (already retried to exhaustion by
    /// the Pool) into the parent task's final result.
    async fn combine(&self, outcomes: Vec<SubtaskOutcome>) -> Result<serde_json::Value, ModelError> {
        let _ = outcomes;
        Err(ModelError::NotPartitioned("combine"))
    }
}
