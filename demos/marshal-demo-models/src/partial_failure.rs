use async_trait::async_trait;
use marshal_core::{KwArgs, Model, ModelError, SubtaskDef, SubtaskOutcome};

const SUBTASK_COUNT: usize = 4;
const FAILING_ORDINAL: usize = 0;

/// Spec.md §8 scenario 3: yields four sub-tasks, one of which (ordinal 0)
/// always raises a division-by-zero error. The parent task's `combine`
/// surfaces that failure with the originating sub-task id recorded.
#[derive(Debug, Default, Clone, Copy)]
pub struct PartialFailure;

#[async_trait]
impl Model for PartialFailure {
    fn is_partitioned(&self) -> bool {
        true
    }

    async fn partition(
        &self,
        _method: &str,
        _kwargs: &KwArgs,
        _resolver_context: &KwArgs,
    ) -> Result<Vec<SubtaskDef>, ModelError> {
        Ok((0..SUBTASK_COUNT)
            .map(|ordinal| SubtaskDef {
                method: "process_chunk".to_string(),
                kwargs: KwArgs::from_iter([(
                    "ordinal".to_string(),
                    serde_json::Value::from(ordinal),
                )]),
            })
            .collect())
    }

    async fn call(
        &self,
        method: &str,
        kwargs: &KwArgs,
        _resolver_context: &KwArgs,
    ) -> Result<serde_json::Value, ModelError> {
        if method != "process_chunk" {
            return Err(ModelError::NotPartitioned("process_chunk"));
        }
        let ordinal = kwargs
            .get("ordinal")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(u64::MAX) as usize;

        if ordinal == FAILING_ORDINAL {
            let mut err = ModelError::simple(
                "division by zero",
                "Traceback (most recent call last):\n  File \"partial_failure.py\", line 4, in process_chunk\nZeroDivisionError: division by zero",
            );
            if let ModelError::Failed {
                exception_class_name,
                ..
            } = &mut err
            {
                *exception_class_name = Some("ZeroDivisionError".to_string());
            }
            return Err(err);
        }
        Ok(serde_json::json!({ "ordinal": ordinal }))
    }

    async fn combine(&self, outcomes: Vec<SubtaskOutcome>) -> Result<serde_json::Value, ModelError> {
        for outcome in &outcomes {
            if let Err(failure) = &outcome.result {
                return Err(ModelError::from_subtask_failure(&outcome.subtask_id, failure));
            }
        }
        Ok(serde_json::json!({ "chunks": outcomes.len() }))
    }
}
