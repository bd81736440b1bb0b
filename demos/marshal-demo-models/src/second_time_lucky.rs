use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use marshal_core::{KwArgs, Model, ModelError, SubtaskDef, SubtaskOutcome};

const SUBTASK_COUNT: usize = 4;

/// Spec.md §8 scenario 4: every sub-task fails on its first attempt and
/// succeeds on the second, exercising the Pool's default one-retry policy
/// (§4.3). Per-ordinal attempt counts live behind a `Mutex` because the
/// same worker process re-invokes `call` for each local retry.
#[derive(Debug, Default)]
pub struct SecondTimeLucky {
    attempts: Mutex<HashMap<usize, u32>>,
}

#[async_trait]
impl Model for SecondTimeLucky {
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
                method: "flaky".to_string(),
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
        if method != "flaky" {
            return Err(ModelError::NotPartitioned("flaky"));
        }
        let ordinal = kwargs
            .get("ordinal")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(u64::MAX) as usize;

        let attempt = {
            let mut attempts = self.attempts.lock().expect("attempts mutex poisoned");
            let count = attempts.entry(ordinal).or_insert(0);
            *count += 1;
            *count
        };

        if attempt < 2 {
            return Err(ModelError::simple(
                "transient failure, retry for the win",
                String::new(),
            ));
        }
        Ok(serde_json::json!({ "ordinal": ordinal, "attempt": attempt }))
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
