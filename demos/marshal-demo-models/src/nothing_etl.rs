use async_trait::async_trait;
use marshal_core::{KwArgs, Model, ModelError};

/// The no-op class used by spec.md §8 scenario 1: admitted, runs, and
/// completes with a null result without touching any sub-task machinery.
#[derive(Debug, Default, Clone, Copy)]
pub struct NothingEtl;

#[async_trait]
impl Model for NothingEtl {
    async fn call(
        &self,
        _method: &str,
        _kwargs: &KwArgs,
        _resolver_context: &KwArgs,
    ) -> Result<serde_json::Value, ModelError> {
        Ok(serde_json::Value::Null)
    }
}
