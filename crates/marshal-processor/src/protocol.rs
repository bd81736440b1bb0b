use marshal_core::{TaskId, TaskSpec};
use serde::{Deserialize, Serialize};

/// Broker coordinates handed to a worker process so it can build its own
/// [`marshal_pool::Pool`] if the task it's running turns out to be
/// partitioned. Absent for the Local variant, which runs sub-tasks
/// sequentially in-process instead of fanning them out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub amqp_uri: String,
    pub task_queue: String,
    pub retries: usize,
    pub inactivity_timeout_secs: u64,
}

/// What the parent writes as a single JSON line to the worker's stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub task_id: TaskId,
    pub spec: TaskSpec,
    #[serde(default)]
    pub broker: Option<BrokerConfig>,
}
