use std::sync::Arc;

use async_trait::async_trait;
use marshal_core::{InboxMessage, Model, ProcessorLauncher, TaskId, TaskSpec};
use tokio::sync::mpsc;

use crate::process::spawn_worker_process;
use crate::protocol::BrokerConfig;

/// The Broker-backed variant (§4.2): every task still runs in its own
/// isolated worker process, but a partitioned model's worker constructs a
/// [`marshal_pool::Pool`] and fans its sub-tasks out to peer nodes over the
/// shared broker instead of running them sequentially.
#[derive(Debug, Clone)]
pub struct BrokerBackedLauncher {
    broker: BrokerConfig,
}

impl BrokerBackedLauncher {
    pub fn new(amqp_uri: impl Into<String>, task_queue: impl Into<String>, retries: usize, inactivity_timeout_secs: u64) -> Self {
        Self {
            broker: BrokerConfig {
                amqp_uri: amqp_uri.into(),
                task_queue: task_queue.into(),
                retries,
                inactivity_timeout_secs,
            },
        }
    }
}

#[async_trait]
impl ProcessorLauncher for BrokerBackedLauncher {
    async fn spawn(
        &self,
        proc_id: TaskId,
        spec: TaskSpec,
        _model: Arc<dyn Model>,
        inbox: mpsc::UnboundedSender<InboxMessage>,
    ) {
        spawn_worker_process(proc_id, spec, Some(self.broker.clone()), inbox).await;
    }
}
