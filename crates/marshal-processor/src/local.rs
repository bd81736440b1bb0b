use std::sync::Arc;

use async_trait::async_trait;
use marshal_core::{InboxMessage, Model, ProcessorLauncher, TaskId, TaskSpec};
use tokio::sync::mpsc;

use crate::process::spawn_worker_process;

/// The Local variant (§4.2/§9): every task, partitioned or not, runs to
/// completion inside one isolated worker process. A partitioned model's
/// sub-tasks are run sequentially within that same process rather than
/// fanned out over a broker.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalLauncher;

#[async_trait]
impl ProcessorLauncher for LocalLauncher {
    async fn spawn(
        &self,
        proc_id: TaskId,
        spec: TaskSpec,
        _model: Arc<dyn Model>,
        inbox: mpsc::UnboundedSender<InboxMessage>,
    ) {
        spawn_worker_process(proc_id, spec, None, inbox).await;
    }
}
