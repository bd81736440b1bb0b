use std::process::Stdio;

use marshal_core::{InboxMessage, ResultPayload, TaskId, TaskResult, TaskSpec};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::warn;

use crate::protocol::{BrokerConfig, WorkerRequest};

/// Re-execs the current binary as `<exe> worker`, feeds it `spec` over
/// stdin, and forwards whatever single [`TaskResult`] line it writes to
/// stdout into `inbox` — the isolated-process half of C2's Processor.
pub async fn spawn_worker_process(
    proc_id: TaskId,
    spec: TaskSpec,
    broker: Option<BrokerConfig>,
    inbox: mpsc::UnboundedSender<InboxMessage>,
) {
    let result = run_to_completion(proc_id.clone(), spec, broker).await;
    let _ = inbox.send(InboxMessage::Result(result));
}

async fn run_to_completion(
    proc_id: TaskId,
    spec: TaskSpec,
    broker: Option<BrokerConfig>,
) -> TaskResult {
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(err) => return synthesize_failure(proc_id, format!("could not resolve own executable: {err}")),
    };

    let mut child = match Command::new(exe)
        .arg("worker")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(err) => return synthesize_failure(proc_id, format!("failed to spawn worker process: {err}")),
    };

    let request = WorkerRequest {
        task_id: proc_id.clone(),
        spec,
        broker,
    };
    let Ok(mut body) = serde_json::to_string(&request) else {
        return synthesize_failure(proc_id, "failed to serialize worker request".to_string());
    };
    body.push('\n');

    if let Some(mut stdin) = child.stdin.take() {
        if let Err(err) = stdin.write_all(body.as_bytes()).await {
            warn!(%proc_id, error = %err, "failed to write to worker stdin");
        }
        drop(stdin);
    }

    let stdout = child.stdout.take().expect("stdout is piped");
    let mut line = String::new();
    let read_result = BufReader::new(stdout).read_line(&mut line).await;

    let status = child.wait().await;

    if let Err(err) = read_result {
        return synthesize_failure(proc_id, format!("failed to read worker stdout: {err}"));
    }
    if line.trim().is_empty() {
        let detail = match status {
            Ok(status) => format!("worker process exited ({status}) without producing a result"),
            Err(err) => format!("worker process could not be awaited: {err}"),
        };
        return synthesize_failure(proc_id, detail);
    }

    match serde_json::from_str::<TaskResult>(line.trim()) {
        Ok(result) => result,
        Err(err) => synthesize_failure(proc_id, format!("worker produced an unparsable result: {err}")),
    }
}

fn synthesize_failure(task_id: TaskId, exception: String) -> TaskResult {
    TaskResult {
        task_id,
        payload: ResultPayload::Failed {
            exception,
            traceback: String::new(),
            failure_origin_task_id: None,
            exception_class_name: None,
        },
    }
}
