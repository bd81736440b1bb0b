use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, TryFutureExt};
use marshal_core::{
    KwArgs, Model, ModelError, ResultPayload, SubtaskDef, SubtaskFailure, SubtaskOutcome, TaskId,
    TaskResult, Whitelist,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, warn};

use crate::protocol::WorkerRequest;

/// The re-exec'd worker entrypoint. Reads a single [`WorkerRequest`] JSON
/// line from stdin, runs it against `whitelist`, and writes a single
/// [`TaskResult`] JSON line to stdout. This is the body of `marshald
/// worker`, whichever process spawned it.
pub async fn run_worker(whitelist: Arc<Whitelist>) -> std::io::Result<()> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;

    let request: WorkerRequest = match serde_json::from_str(line.trim()) {
        Ok(request) => request,
        Err(err) => {
            error!(error = %err, "worker received an unparsable request");
            return Ok(());
        }
    };

    let result = execute(&whitelist, request).await;
    let body = serde_json::to_string(&result).expect("TaskResult always serializes");
    let mut stdout = tokio::io::stdout();
    stdout.write_all(body.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

async fn execute(whitelist: &Whitelist, request: WorkerRequest) -> TaskResult {
    let WorkerRequest {
        task_id,
        spec,
        broker,
    } = request;

    let Some(model) = whitelist.get(&spec.model_class) else {
        return failed(
            task_id,
            format!("model class `{}` is not registered", spec.model_class),
            String::new(),
            None,
            None,
        );
    };

    let outcome = AssertUnwindSafe(run_model(
        model,
        &spec.model_class,
        &spec.method,
        &spec.method_kwargs,
        &spec.resolver_context,
        broker,
    ))
    .catch_unwind()
    .await;

    match outcome {
        Ok(Ok(return_value)) => TaskResult {
            task_id,
            payload: ResultPayload::Complete { return_value },
        },
        Ok(Err(err)) => model_error_to_result(task_id, err),
        Err(panic) => {
            let err = ModelError::from_panic_payload(&spec.model_class, panic.as_ref());
            model_error_to_result(task_id, err)
        }
    }
}

async fn run_model(
    model: Arc<dyn Model>,
    model_class: &str,
    method: &str,
    kwargs: &KwArgs,
    resolver_context: &KwArgs,
    broker: Option<crate::protocol::BrokerConfig>,
) -> Result<serde_json::Value, ModelError> {
    if !model.is_partitioned() {
        return model.call(method, kwargs, resolver_context).await;
    }

    let subtasks = model.partition(method, kwargs, resolver_context).await?;
    let outcomes = match broker {
        Some(cfg) => run_partitioned_over_broker(cfg, model_class, resolver_context, subtasks).await?,
        None => run_partitioned_locally(model.as_ref(), resolver_context, subtasks).await,
    };
    model.combine(outcomes).await
}

async fn run_partitioned_locally(
    model: &dyn Model,
    resolver_context: &KwArgs,
    subtasks: Vec<SubtaskDef>,
) -> Vec<SubtaskOutcome> {
    const LOCAL_RETRIES: usize = 1;
    let mut outcomes = Vec::with_capacity(subtasks.len());
    for (ordinal, def) in subtasks.into_iter().enumerate() {
        let result = run_subtask_locally(model, &def, resolver_context, LOCAL_RETRIES).await;
        outcomes.push(SubtaskOutcome {
            subtask_id: format!("local:{ordinal}"),
            ordinal,
            result,
        });
    }
    outcomes
}

async fn run_subtask_locally(
    model: &dyn Model,
    def: &SubtaskDef,
    resolver_context: &KwArgs,
    retries: usize,
) -> Result<serde_json::Value, SubtaskFailure> {
    let mut last = None;
    for _ in 0..=retries {
        match model.call(&def.method, &def.kwargs, resolver_context).await {
            Ok(value) => return Ok(value),
            Err(ModelError::Failed {
                exception,
                traceback,
                exception_class_name,
                ..
            }) => {
                last = Some(SubtaskFailure {
                    exception,
                    traceback,
                    exception_class_name: exception_class_name.unwrap_or_default(),
                });
            }
            Err(ModelError::NotPartitioned(operation)) => {
                last = Some(SubtaskFailure {
                    exception: format!("model does not implement `{operation}`"),
                    traceback: String::new(),
                    exception_class_name: String::new(),
                });
            }
        }
    }
    Err(last.expect("loop runs at least once"))
}

async fn run_partitioned_over_broker(
    cfg: crate::protocol::BrokerConfig,
    model_class: &str,
    resolver_context: &KwArgs,
    subtasks: Vec<SubtaskDef>,
) -> Result<Vec<SubtaskOutcome>, ModelError> {
    let pool = marshal_pool::Pool::connect(
        &cfg.amqp_uri,
        &cfg.task_queue,
        cfg.retries,
        Duration::from_secs(cfg.inactivity_timeout_secs),
    )
    .await
    .map_err(|err| ModelError::simple(err.to_string(), "pool connection failed"))?;

    let expected = subtasks.len();
    let mut stream = pool
        .fan_out(model_class.to_string(), resolver_context.clone(), subtasks)
        .await
        .map_err(|err| ModelError::simple(err.to_string(), "pool fan-out failed"))?;

    let mut outcomes = Vec::with_capacity(expected);
    while let Some(outcome) = stream.next().await {
        outcomes.push(outcome);
        if outcomes.len() == expected {
            break;
        }
    }
    Ok(outcomes)
}

fn model_error_to_result(task_id: TaskId, err: ModelError) -> TaskResult {
    match err {
        ModelError::Failed {
            exception,
            traceback,
            failure_origin_task_id,
            exception_class_name,
        } => failed(
            task_id,
            exception,
            traceback,
            failure_origin_task_id,
            exception_class_name,
        ),
        ModelError::NotPartitioned(operation) => failed(
            task_id,
            format!("model does not implement `{operation}`"),
            String::new(),
            None,
            None,
        ),
    }
}

fn failed(
    task_id: TaskId,
    exception: String,
    traceback: String,
    failure_origin_task_id: Option<String>,
    exception_class_name: Option<String>,
) -> TaskResult {
    if traceback.is_empty() {
        warn!(%task_id, %exception, "sub-task produced no traceback");
    }
    TaskResult {
        task_id,
        payload: ResultPayload::Failed {
            exception,
            traceback,
            failure_origin_task_id,
            exception_class_name,
        },
    }
}
