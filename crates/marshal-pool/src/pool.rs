use std::time::Duration;

use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use marshal_core::{random_lowercase_tag, KwArgs, SubtaskDef, SubtaskOutcome};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::error::PoolError;
use crate::subtask::{RetryTracker, SubtaskEvent};
use crate::wire::{SubtaskCompletionWire, SubtaskPublish, WireResultInner};

/// Fans a partitioned model's sub-tasks out to peer nodes over a shared
/// broker and streams their outcomes back as they (eventually) arrive,
/// applying the retry/inactivity policy from §4.3.
pub struct Pool {
    channel: Channel,
    task_queue: String,
    reply_queue: String,
    pool_id: String,
    retries: usize,
    inactivity_timeout: Duration,
}

impl Pool {
    pub async fn connect(
        amqp_uri: &str,
        task_queue: impl Into<String>,
        retries: usize,
        inactivity_timeout: Duration,
    ) -> Result<Self, PoolError> {
        let connection = Connection::connect(amqp_uri, ConnectionProperties::default())
            .await
            .map_err(PoolError::connect)?;
        let channel = connection.create_channel().await.map_err(PoolError::channel)?;

        let reply_queue = channel
            .queue_declare(
                "",
                QueueDeclareOptions {
                    exclusive: true,
                    auto_delete: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(PoolError::channel)?;

        Ok(Self {
            channel,
            task_queue: task_queue.into(),
            reply_queue: reply_queue.name().as_str().to_string(),
            pool_id: random_lowercase_tag(5),
            retries,
            inactivity_timeout,
        })
    }

    /// Publishes every sub-task of `subtasks` and returns a stream that
    /// yields one [`SubtaskOutcome`] per sub-task, in whatever order their
    /// final (post-retry) replies arrive. The stream ends once every
    /// sub-task has yielded exactly once.
    pub async fn fan_out(
        self,
        model_class: String,
        resolver_context: KwArgs,
        subtasks: Vec<SubtaskDef>,
    ) -> Result<ReceiverStream<SubtaskOutcome>, PoolError> {
        let Self {
            channel,
            task_queue,
            reply_queue,
            pool_id,
            retries,
            inactivity_timeout,
        } = self;

        let mut tracker = RetryTracker::new(retries, inactivity_timeout);
        for (ordinal, def) in subtasks.iter().enumerate() {
            let subtask_id = format!("{pool_id}:{ordinal}");
            publish_subtask(
                &channel,
                &task_queue,
                &reply_queue,
                &subtask_id,
                &model_class,
                def,
                &resolver_context,
            )
            .await?;
            tracker.register(ordinal, subtask_id, def.clone());
        }

        let (tx, rx) = mpsc::channel(subtasks.len().max(1));
        tokio::spawn(run_reply_loop(
            channel,
            task_queue,
            reply_queue,
            model_class,
            resolver_context,
            tracker,
            tx,
        ));
        Ok(ReceiverStream::new(rx))
    }
}

#[allow(clippy::too_many_arguments)]
async fn publish_subtask(
    channel: &Channel,
    task_queue: &str,
    reply_queue: &str,
    subtask_id: &str,
    model_class: &str,
    def: &SubtaskDef,
    resolver_context: &KwArgs,
) -> Result<(), PoolError> {
    let payload = SubtaskPublish {
        model_class: model_class.to_string(),
        method: def.method.clone(),
        method_kwargs: def.kwargs.clone(),
        resolver_context: resolver_context.clone(),
        model_construction_kwargs: None,
        partition_initialise_kwargs: None,
    };
    let body = serde_json::to_vec(&payload)
        .map_err(|err| PoolError::malformed_reply(err.to_string()))?;

    channel
        .basic_publish(
            "",
            task_queue,
            BasicPublishOptions::default(),
            &body,
            BasicProperties::default()
                .with_correlation_id(subtask_id.into())
                .with_reply_to(reply_queue.into()),
        )
        .await
        .map_err(|err| PoolError::publish(subtask_id, err))?
        .await
        .map_err(|err| PoolError::publish(subtask_id, err))?;
    Ok(())
}

async fn run_reply_loop(
    channel: Channel,
    task_queue: String,
    reply_queue: String,
    model_class: String,
    resolver_context: KwArgs,
    mut tracker: RetryTracker,
    outcomes: mpsc::Sender<SubtaskOutcome>,
) {
    let consumer = match channel
        .basic_consume(
            &reply_queue,
            &format!("pool-{reply_queue}"),
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
    {
        Ok(consumer) => consumer,
        Err(err) => {
            warn!(error = %err, "pool failed to consume from its own reply queue");
            return;
        }
    };
    tokio::pin!(consumer);

    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    while !tracker.is_empty() {
        tokio::select! {
            biased;
            delivery = consumer.next() => {
                let Some(delivery) = delivery else { break; };
                let delivery = match delivery {
                    Ok(delivery) => delivery,
                    Err(err) => {
                        warn!(error = %err, "error reading from pool reply queue");
                        continue;
                    }
                };
                let correlation_id = delivery
                    .properties
                    .correlation_id()
                    .as_ref()
                    .map(|id| id.to_string());
                if let Err(err) = delivery.ack(BasicAckOptions::default()).await {
                    warn!(error = %err, "failed to ack pool reply");
                }
                let Some(subtask_id) = correlation_id else {
                    warn!("pool reply missing correlation id, dropping");
                    continue;
                };
                match decode_event(&subtask_id, &delivery.data) {
                    Ok(event) => {
                        handle_action(
                            tracker.handle_event(event),
                            &channel,
                            &task_queue,
                            &reply_queue,
                            &model_class,
                            &resolver_context,
                            &outcomes,
                        )
                        .await;
                    }
                    Err(err) => warn!(%subtask_id, error = %err, "could not decode pool reply"),
                }
            }
            _ = ticker.tick() => {
                let now = std::time::Instant::now();
                for subtask_id in tracker.expired(now) {
                    debug!(%subtask_id, "sub-task inactivity deadline exceeded");
                    handle_action(
                        tracker.handle_deadline_expiry(subtask_id),
                        &channel,
                        &task_queue,
                        &reply_queue,
                        &model_class,
                        &resolver_context,
                        &outcomes,
                    )
                    .await;
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_action(
    action: crate::subtask::RetryAction,
    channel: &Channel,
    task_queue: &str,
    reply_queue: &str,
    model_class: &str,
    resolver_context: &KwArgs,
    outcomes: &mpsc::Sender<SubtaskOutcome>,
) {
    use crate::subtask::RetryAction;
    match action {
        RetryAction::Republish {
            subtask_id,
            method,
            kwargs,
        } => {
            let def = SubtaskDef { method, kwargs };
            if let Err(err) = publish_subtask(
                channel,
                task_queue,
                reply_queue,
                &subtask_id,
                model_class,
                &def,
                resolver_context,
            )
            .await
            {
                warn!(%subtask_id, error = %err, "failed to re-publish sub-task");
            }
        }
        RetryAction::Yield(outcome) => {
            let _ = outcomes.send(outcome).await;
        }
        RetryAction::UnknownSubtask => {
            debug!("ignoring reply/expiry for a sub-task no longer tracked");
        }
    }
}

fn decode_event(subtask_id: &str, body: &[u8]) -> Result<SubtaskEvent, PoolError> {
    let wire: SubtaskCompletionWire =
        serde_json::from_slice(body).map_err(|err| PoolError::malformed_reply(err.to_string()))?;
    let event = match wire {
        SubtaskCompletionWire::Complete { result_spec, .. } => match result_spec.result {
            WireResultInner::Success { return_value } => SubtaskEvent::Complete {
                subtask_id: subtask_id.to_string(),
                return_value,
            },
            WireResultInner::Failure {
                exception,
                traceback,
                exception_class_name,
            } => SubtaskEvent::Failed {
                subtask_id: subtask_id.to_string(),
                exception,
                traceback,
                exception_class_name,
            },
        },
        SubtaskCompletionWire::Failed { result_spec, .. } => match result_spec.result {
            WireResultInner::Failure {
                exception,
                traceback,
                exception_class_name,
            } => SubtaskEvent::Failed {
                subtask_id: subtask_id.to_string(),
                exception,
                traceback,
                exception_class_name,
            },
            WireResultInner::Success { return_value } => SubtaskEvent::Complete {
                subtask_id: subtask_id.to_string(),
                return_value,
            },
        },
    };
    Ok(event)
}
