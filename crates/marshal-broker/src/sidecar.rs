use std::time::Duration;

use lapin::options::{BasicAckOptions, BasicGetOptions, BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use marshal_core::{GovernorHandle, ResultPayload, TaskId, TaskResult, TaskSpec, TaskSubmit};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::error::SidecarError;
use crate::wire::{InboundTaskWire, OutboundResultInner, OutboundResultSpec, OutboundResultWire, OutboundTaskSpecStub};

const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);
const EMPTY_POLL_BACKOFF: Duration = Duration::from_secs(5);
const CAPACITY_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// The Broker Sidecar (C4): bridges the broker's shared task queue into the
/// local Governor's inbox and routes completions back to the originator's
/// reply queue, per §4.4's state machine (`Received -> Acked -> Submitted
/// -> Completed -> Published`).
pub struct BrokerSidecar {
    name: String,
    amqp_uri: String,
    task_queue: String,
    governor: GovernorHandle,
    completions: mpsc::UnboundedReceiver<(TaskResult, TaskSpec)>,
}

impl BrokerSidecar {
    pub fn new(
        name: impl Into<String>,
        amqp_uri: impl Into<String>,
        task_queue: impl Into<String>,
        governor: GovernorHandle,
        completions: mpsc::UnboundedReceiver<(TaskResult, TaskSpec)>,
    ) -> Self {
        Self {
            name: name.into(),
            amqp_uri: amqp_uri.into(),
            task_queue: task_queue.into(),
            governor,
            completions,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The reconnect-restart outer loop: any error inside one connection
    /// attempt is logged and the loop sleeps 5s before reconnecting,
    /// checking `shutdown` on every iteration.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }
            match self.run_once(&mut shutdown).await {
                Ok(()) => return,
                Err(err) => {
                    error!(sidecar = %self.name, error = %err, "sidecar connection failed, reconnecting in 5s");
                    tokio::select! {
                        _ = tokio::time::sleep(RECONNECT_BACKOFF) => {}
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                return;
                            }
                        }
                    }
                }
            }
        }
    }

    async fn run_once(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<(), SidecarError> {
        let connection = Connection::connect(&self.amqp_uri, ConnectionProperties::default())
            .await
            .map_err(SidecarError::connect)?;
        let channel = connection.create_channel().await.map_err(SidecarError::channel)?;
        channel
            .queue_declare(
                &self.task_queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(SidecarError::channel)?;

        info!(sidecar = %self.name, queue = %self.task_queue, "sidecar connected");

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            if !self.wait_for_capacity(&channel, shutdown).await? {
                return Ok(());
            }

            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return Ok(());
                    }
                }
                Some((result, spec)) = self.completions.recv() => {
                    publish_result(&channel, &result, &spec).await?;
                }
                fetched = channel.basic_get(&self.task_queue, BasicGetOptions::default()) => {
                    match fetched.map_err(SidecarError::fetch)? {
                        Some(message) => {
                            let correlation_id = message.properties.correlation_id().as_ref().map(|v| v.to_string());
                            let reply_to = message.properties.reply_to().as_ref().map(|v| v.to_string());
                            message.ack(BasicAckOptions::default()).await.map_err(SidecarError::fetch)?;
                            self.admit(message.data.as_slice(), correlation_id, reply_to);
                        }
                        None => {
                            tokio::select! {
                                _ = tokio::time::sleep(EMPTY_POLL_BACKOFF) => {}
                                _ = shutdown.changed() => {
                                    if *shutdown.borrow() {
                                        return Ok(());
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Busy-waits (with a short sleep) until the Governor's capacity
    /// scoreboard reads positive, so the sidecar never sits blocked inside
    /// the broker client while the Governor has no room. Drains completions
    /// while waiting so a slow-filling queue never stalls replies. Returns
    /// `false` if shutdown was requested mid-wait.
    async fn wait_for_capacity(
        &mut self,
        channel: &Channel,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<bool, SidecarError> {
        while !self.governor.has_capacity() {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return Ok(false);
                    }
                }
                Some((result, spec)) = self.completions.recv() => {
                    publish_result(channel, &result, &spec).await?;
                }
                _ = tokio::time::sleep(CAPACITY_POLL_INTERVAL) => {}
            }
        }
        Ok(true)
    }

    fn admit(&self, body: &[u8], correlation_id: Option<String>, reply_to: Option<String>) {
        let wire: InboundTaskWire = match serde_json::from_slice(body) {
            Ok(wire) => wire,
            Err(err) => {
                warn!(sidecar = %self.name, error = %err, "dropping malformed task message");
                return;
            }
        };

        let (Some(correlation_id), Some(reply_to)) = (correlation_id, reply_to) else {
            warn!(sidecar = %self.name, "dropping task message with no correlation id / reply-to");
            return;
        };

        let task_id = TaskId::composite(&correlation_id, &reply_to);
        let spec = TaskSpec {
            model_class: wire.model_class,
            method: wire.method,
            method_kwargs: wire.method_kwargs,
            resolver_context: wire.resolver_context,
        };
        let submit = TaskSubmit::from_sidecar(task_id.clone(), spec, self.name.clone());
        if let Err(err) = self.governor.submit(submit) {
            warn!(sidecar = %self.name, %task_id, error = %err, "governor rejected sidecar-submitted task");
        }
    }
}

async fn publish_result(channel: &Channel, result: &TaskResult, _original: &TaskSpec) -> Result<(), SidecarError> {
    let Some((_correlation_id, reply_to)) = result.task_id.split_composite() else {
        warn!(task_id = %result.task_id, "completion for a non-composite task id; sidecar cannot route it");
        return Ok(());
    };

    let wire = to_outbound_wire(result);
    let body = serde_json::to_vec(&wire).expect("OutboundResultWire always serializes");
    channel
        .basic_publish(
            "",
            reply_to,
            BasicPublishOptions::default(),
            &body,
            BasicProperties::default().with_correlation_id(
                result
                    .task_id
                    .split_composite()
                    .map(|(correlation_id, _)| correlation_id)
                    .unwrap_or_default()
                    .into(),
            ),
        )
        .await
        .map_err(SidecarError::publish)?
        .await
        .map_err(SidecarError::publish)?;
    Ok(())
}

fn to_outbound_wire(result: &TaskResult) -> OutboundResultWire {
    match &result.payload {
        ResultPayload::Complete { return_value } => OutboundResultWire::Complete {
            task_spec: OutboundTaskSpecStub {
                method: String::new(),
            },
            result_spec: OutboundResultSpec {
                result: OutboundResultInner::Success {
                    return_value: return_value.clone(),
                },
            },
        },
        ResultPayload::Failed {
            exception,
            traceback,
            exception_class_name,
            ..
        } => OutboundResultWire::Failed {
            task_spec: OutboundTaskSpecStub {
                method: String::new(),
            },
            result_spec: OutboundResultSpec {
                result: OutboundResultInner::Failure {
                    exception: exception.clone(),
                    traceback: traceback.clone(),
                    exception_class_name: exception_class_name.clone(),
                },
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_wire_decodes_minimal_task_message() {
        let raw = serde_json::json!({
            "model_class": "NothingEtl",
            "method": "run"
        });
        let wire: InboundTaskWire = serde_json::from_value(raw).unwrap();
        assert_eq!(wire.model_class, "NothingEtl");
        assert_eq!(wire.method, "run");
        assert!(wire.method_kwargs.is_empty());
    }

    #[test]
    fn composite_id_round_trips_through_the_sidecar_and_back() {
        let task_id = TaskId::composite("corr-42", "reply-queue-7");
        let (correlation_id, reply_to) = task_id.split_composite().unwrap();
        assert_eq!(correlation_id, "corr-42");
        assert_eq!(reply_to, "reply-queue-7");
    }
}
