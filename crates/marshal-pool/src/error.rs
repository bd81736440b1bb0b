use thiserror::Error;

/// Errors surfaced by the Sub-task Pool (C3) to its caller — the Processor
/// that owns a partitioned model's fan-out/fan-in.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct PoolError(#[from] PoolErrorKind);

impl PoolError {
    pub fn connect(source: lapin::Error) -> Self {
        Self(PoolErrorKind::Connect(source))
    }

    pub fn channel(source: lapin::Error) -> Self {
        Self(PoolErrorKind::Channel(source))
    }

    pub fn publish(subtask_id: impl Into<String>, source: lapin::Error) -> Self {
        Self(PoolErrorKind::Publish {
            subtask_id: subtask_id.into(),
            source,
        })
    }

    pub fn malformed_reply(reason: impl Into<String>) -> Self {
        Self(PoolErrorKind::MalformedReply(reason.into()))
    }

    pub fn is_connect(&self) -> bool {
        matches!(self.0, PoolErrorKind::Connect(_))
    }
}

#[derive(Debug, Error)]
enum PoolErrorKind {
    #[error("failed to connect to broker: {0}")]
    Connect(#[source] lapin::Error),

    #[error("failed to open channel: {0}")]
    Channel(#[source] lapin::Error),

    #[error("failed to publish sub-task `{subtask_id}`: {source}")]
    Publish {
        subtask_id: String,
        #[source]
        source: lapin::Error,
    },

    #[error("malformed reply on pool queue: {0}")]
    MalformedReply(String),
}
