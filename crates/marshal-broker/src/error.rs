use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct SidecarError(#[from] SidecarErrorKind);

impl SidecarError {
    pub fn connect(source: lapin::Error) -> Self {
        Self(SidecarErrorKind::Connect(source))
    }

    pub fn channel(source: lapin::Error) -> Self {
        Self(SidecarErrorKind::Channel(source))
    }

    pub fn fetch(source: lapin::Error) -> Self {
        Self(SidecarErrorKind::Fetch(source))
    }

    pub fn publish(source: lapin::Error) -> Self {
        Self(SidecarErrorKind::Publish(source))
    }
}

#[derive(Debug, Error)]
enum SidecarErrorKind {
    #[error("failed to connect to broker: {0}")]
    Connect(#[source] lapin::Error),

    #[error("failed to open channel: {0}")]
    Channel(#[source] lapin::Error),

    #[error("failed to fetch from task queue: {0}")]
    Fetch(#[source] lapin::Error),

    #[error("failed to publish reply: {0}")]
    Publish(#[source] lapin::Error),
}
