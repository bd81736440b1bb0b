#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ConfigError(#[from] ConfigErrorKind);

impl ConfigError {
    pub(crate) fn build(source: config::ConfigError) -> Self {
        Self(ConfigErrorKind::Build(source))
    }

    pub(crate) fn deserialize(source: config::ConfigError) -> Self {
        Self(ConfigErrorKind::Deserialize(source))
    }
}

#[derive(Debug, thiserror::Error)]
enum ConfigErrorKind {
    #[error("failed to assemble configuration sources: {0}")]
    Build(#[source] config::ConfigError),
    #[error("failed to deserialize configuration: {0}")]
    Deserialize(#[source] config::ConfigError),
}
