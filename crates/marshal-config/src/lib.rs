//! Layered configuration for `marshald`: built-in defaults, an optional
//! TOML file, then `MARSHAL_`-prefixed environment variables, in that
//! order of increasing precedence — the recognized options are exactly
//! spec.md §6 plus the Pool's retry/inactivity knobs.

use std::path::Path;

use serde::Deserialize;

mod error;

pub use error::ConfigError;

/// Which Isolated Processor variant (§4.2) a node runs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IsolatedProcessorConfig {
    Local,
    BrokerBacked {
        url: String,
        #[serde(default = "default_task_queue")]
        task_queue: String,
    },
}

impl Default for IsolatedProcessorConfig {
    fn default() -> Self {
        Self::Local
    }
}

fn default_task_queue() -> String {
    "marshal.tasks".to_string()
}

/// One entry of `MESSAGE_BROKER_MANAGERS`: a sidecar this node runs
/// alongside the Governor loop.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SidecarManagerConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_task_queue")]
    pub task_queue: String,
}

/// The options recognized by spec.md §6, loaded once at boot.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MarshalConfig {
    pub http_port: u16,
    pub accepted_model_classes: Vec<String>,
    pub isolated_processor: IsolatedProcessorConfig,
    pub message_broker_managers: Vec<SidecarManagerConfig>,
    pub log_to_stdout: bool,
    pub debug: bool,
    pub external_loggers: Vec<String>,
    /// Pool's reply-queue inactivity timeout (§4.3), in seconds.
    pub inactivity_timeout_secs: f64,
    /// Pool's additional-attempt budget (§4.3): default one retry.
    pub retries: usize,
    /// `max_concurrent_tasks` override (§4.6); `None` defaults to the
    /// usable CPU count at Governor construction time.
    pub max_concurrent_tasks: Option<usize>,
    /// Ring-buffer bound on `previous_tasks` (§9 open question).
    pub previous_tasks_capacity: usize,
    /// Watchdog dead-man timeout in seconds (§9 open question).
    pub dead_man_timeout_secs: u64,
}

impl Default for MarshalConfig {
    fn default() -> Self {
        Self {
            http_port: 8000,
            accepted_model_classes: Vec::new(),
            isolated_processor: IsolatedProcessorConfig::default(),
            message_broker_managers: Vec::new(),
            log_to_stdout: true,
            debug: false,
            external_loggers: Vec::new(),
            inactivity_timeout_secs: 3.0,
            retries: 1,
            max_concurrent_tasks: None,
            previous_tasks_capacity: 1000,
            dead_man_timeout_secs: 300,
        }
    }
}

impl MarshalConfig {
    /// Loads defaults, layers an optional TOML file over them (if
    /// `path` exists), then layers `MARSHAL_`-prefixed environment
    /// variables over the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path).required(false).format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix("MARSHAL")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .map_err(ConfigError::build)?
            .try_deserialize()
            .map_err(ConfigError::deserialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_recognized_options() {
        let config = MarshalConfig::default();
        assert_eq!(config.http_port, 8000);
        assert_eq!(config.isolated_processor, IsolatedProcessorConfig::Local);
        assert_eq!(config.retries, 1);
        assert_eq!(config.inactivity_timeout_secs, 3.0);
    }

    #[test]
    fn load_with_no_file_falls_back_to_defaults() {
        let config = MarshalConfig::load(None).expect("loads from defaults + env only");
        assert_eq!(config.http_port, 8000);
    }
}
