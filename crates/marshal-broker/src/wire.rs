use marshal_core::KwArgs;
use serde::{Deserialize, Serialize};

/// A top-level task as it arrives on the shared broker task queue (§6) —
/// the same shape a `Pool` publishes for a sub-task, but here it describes
/// an entire task a remote producer wants this node to run.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundTaskWire {
    pub model_class: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub method_kwargs: KwArgs,
    #[serde(default)]
    pub resolver_context: KwArgs,
    #[serde(default)]
    pub model_construction_kwargs: Option<KwArgs>,
    #[serde(default)]
    pub partition_initialise_kwargs: Option<KwArgs>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundTaskSpecStub {
    pub method: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutboundResultInner {
    Success {
        return_value: serde_json::Value,
    },
    Failure {
        exception: String,
        traceback: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        exception_class_name: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundResultSpec {
    pub result: OutboundResultInner,
}

/// The reply this sidecar publishes back to the originator's reply queue.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundResultWire {
    Complete {
        task_spec: OutboundTaskSpecStub,
        result_spec: OutboundResultSpec,
    },
    Failed {
        task_spec: OutboundTaskSpecStub,
        result_spec: OutboundResultSpec,
    },
}
