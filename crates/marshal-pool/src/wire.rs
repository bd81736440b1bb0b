use marshal_core::KwArgs;
use serde::{Deserialize, Serialize};

/// What gets published to the shared task queue for one sub-task (§6).
#[derive(Debug, Clone, Serialize)]
pub struct SubtaskPublish {
    pub model_class: String,
    pub method: String,
    pub method_kwargs: KwArgs,
    pub resolver_context: KwArgs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_construction_kwargs: Option<KwArgs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_initialise_kwargs: Option<KwArgs>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireTaskSpecStub {
    pub method: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireResultInner {
    Success {
        return_value: serde_json::Value,
    },
    Failure {
        exception: String,
        traceback: String,
        #[serde(default)]
        exception_class_name: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireResultSpec {
    pub result: WireResultInner,
}

/// A typed completion as it arrives on the reply queue (§6).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubtaskCompletionWire {
    Complete {
        task_spec: WireTaskSpecStub,
        result_spec: WireResultSpec,
    },
    Failed {
        task_spec: WireTaskSpecStub,
        result_spec: WireResultSpec,
    },
}
