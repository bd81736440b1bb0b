use marshal_core::{TaskId, TaskSpec};
use marshal_processor::WorkerRequest;

#[test]
fn worker_request_without_broker_field_defaults_to_local() {
    let raw = serde_json::json!({
        "task_id": "1234:abcdefgh",
        "spec": { "model_class": "NothingEtl", "method": "run" }
    });
    let request: WorkerRequest = serde_json::from_value(raw).expect("deserializes");
    assert!(request.broker.is_none());
    assert_eq!(request.task_id, TaskId::from("1234:abcdefgh".to_string()));
    assert_eq!(request.spec.model_class, "NothingEtl");
}

#[test]
fn worker_request_round_trips_through_json_with_broker_config() {
    let request = WorkerRequest {
        task_id: TaskId::generate(),
        spec: TaskSpec {
            model_class: "PartialFailure".to_string(),
            method: "run".to_string(),
            method_kwargs: Default::default(),
            resolver_context: Default::default(),
        },
        broker: Some(marshal_processor::BrokerConfig {
            amqp_uri: "amqp://127.0.0.1//".to_string(),
            task_queue: "marshal.tasks".to_string(),
            retries: 1,
            inactivity_timeout_secs: 30,
        }),
    };
    let json = serde_json::to_string(&request).unwrap();
    let back: WorkerRequest = serde_json::from_str(&json).unwrap();
    assert_eq!(back.task_id, request.task_id);
    assert_eq!(back.broker.unwrap().task_queue, "marshal.tasks");
}
