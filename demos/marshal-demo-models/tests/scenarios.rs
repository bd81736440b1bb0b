use marshal_core::{KwArgs, Model, SubtaskOutcome};
use marshal_demo_models::{NothingEtl, PartialFailure, SecondTimeLucky};

#[tokio::test]
async fn nothing_etl_completes_with_null() {
    let model = NothingEtl;
    let result = model.call("run", &KwArgs::new(), &KwArgs::new()).await;
    assert_eq!(result.unwrap(), serde_json::Value::Null);
}

#[tokio::test]
async fn partial_failure_yields_four_subtasks_one_zero_division() {
    let model = PartialFailure;
    let subtasks = model
        .partition("run", &KwArgs::new(), &KwArgs::new())
        .await
        .unwrap();
    assert_eq!(subtasks.len(), 4);

    let mut outcomes = Vec::new();
    for (ordinal, def) in subtasks.into_iter().enumerate() {
        let result = model.call(&def.method, &def.kwargs, &KwArgs::new()).await;
        outcomes.push(SubtaskOutcome {
            subtask_id: format!("demo:{ordinal}"),
            ordinal,
            result: result.map_err(|err| match err {
                marshal_core::ModelError::Failed {
                    exception,
                    traceback,
                    exception_class_name,
                    ..
                } => marshal_core::SubtaskFailure {
                    exception,
                    traceback,
                    exception_class_name: exception_class_name.unwrap_or_default(),
                },
                marshal_core::ModelError::NotPartitioned(op) => marshal_core::SubtaskFailure {
                    exception: format!("unsupported op {op}"),
                    traceback: String::new(),
                    exception_class_name: String::new(),
                },
            }),
        });
    }

    assert!(outcomes[0].result.is_err());
    assert!(outcomes[1].result.is_ok());

    let combined = model.combine(outcomes).await;
    match combined {
        Err(marshal_core::ModelError::Failed {
            failure_origin_task_id,
            exception_class_name,
            ..
        }) => {
            assert_eq!(failure_origin_task_id.as_deref(), Some("demo:0"));
            assert_eq!(exception_class_name.as_deref(), Some("ZeroDivisionError"));
        }
        other => panic!("expected a failed combine, got {other:?}"),
    }
}

#[tokio::test]
async fn second_time_lucky_succeeds_on_the_retry() {
    let model = SecondTimeLucky::default();
    let subtasks = model
        .partition("run", &KwArgs::new(), &KwArgs::new())
        .await
        .unwrap();

    let def = &subtasks[0];
    let first = model.call(&def.method, &def.kwargs, &KwArgs::new()).await;
    assert!(first.is_err(), "first attempt must fail");

    let second = model.call(&def.method, &def.kwargs, &KwArgs::new()).await;
    assert!(second.is_ok(), "second attempt must succeed");
}
