use std::time::{Duration, Instant};

use marshal_core::KwArgs;
use marshal_pool::{RetryAction, RetryTracker, SubtaskEvent};

fn def(method: &str) -> marshal_core::SubtaskDef {
    marshal_core::SubtaskDef {
        method: method.to_string(),
        kwargs: KwArgs::new(),
    }
}

#[test]
fn four_subtasks_one_failing_permanently_matches_partial_failure_scenario() {
    let mut tracker = RetryTracker::new(1, Duration::from_secs(30));
    for ordinal in 0..4 {
        tracker.register(ordinal, format!("p:{ordinal}"), def("run"));
    }

    for ordinal in [0usize, 2, 3] {
        let action = tracker.handle_event(SubtaskEvent::Complete {
            subtask_id: format!("p:{ordinal}"),
            return_value: serde_json::json!(ordinal),
        });
        assert!(matches!(action, RetryAction::Yield(_)));
    }

    // Sub-task 1 fails twice (its retry budget), the third event finally yields.
    let first = tracker.handle_event(SubtaskEvent::Failed {
        subtask_id: "p:1".to_string(),
        exception: "division by zero".to_string(),
        traceback: "line 4".to_string(),
        exception_class_name: Some("ZeroDivisionError".to_string()),
    });
    assert!(matches!(first, RetryAction::Republish { .. }));

    let second = tracker.handle_event(SubtaskEvent::Failed {
        subtask_id: "p:1".to_string(),
        exception: "division by zero".to_string(),
        traceback: "line 4".to_string(),
        exception_class_name: Some("ZeroDivisionError".to_string()),
    });
    match second {
        RetryAction::Yield(outcome) => {
            assert_eq!(outcome.subtask_id, "p:1");
            let failure = outcome.result.unwrap_err();
            assert_eq!(failure.exception_class_name, "ZeroDivisionError");
        }
        other => panic!("expected the exhausted retry to yield, got {other:?}"),
    }
    assert!(tracker.is_empty());
}

#[test]
fn second_time_lucky_succeeds_within_the_retry_budget() {
    let mut tracker = RetryTracker::new(1, Duration::from_secs(30));
    tracker.register(0, "p:0".to_string(), def("flaky"));

    let first = tracker.handle_event(SubtaskEvent::Failed {
        subtask_id: "p:0".to_string(),
        exception: "transient".to_string(),
        traceback: String::new(),
        exception_class_name: Some("TransientError".to_string()),
    });
    assert!(matches!(first, RetryAction::Republish { .. }));

    let second = tracker.handle_event(SubtaskEvent::Complete {
        subtask_id: "p:0".to_string(),
        return_value: serde_json::json!("ok"),
    });
    assert!(matches!(second, RetryAction::Yield(_)));
    assert!(tracker.is_empty());
}

#[test]
fn deadline_expiry_consumes_retry_budget_like_an_explicit_failure() {
    let mut tracker = RetryTracker::new(1, Duration::from_millis(5));
    tracker.register(0, "p:0".to_string(), def("slow"));

    std::thread::sleep(Duration::from_millis(20));
    let expired = tracker.expired(Instant::now());
    assert_eq!(expired, vec!["p:0".to_string()]);

    let action = tracker.handle_deadline_expiry("p:0".to_string());
    assert!(matches!(action, RetryAction::Republish { .. }));

    std::thread::sleep(Duration::from_millis(30));
    let expired_again = tracker.expired(Instant::now());
    assert_eq!(expired_again, vec!["p:0".to_string()]);

    let final_action = tracker.handle_deadline_expiry("p:0".to_string());
    match final_action {
        RetryAction::Yield(outcome) => {
            assert!(outcome.result.is_err());
        }
        other => panic!("expected final deadline expiry to yield, got {other:?}"),
    }
}
