use std::collections::HashMap;
use std::time::{Duration, Instant};

use marshal_core::{KwArgs, SubtaskDef, SubtaskFailure, SubtaskOutcome};

/// A reply that arrived on the pool's reply queue, already decoded off the
/// wire and stripped of broker-specific envelope details.
#[derive(Debug, Clone)]
pub enum SubtaskEvent {
    Complete {
        subtask_id: String,
        return_value: serde_json::Value,
    },
    Failed {
        subtask_id: String,
        exception: String,
        traceback: String,
        exception_class_name: Option<String>,
    },
}

/// What the tracker wants the pool's network loop to do in response to an
/// event or a missed deadline.
#[derive(Debug)]
pub enum RetryAction {
    Republish {
        subtask_id: String,
        method: String,
        kwargs: KwArgs,
    },
    Yield(SubtaskOutcome),
    /// A reply (or stale retry) for a `subtask_id` we no longer track —
    /// logged and ignored per §4.3's edge cases.
    UnknownSubtask,
}

struct InFlight {
    ordinal: usize,
    method: String,
    kwargs: KwArgs,
    deadline_start: Instant,
    attempts: usize,
}

/// The pure retry/inactivity bookkeeping behind the Sub-task Pool (C3),
/// kept free of any broker I/O so the retry rule can be unit tested
/// directly.
pub struct RetryTracker {
    retries: usize,
    inactivity_timeout: Duration,
    in_flight: HashMap<String, InFlight>,
}

impl RetryTracker {
    pub fn new(retries: usize, inactivity_timeout: Duration) -> Self {
        Self {
            retries,
            inactivity_timeout,
            in_flight: HashMap::new(),
        }
    }

    pub fn register(&mut self, ordinal: usize, subtask_id: String, def: SubtaskDef) {
        self.in_flight.insert(
            subtask_id,
            InFlight {
                ordinal,
                method: def.method,
                kwargs: def.kwargs,
                deadline_start: Instant::now(),
                attempts: 1,
            },
        );
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn handle_event(&mut self, event: SubtaskEvent) -> RetryAction {
        match event {
            SubtaskEvent::Complete {
                subtask_id,
                return_value,
            } => match self.in_flight.remove(&subtask_id) {
                Some(state) => RetryAction::Yield(SubtaskOutcome {
                    subtask_id,
                    ordinal: state.ordinal,
                    result: Ok(return_value),
                }),
                None => RetryAction::UnknownSubtask,
            },
            SubtaskEvent::Failed {
                subtask_id,
                exception,
                traceback,
                exception_class_name,
            } => self.fail_or_retry(subtask_id, exception, traceback, exception_class_name),
        }
    }

    fn fail_or_retry(
        &mut self,
        subtask_id: String,
        exception: String,
        traceback: String,
        exception_class_name: Option<String>,
    ) -> RetryAction {
        let Some(state) = self.in_flight.get_mut(&subtask_id) else {
            return RetryAction::UnknownSubtask;
        };
        state.attempts += 1;
        if state.attempts <= self.retries + 1 {
            state.deadline_start = Instant::now();
            RetryAction::Republish {
                subtask_id,
                method: state.method.clone(),
                kwargs: state.kwargs.clone(),
            }
        } else {
            let state = self.in_flight.remove(&subtask_id).expect("checked above");
            RetryAction::Yield(SubtaskOutcome {
                subtask_id,
                ordinal: state.ordinal,
                result: Err(SubtaskFailure {
                    exception,
                    traceback,
                    exception_class_name: exception_class_name.unwrap_or_default(),
                }),
            })
        }
    }

    /// `subtask_id`s whose deadline (inactivity timeout, scaled by the
    /// attempt number) has passed with no reply at all — distinct from an
    /// explicit `Failed`, this is the deadline-based re-publish added to
    /// resolve the "inactivity timeout vs. broker redelivery" open
    /// question.
    pub fn expired(&self, now: Instant) -> Vec<String> {
        self.in_flight
            .iter()
            .filter(|(_, state)| {
                now.duration_since(state.deadline_start)
                    >= self.inactivity_timeout * (state.attempts as u32 + 1)
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Treats an expired deadline exactly like an explicit `Failed` reply
    /// with no detail, consuming the retry budget.
    pub fn handle_deadline_expiry(&mut self, subtask_id: String) -> RetryAction {
        self.fail_or_retry(
            subtask_id,
            "sub-task inactivity deadline exceeded with no reply".to_string(),
            String::new(),
            None,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(method: &str) -> SubtaskDef {
        SubtaskDef {
            method: method.to_string(),
            kwargs: KwArgs::new(),
        }
    }

    #[test]
    fn complete_removes_and_yields() {
        let mut tracker = RetryTracker::new(1, Duration::from_secs(3));
        tracker.register(0, "p:0".to_string(), def("run"));
        let action = tracker.handle_event(SubtaskEvent::Complete {
            subtask_id: "p:0".to_string(),
            return_value: serde_json::json!(42),
        });
        match action {
            RetryAction::Yield(outcome) => {
                assert_eq!(outcome.ordinal, 0);
                assert!(outcome.result.is_ok());
            }
            other => panic!("expected Yield, got {other:?}"),
        }
        assert!(tracker.is_empty());
    }

    #[test]
    fn default_policy_retries_once_then_yields_failed() {
        let mut tracker = RetryTracker::new(1, Duration::from_secs(3));
        tracker.register(0, "p:0".to_string(), def("run"));

        let first = tracker.handle_event(SubtaskEvent::Failed {
            subtask_id: "p:0".to_string(),
            exception: "boom".to_string(),
            traceback: String::new(),
            exception_class_name: Some("ZeroDivisionError".to_string()),
        });
        assert!(matches!(first, RetryAction::Republish { .. }));
        assert_eq!(tracker.in_flight_count(), 1);

        let second = tracker.handle_event(SubtaskEvent::Failed {
            subtask_id: "p:0".to_string(),
            exception: "boom again".to_string(),
            traceback: String::new(),
            exception_class_name: Some("ZeroDivisionError".to_string()),
        });
        match second {
            RetryAction::Yield(outcome) => {
                let failure = outcome.result.unwrap_err();
                assert_eq!(failure.exception_class_name, "ZeroDivisionError");
            }
            other => panic!("expected Yield, got {other:?}"),
        }
        assert!(tracker.is_empty());
    }

    #[test]
    fn unknown_subtask_id_is_ignored_not_panicking() {
        let mut tracker = RetryTracker::new(1, Duration::from_secs(3));
        let action = tracker.handle_event(SubtaskEvent::Complete {
            subtask_id: "ghost:7".to_string(),
            return_value: serde_json::Value::Null,
        });
        assert!(matches!(action, RetryAction::UnknownSubtask));
    }

    #[test]
    fn stale_retry_after_already_yielded_is_ignored() {
        let mut tracker = RetryTracker::new(1, Duration::from_secs(3));
        tracker.register(0, "p:0".to_string(), def("run"));
        let _ = tracker.handle_event(SubtaskEvent::Complete {
            subtask_id: "p:0".to_string(),
            return_value: serde_json::Value::Null,
        });
        // A retry reply for the same id winning late after completion.
        let action = tracker.handle_event(SubtaskEvent::Failed {
            subtask_id: "p:0".to_string(),
            exception: "late".to_string(),
            traceback: String::new(),
            exception_class_name: None,
        });
        assert!(matches!(action, RetryAction::UnknownSubtask));
    }
}
