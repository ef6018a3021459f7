//! JSON method-call boundary.
//!
//! Application logic reaches the scheduler through a method-name-plus-JSON
//! surface -- the shape a cross-language channel speaks. The same module
//! decodes the one-shot launched-by-alarm signal a cold-started process
//! finds in its launch parameters.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::error::ScheduleError;
use crate::scheduler::AlarmScheduler;
use crate::trigger::AlarmTrigger;

pub const METHOD_SCHEDULE: &str = "scheduleAlarm";
pub const METHOD_CANCEL: &str = "cancelAlarm";

/// Machine-readable error codes on the call surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallErrorCode {
    InvalidArgs,
    PermissionDenied,
    ScheduleError,
    CancelError,
    NotImplemented,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct CallError {
    pub code: CallErrorCode,
    pub message: String,
}

impl CallError {
    fn new(code: CallErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Dispatch one inbound call. Returns the success value (`true` for both
/// known methods) or a coded error the channel can relay verbatim.
pub fn handle_call(
    scheduler: &AlarmScheduler,
    method: &str,
    args: &Value,
) -> Result<Value, CallError> {
    debug!(method, "bridge call");
    match method {
        METHOD_SCHEDULE => schedule_call(scheduler, args),
        METHOD_CANCEL => cancel_call(scheduler, args),
        other => Err(CallError::new(
            CallErrorCode::NotImplemented,
            format!("unknown method: {other}"),
        )),
    }
}

fn schedule_call(scheduler: &AlarmScheduler, args: &Value) -> Result<Value, CallError> {
    let id = require_i64(args, "id")?;
    let label = require_str(args, "label")?;
    let trigger_time = require_i64(args, "triggerTime")?;

    scheduler
        .schedule(AlarmTrigger::new(id, label, trigger_time))
        .map_err(|err| match err {
            ScheduleError::InvalidArgument(message) => {
                CallError::new(CallErrorCode::InvalidArgs, message)
            }
            ScheduleError::PermissionDenied => {
                CallError::new(CallErrorCode::PermissionDenied, err.to_string())
            }
            ScheduleError::Backend(source) => {
                CallError::new(CallErrorCode::ScheduleError, source.to_string())
            }
        })?;
    Ok(Value::Bool(true))
}

fn cancel_call(scheduler: &AlarmScheduler, args: &Value) -> Result<Value, CallError> {
    let id = require_i64(args, "id")?;
    scheduler.cancel(id).map_err(|err| match err {
        ScheduleError::InvalidArgument(message) => {
            CallError::new(CallErrorCode::InvalidArgs, message)
        }
        other => CallError::new(CallErrorCode::CancelError, other.to_string()),
    })?;
    Ok(Value::Bool(true))
}

fn require_i64(args: &Value, key: &str) -> Result<i64, CallError> {
    args.get(key).and_then(Value::as_i64).ok_or_else(|| {
        CallError::new(
            CallErrorCode::InvalidArgs,
            format!("missing or non-integer field: {key}"),
        )
    })
}

fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, CallError> {
    args.get(key).and_then(Value::as_str).ok_or_else(|| {
        CallError::new(
            CallErrorCode::InvalidArgs,
            format!("missing or non-string field: {key}"),
        )
    })
}

/// One-shot launched-by-alarm signal, decoded from process launch
/// parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSignal {
    pub id: i64,
    pub label: String,
}

/// Detect an alarm-initiated launch. Returns `None` for ordinary starts or
/// when the payload lacks an id to route on.
pub fn launch_signal(params: &Value) -> Option<LaunchSignal> {
    let flagged = params
        .get("launched_by_alarm")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !flagged {
        return None;
    }
    let id = params.get("id").and_then(Value::as_i64)?;
    let label = params
        .get("label")
        .and_then(Value::as_str)
        .unwrap_or("Alarm")
        .to_string();
    Some(LaunchSignal { id, label })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use serde_json::json;

    use crate::error::BackendError;
    use crate::events::EventBus;
    use crate::platform::{AlarmNotification, ChannelSpec, Notifier, TimerBackend};
    use crate::trigger::LaunchParams;

    #[derive(Default)]
    struct RecordingTimer {
        denied: AtomicBool,
        reject: AtomicBool,
        registered: Mutex<HashMap<i64, AlarmTrigger>>,
    }

    impl TimerBackend for RecordingTimer {
        fn can_schedule_exact(&self) -> bool {
            !self.denied.load(Ordering::SeqCst)
        }

        fn register(&self, trigger: &AlarmTrigger) -> Result<(), BackendError> {
            if self.reject.load(Ordering::SeqCst) {
                return Err(BackendError::Failed("registration table full".into()));
            }
            self.registered
                .lock()
                .unwrap()
                .insert(trigger.id, trigger.clone());
            Ok(())
        }

        fn cancel(&self, id: i64) -> Result<(), BackendError> {
            self.registered.lock().unwrap().remove(&id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct NullNotifier;

    impl Notifier for NullNotifier {
        fn ensure_channel(&self, _channel: &ChannelSpec) -> Result<(), BackendError> {
            Ok(())
        }
        fn post(&self, _note: &AlarmNotification) -> Result<(), BackendError> {
            Ok(())
        }
        fn dismiss(&self, _id: i64) -> Result<(), BackendError> {
            Ok(())
        }
    }

    fn scheduler() -> (AlarmScheduler, std::sync::Arc<RecordingTimer>) {
        let timer = std::sync::Arc::new(RecordingTimer::default());
        let scheduler = AlarmScheduler::new(
            timer.clone(),
            std::sync::Arc::new(NullNotifier),
            EventBus::default(),
        );
        (scheduler, timer)
    }

    #[test]
    fn schedule_call_registers_and_returns_true() {
        let (scheduler, timer) = scheduler();
        let args = json!({"id": 7, "label": "Wake up", "triggerTime": 123_000});
        let result = handle_call(&scheduler, METHOD_SCHEDULE, &args).unwrap();
        assert_eq!(result, Value::Bool(true));
        assert_eq!(
            timer.registered.lock().unwrap().get(&7).unwrap().label,
            "Wake up"
        );
    }

    #[test]
    fn missing_fields_map_to_invalid_args() {
        let (scheduler, timer) = scheduler();
        for args in [
            json!({"label": "x", "triggerTime": 1}),
            json!({"id": 1, "triggerTime": 1}),
            json!({"id": 1, "label": "x"}),
            json!({}),
        ] {
            let err = handle_call(&scheduler, METHOD_SCHEDULE, &args).unwrap_err();
            assert_eq!(err.code, CallErrorCode::InvalidArgs, "args: {args}");
        }
        assert!(timer.registered.lock().unwrap().is_empty());
    }

    #[test]
    fn permission_denied_surfaces_without_side_effects() {
        let (scheduler, timer) = scheduler();
        timer.denied.store(true, Ordering::SeqCst);
        let args = json!({"id": 1, "label": "x", "triggerTime": 1_000});
        let err = handle_call(&scheduler, METHOD_SCHEDULE, &args).unwrap_err();
        assert_eq!(err.code, CallErrorCode::PermissionDenied);
        assert!(timer.registered.lock().unwrap().is_empty());
    }

    #[test]
    fn backend_rejection_maps_to_schedule_error() {
        let (scheduler, timer) = scheduler();
        timer.reject.store(true, Ordering::SeqCst);
        let args = json!({"id": 1, "label": "x", "triggerTime": 1_000});
        let err = handle_call(&scheduler, METHOD_SCHEDULE, &args).unwrap_err();
        assert_eq!(err.code, CallErrorCode::ScheduleError);
        assert!(err.message.contains("registration table full"));
    }

    #[test]
    fn cancel_call_is_idempotent() {
        let (scheduler, _timer) = scheduler();
        let args = json!({"id": 42});
        for _ in 0..3 {
            let result = handle_call(&scheduler, METHOD_CANCEL, &args).unwrap();
            assert_eq!(result, Value::Bool(true));
        }
    }

    #[test]
    fn cancel_without_id_is_invalid_args() {
        let (scheduler, _timer) = scheduler();
        let err = handle_call(&scheduler, METHOD_CANCEL, &json!({})).unwrap_err();
        assert_eq!(err.code, CallErrorCode::InvalidArgs);
    }

    #[test]
    fn unknown_method_is_not_implemented() {
        let (scheduler, _timer) = scheduler();
        let err = handle_call(&scheduler, "snoozeAlarm", &json!({})).unwrap_err();
        assert_eq!(err.code, CallErrorCode::NotImplemented);
    }

    #[test]
    fn error_codes_serialize_to_wire_names() {
        assert_eq!(
            serde_json::to_value(CallErrorCode::InvalidArgs).unwrap(),
            json!("INVALID_ARGS")
        );
        assert_eq!(
            serde_json::to_value(CallErrorCode::ScheduleError).unwrap(),
            json!("SCHEDULE_ERROR")
        );
        assert_eq!(
            serde_json::to_value(CallErrorCode::CancelError).unwrap(),
            json!("CANCEL_ERROR")
        );
    }

    #[test]
    fn launch_signal_decodes_alarm_launches() {
        let params = serde_json::to_value(LaunchParams {
            id: 7,
            label: "Wake up".into(),
            clear_stack: true,
            launched_by_alarm: true,
        })
        .unwrap();
        let signal = launch_signal(&params).unwrap();
        assert_eq!(signal.id, 7);
        assert_eq!(signal.label, "Wake up");
    }

    #[test]
    fn ordinary_launches_produce_no_signal() {
        assert_eq!(launch_signal(&json!({})), None);
        assert_eq!(launch_signal(&json!({"launched_by_alarm": false, "id": 1})), None);
        // Flagged but unroutable: no id.
        assert_eq!(launch_signal(&json!({"launched_by_alarm": true})), None);
    }

    #[test]
    fn launch_signal_defaults_missing_label() {
        let signal =
            launch_signal(&json!({"launched_by_alarm": true, "id": 3})).unwrap();
        assert_eq!(signal.label, "Alarm");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Any subset of fields either schedules cleanly or reports
            /// INVALID_ARGS -- never a panic, never a partial registration.
            #[test]
            fn schedule_call_total_over_field_subsets(
                id in proptest::option::of(1i64..10_000),
                label in proptest::option::of("[a-zA-Z ]{1,12}"),
                trigger_time in proptest::option::of(1i64..4_102_444_800_000),
            ) {
                let (scheduler, timer) = scheduler();
                let mut args = serde_json::Map::new();
                if let Some(id) = id {
                    args.insert("id".into(), id.into());
                }
                if let Some(ref label) = label {
                    args.insert("label".into(), label.clone().into());
                }
                if let Some(t) = trigger_time {
                    args.insert("triggerTime".into(), t.into());
                }
                let args = Value::Object(args);

                let complete = id.is_some() && label.is_some() && trigger_time.is_some();
                match handle_call(&scheduler, METHOD_SCHEDULE, &args) {
                    Ok(value) => {
                        prop_assert!(complete);
                        prop_assert_eq!(value, Value::Bool(true));
                        prop_assert_eq!(timer.registered.lock().unwrap().len(), 1);
                    }
                    Err(err) => {
                        prop_assert_eq!(err.code, CallErrorCode::InvalidArgs);
                        prop_assert!(timer.registered.lock().unwrap().is_empty());
                    }
                }
            }
        }
    }
}
