//! Alarm trigger data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;

/// A single alarm instance as handed to the scheduler.
///
/// Immutable once scheduled. Scheduling again under the same `id` replaces
/// the pending registration for that id -- last write wins, no duplicate
/// fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmTrigger {
    /// Caller-assigned key. Doubles as the timer and notification id, so it
    /// must be stable and unique per logical alarm.
    pub id: i64,
    pub label: String,
    /// Absolute wall-clock fire time, milliseconds since the Unix epoch.
    pub trigger_at_ms: i64,
}

impl AlarmTrigger {
    pub fn new(id: i64, label: impl Into<String>, trigger_at_ms: i64) -> Self {
        Self {
            id,
            label: label.into(),
            trigger_at_ms,
        }
    }

    /// Reject triggers that cannot be registered at all. Past times are
    /// accepted -- the backend fires them immediately.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.label.trim().is_empty() {
            return Err(ScheduleError::InvalidArgument(
                "label must not be empty".into(),
            ));
        }
        if self.trigger_at_ms <= 0 {
            return Err(ScheduleError::InvalidArgument(format!(
                "trigger time must be a positive epoch timestamp, got {}",
                self.trigger_at_ms
            )));
        }
        Ok(())
    }

    /// Wall-clock fire time, if the timestamp is representable.
    pub fn trigger_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.trigger_at_ms)
    }

    /// Milliseconds until the fire time, clamped to zero for past triggers.
    pub fn millis_until(&self, now_ms: i64) -> u64 {
        self.trigger_at_ms.saturating_sub(now_ms).max(0) as u64
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parameters attached to an alarm surface launch.
///
/// The same payload rides on the direct launch and on the fallback
/// notification's tap action, so either path resumes the process with enough
/// context to render the ringing alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchParams {
    pub id: i64,
    pub label: String,
    /// Replace any existing alarm surface task instead of stacking a new one.
    pub clear_stack: bool,
    /// Marks the launch as alarm-initiated so a cold-started process can
    /// route straight to the ringing screen.
    pub launched_by_alarm: bool,
}

impl LaunchParams {
    pub fn for_trigger(trigger: &AlarmTrigger) -> Self {
        Self {
            id: trigger.id,
            label: trigger.label.clone(),
            clear_stack: true,
            launched_by_alarm: true,
        }
    }
}
