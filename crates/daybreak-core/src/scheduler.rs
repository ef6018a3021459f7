//! Scheduling façade.
//!
//! The boundary API application logic calls. It owns no state of its own:
//! the id -> pending-registration mapping lives in the timer backend, so
//! schedule and cancel behave the same across process restarts.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::ScheduleError;
use crate::events::{Event, EventBus};
use crate::platform::{Notifier, Platform, TimerBackend};
use crate::trigger::AlarmTrigger;

pub struct AlarmScheduler {
    timer: Arc<dyn TimerBackend>,
    notifier: Arc<dyn Notifier>,
    events: EventBus,
}

impl AlarmScheduler {
    pub fn new(timer: Arc<dyn TimerBackend>, notifier: Arc<dyn Notifier>, events: EventBus) -> Self {
        Self {
            timer,
            notifier,
            events,
        }
    }

    pub fn from_platform(platform: &Platform, events: EventBus) -> Self {
        Self::new(platform.timer.clone(), platform.notifier.clone(), events)
    }

    /// Register `trigger`, replacing any pending registration with the same
    /// id. Fails closed on a missing exact-scheduling grant: no side
    /// effects, no silent fallback to inexact timing.
    pub fn schedule(&self, trigger: AlarmTrigger) -> Result<(), ScheduleError> {
        trigger.validate()?;
        if !self.timer.can_schedule_exact() {
            warn!(
                id = trigger.id,
                "exact-alarm grant missing; refusing to schedule"
            );
            return Err(ScheduleError::PermissionDenied);
        }
        self.timer.register(&trigger)?;
        info!(
            id = trigger.id,
            label = %trigger.label,
            trigger_at_ms = trigger.trigger_at_ms,
            "alarm scheduled"
        );
        self.events.emit(Event::AlarmScheduled {
            id: trigger.id,
            label: trigger.label,
            trigger_at_ms: trigger.trigger_at_ms,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Cancel the pending registration for `id`, if any, and dismiss a
    /// still-visible fallback notification. Unknown ids succeed -- cancel is
    /// idempotent.
    pub fn cancel(&self, id: i64) -> Result<(), ScheduleError> {
        self.timer.cancel(id)?;
        if let Err(err) = self.notifier.dismiss(id) {
            // The registration is already gone; a lingering notification is
            // cosmetic and not worth failing the cancel over.
            warn!(id, %err, "could not dismiss fallback notification");
        }
        info!(id, "alarm cancelled");
        self.events.emit(Event::AlarmCancelled {
            id,
            at: Utc::now(),
        });
        Ok(())
    }
}
