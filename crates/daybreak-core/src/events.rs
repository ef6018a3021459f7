use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Every externally observable state change produces an Event.
/// The CLI prints them; tests assert on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    AlarmScheduled {
        id: i64,
        label: String,
        trigger_at_ms: i64,
        at: DateTime<Utc>,
    },
    AlarmCancelled {
        id: i64,
        at: DateTime<Utc>,
    },
    /// The timer backend delivered the wake-up callback for an alarm.
    AlarmFired {
        id: i64,
        label: String,
        at: DateTime<Utc>,
    },
    WakeLeaseAcquired {
        id: i64,
        at: DateTime<Utc>,
    },
    WakeLeaseReleased {
        id: i64,
        held_ms: u64,
        at: DateTime<Utc>,
    },
    /// The dispatch sequence for a fired alarm finished. `delivered` is the
    /// best-effort verdict: at least one user-reaching step got through.
    DeliveryCompleted {
        id: i64,
        delivered: bool,
        failed_steps: Vec<String>,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// The alarm id this event concerns.
    pub fn alarm_id(&self) -> i64 {
        match self {
            Event::AlarmScheduled { id, .. }
            | Event::AlarmCancelled { id, .. }
            | Event::AlarmFired { id, .. }
            | Event::WakeLeaseAcquired { id, .. }
            | Event::WakeLeaseReleased { id, .. }
            | Event::DeliveryCompleted { id, .. } => *id,
        }
    }
}

/// Broadcast fan-out for events. Observers that lag simply miss events;
/// scheduling and delivery never block on them.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: Event) {
        // Send only fails when nobody is listening, which is fine.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_subscribers_is_a_noop() {
        let bus = EventBus::default();
        bus.emit(Event::AlarmCancelled {
            id: 1,
            at: Utc::now(),
        });
    }

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.emit(Event::AlarmCancelled {
            id: 1,
            at: Utc::now(),
        });
        bus.emit(Event::AlarmCancelled {
            id: 2,
            at: Utc::now(),
        });
        assert_eq!(rx.recv().await.unwrap().alarm_id(), 1);
        assert_eq!(rx.recv().await.unwrap().alarm_id(), 2);
    }
}
