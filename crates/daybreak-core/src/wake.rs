//! Wake lease acquisition and deferred release.
//!
//! On fire, the device must be forced awake before any delivery work runs,
//! and the lease must be let go on every exit path -- a stuck lease pins
//! device power indefinitely. Release is therefore scheduled up front on a
//! separate timer task rather than at the end of the delivery sequence: the
//! fire callback returns promptly and a panic or error mid-delivery cannot
//! skip the release.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::debug;

use crate::config::WakeConfig;
use crate::error::BackendError;
use crate::events::{Event, EventBus};
use crate::platform::{RawWakeLease, WakeSource};

const WAKE_TAG: &str = "daybreak:alarm-wake";

struct LeaseInner {
    id: i64,
    raw: Box<dyn RawWakeLease>,
    released: AtomicBool,
    acquired_at: Instant,
    released_at: OnceLock<Instant>,
    events: EventBus,
}

/// A held wake lease. Cloning shares the same underlying lease; release is
/// idempotent across clones.
#[derive(Clone)]
pub struct WakeLease {
    inner: Arc<LeaseInner>,
}

impl WakeLease {
    /// The alarm id this lease was acquired for.
    pub fn id(&self) -> i64 {
        self.inner.id
    }

    pub fn is_held(&self) -> bool {
        !self.inner.released.load(Ordering::SeqCst)
    }

    /// How long the lease has been held, or was held before release.
    pub fn held(&self) -> Duration {
        match self.inner.released_at.get() {
            Some(at) => at.duration_since(self.inner.acquired_at),
            None => self.inner.acquired_at.elapsed(),
        }
    }

    /// Release the lease. Releasing an already-released lease is a no-op.
    pub fn release(&self) {
        if self.inner.released.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.inner.released_at.set(Instant::now());
        self.inner.raw.release();
        let held = self.held();
        debug!(
            id = self.inner.id,
            held_ms = held.as_millis() as u64,
            "wake lease released"
        );
        self.inner.events.emit(Event::WakeLeaseReleased {
            id: self.inner.id,
            held_ms: held.as_millis() as u64,
            at: Utc::now(),
        });
    }
}

/// Acquires a lease when an alarm fires and schedules its release after the
/// grace window, regardless of how delivery goes.
pub struct WakeCoordinator {
    wake: Arc<dyn WakeSource>,
    config: WakeConfig,
    events: EventBus,
}

impl WakeCoordinator {
    pub fn new(wake: Arc<dyn WakeSource>, config: WakeConfig, events: EventBus) -> Self {
        Self {
            wake,
            config,
            events,
        }
    }

    /// Force the device awake for alarm `id` and schedule the deferred
    /// release. The returned lease may also be released early; the deferred
    /// release then becomes a no-op.
    pub fn acquire(&self, id: i64) -> Result<WakeLease, BackendError> {
        let raw = self.wake.acquire(WAKE_TAG, self.config.max_hold())?;
        let lease = WakeLease {
            inner: Arc::new(LeaseInner {
                id,
                raw,
                released: AtomicBool::new(false),
                acquired_at: Instant::now(),
                released_at: OnceLock::new(),
                events: self.events.clone(),
            }),
        };
        debug!(
            id,
            max_hold_secs = self.config.max_hold_secs,
            grace_secs = self.config.release_grace_secs,
            "wake lease acquired"
        );
        self.events.emit(Event::WakeLeaseAcquired {
            id,
            at: Utc::now(),
        });

        let deferred = lease.clone();
        let grace = self.config.release_grace();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            deferred.release();
        });

        Ok(lease)
    }
}
