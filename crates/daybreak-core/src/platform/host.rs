//! In-process host implementation of the platform seams.
//!
//! Backs the CLI and the integration tests with a real async timer: alarms
//! sleep on the tokio clock and fire through the attached handler, with
//! last-write-wins replacement per id. Registrations here live only as long
//! as the process -- durability across restarts is a property of the real
//! timer facility, not of this stand-in.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dispatch::DeliveryPipeline;
use crate::error::BackendError;
use crate::events::EventBus;
use crate::platform::{
    AlarmNotification, Capabilities, ChannelSpec, Notifier, Platform, RawWakeLease,
    SurfaceLauncher, TimerBackend, TriggerHandler, VibrationPlan, Vibrator, WakeSource,
};
use crate::scheduler::AlarmScheduler;
use crate::surface::{bypass_for, AlarmSurface, BypassStrategy};
use crate::trigger::{now_ms, AlarmTrigger, LaunchParams};

// A poisoned registry just means some other test thread panicked mid-hold;
// the data itself is still coherent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct PendingFire {
    trigger: AlarmTrigger,
    /// Registration generation; a superseded fire task must not consume its
    /// replacement's entry.
    seq: u64,
    abort: tokio::task::AbortHandle,
}

struct TimerInner {
    granted: AtomicBool,
    next_seq: std::sync::atomic::AtomicU64,
    handler: Mutex<Option<Arc<dyn TriggerHandler>>>,
    pending: Mutex<HashMap<i64, PendingFire>>,
}

/// Tokio-backed exact timer. Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct HostTimerBackend {
    inner: Arc<TimerInner>,
}

impl HostTimerBackend {
    pub fn new(granted: bool) -> Self {
        Self {
            inner: Arc::new(TimerInner {
                granted: AtomicBool::new(granted),
                next_seq: std::sync::atomic::AtomicU64::new(0),
                handler: Mutex::new(None),
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Attach the fire-path handler. Registrations made before a handler is
    /// attached fire into the void with a warning.
    pub fn set_handler(&self, handler: Arc<dyn TriggerHandler>) {
        *lock(&self.inner.handler) = Some(handler);
    }

    /// Flip the exact-scheduling grant, as the user would in settings.
    pub fn set_granted(&self, granted: bool) {
        self.inner.granted.store(granted, Ordering::SeqCst);
    }

    /// Pending registrations, soonest first.
    pub fn pending(&self) -> Vec<AlarmTrigger> {
        let mut triggers: Vec<AlarmTrigger> = lock(&self.inner.pending)
            .values()
            .map(|p| p.trigger.clone())
            .collect();
        triggers.sort_by_key(|t| (t.trigger_at_ms, t.id));
        triggers
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.inner.pending).len()
    }
}

impl TimerBackend for HostTimerBackend {
    fn can_schedule_exact(&self) -> bool {
        self.inner.granted.load(Ordering::SeqCst)
    }

    fn register(&self, trigger: &AlarmTrigger) -> Result<(), BackendError> {
        let delay = Duration::from_millis(trigger.millis_until(now_ms()));
        let seq = self.inner.next_seq.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.clone();
        let fired = trigger.clone();

        // Hold the pending lock across spawn + insert so an immediate fire
        // cannot race past the table before its own entry exists.
        let mut pending = lock(&self.inner.pending);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Leaving the pending table is the point of no return: a cancel
            // arriving after this wins nothing.
            {
                let mut pending = lock(&inner.pending);
                match pending.get(&fired.id) {
                    Some(p) if p.seq == seq => {
                        pending.remove(&fired.id);
                    }
                    // Cancelled or superseded while we slept.
                    _ => return,
                }
            }
            match lock(&inner.handler).clone() {
                Some(handler) => handler.on_trigger(fired),
                None => warn!(id = fired.id, "alarm fired with no handler attached"),
            }
        });

        let replaced = pending.insert(
            trigger.id,
            PendingFire {
                trigger: trigger.clone(),
                seq,
                abort: task.abort_handle(),
            },
        );
        drop(pending);
        if let Some(old) = replaced {
            old.abort.abort();
            debug!(id = trigger.id, "replaced pending registration");
        }
        debug!(
            id = trigger.id,
            delay_ms = delay.as_millis() as u64,
            "registration armed"
        );
        Ok(())
    }

    fn cancel(&self, id: i64) -> Result<(), BackendError> {
        if let Some(pending) = lock(&self.inner.pending).remove(&id) {
            pending.abort.abort();
            debug!(id, "registration cancelled");
        }
        Ok(())
    }
}

struct LeaseState {
    tag: String,
    released: AtomicBool,
    active: Arc<AtomicI64>,
}

impl LeaseState {
    fn finish(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        debug!(tag = %self.tag, "host wake lease dropped");
    }
}

struct HostLease {
    state: Arc<LeaseState>,
}

impl RawWakeLease for HostLease {
    fn release(&self) {
        self.state.finish();
    }
}

/// Wake source that tracks lease activity instead of touching real power
/// management.
#[derive(Clone, Default)]
pub struct HostWakeSource {
    active: Arc<AtomicI64>,
}

impl HostWakeSource {
    pub fn active_leases(&self) -> i64 {
        self.active.load(Ordering::SeqCst)
    }
}

impl WakeSource for HostWakeSource {
    fn acquire(
        &self,
        tag: &str,
        max_hold: Duration,
    ) -> Result<Box<dyn RawWakeLease>, BackendError> {
        let state = Arc::new(LeaseState {
            tag: tag.to_string(),
            released: AtomicBool::new(false),
            active: self.active.clone(),
        });
        self.active.fetch_add(1, Ordering::SeqCst);
        debug!(tag, max_hold_secs = max_hold.as_secs(), "host wake lease acquired");

        // The facility-side ceiling: expire the lease even if nobody ever
        // releases it.
        let expiry = state.clone();
        tokio::spawn(async move {
            tokio::time::sleep(max_hold).await;
            expiry.finish();
        });

        Ok(Box::new(HostLease { state }))
    }
}

/// Vibrator that records the active plan.
#[derive(Default)]
pub struct HostVibrator {
    current: Mutex<Option<VibrationPlan>>,
}

impl HostVibrator {
    pub fn playing(&self) -> Option<VibrationPlan> {
        lock(&self.current).clone()
    }
}

impl Vibrator for HostVibrator {
    fn vibrate(&self, plan: &VibrationPlan) -> Result<(), BackendError> {
        info!("vibration started");
        *lock(&self.current) = Some(plan.clone());
        Ok(())
    }

    fn cancel(&self) -> Result<(), BackendError> {
        *lock(&self.current) = None;
        Ok(())
    }
}

/// Notifier with an in-memory channel and notification table.
#[derive(Default)]
pub struct HostNotifier {
    channels: Mutex<HashMap<String, ChannelSpec>>,
    active: Mutex<HashMap<i64, AlarmNotification>>,
}

impl HostNotifier {
    pub fn channel_exists(&self, id: &str) -> bool {
        lock(&self.channels).contains_key(id)
    }

    pub fn active(&self) -> Vec<AlarmNotification> {
        let mut notes: Vec<AlarmNotification> = lock(&self.active).values().cloned().collect();
        notes.sort_by_key(|n| n.id);
        notes
    }

    pub fn notification(&self, id: i64) -> Option<AlarmNotification> {
        lock(&self.active).get(&id).cloned()
    }
}

impl Notifier for HostNotifier {
    fn ensure_channel(&self, channel: &ChannelSpec) -> Result<(), BackendError> {
        lock(&self.channels)
            .entry(channel.id.clone())
            .or_insert_with(|| channel.clone());
        Ok(())
    }

    fn post(&self, note: &AlarmNotification) -> Result<(), BackendError> {
        info!(id = note.id, title = %note.title, "notification posted");
        lock(&self.active).insert(note.id, note.clone());
        Ok(())
    }

    fn dismiss(&self, id: i64) -> Result<(), BackendError> {
        lock(&self.active).remove(&id);
        Ok(())
    }
}

/// Launch target that instantiates the alarm surface in-process.
pub struct HostSurfaceLauncher {
    bypass: Box<dyn BypassStrategy>,
    current: Mutex<Option<AlarmSurface>>,
    launches: Mutex<Vec<LaunchParams>>,
}

impl HostSurfaceLauncher {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            bypass: bypass_for(&capabilities),
            current: Mutex::new(None),
            launches: Mutex::new(Vec::new()),
        }
    }

    /// The launch payload of the surface currently on screen.
    pub fn current_alarm(&self) -> Option<LaunchParams> {
        lock(&self.current).as_ref().map(|s| s.params().clone())
    }

    /// Every launch this process has seen, in order.
    pub fn launches(&self) -> Vec<LaunchParams> {
        lock(&self.launches).clone()
    }
}

impl SurfaceLauncher for HostSurfaceLauncher {
    fn launch(&self, params: &LaunchParams) -> Result<(), BackendError> {
        info!(id = params.id, label = %params.label, "launching alarm surface");
        let mut surface = AlarmSurface::create(params.clone(), self.bypass.as_ref());
        surface
            .resume()
            .map_err(|e| BackendError::Failed(e.to_string()))?;

        let mut current = lock(&self.current);
        if let Some(previous) = current.as_mut() {
            if params.clear_stack {
                if let Err(err) = previous.destroy() {
                    warn!(%err, "stale alarm surface refused to die");
                }
            }
        }
        *current = Some(surface);
        lock(&self.launches).push(params.clone());
        Ok(())
    }
}

/// Everything the CLI needs from a running host platform: the scheduler
/// façade plus concrete handles for introspection.
pub struct HostRuntime {
    pub scheduler: AlarmScheduler,
    pub events: EventBus,
    pub timer: HostTimerBackend,
    pub wake: HostWakeSource,
    pub vibrator: Arc<HostVibrator>,
    pub notifier: Arc<HostNotifier>,
    pub launcher: Arc<HostSurfaceLauncher>,
    pub platform: Platform,
}

/// Assemble the full in-process stack: host backends, delivery pipeline
/// wired behind the timer, and the scheduling façade in front of it.
pub fn bring_up(config: &Config, capabilities: Capabilities, granted: bool) -> HostRuntime {
    let timer = HostTimerBackend::new(granted);
    let wake = HostWakeSource::default();
    let vibrator = Arc::new(HostVibrator::default());
    let notifier = Arc::new(HostNotifier::default());
    let launcher = Arc::new(HostSurfaceLauncher::new(capabilities));

    let platform = Platform {
        timer: Arc::new(timer.clone()),
        wake: Arc::new(wake.clone()),
        vibrator: vibrator.clone(),
        notifier: notifier.clone(),
        launcher: launcher.clone(),
        capabilities,
    };

    let events = EventBus::default();
    let pipeline = Arc::new(DeliveryPipeline::new(&platform, config, events.clone()));
    timer.set_handler(pipeline);
    let scheduler = AlarmScheduler::from_platform(&platform, events.clone());

    HostRuntime {
        scheduler,
        events,
        timer,
        wake,
        vibrator,
        notifier,
        launcher,
        platform,
    }
}
