//! Capability seams over the operating environment.
//!
//! Everything the delivery core needs from the outside world -- the exact
//! timer, wake/power management, vibration, notifications, surface launches
//! -- comes through these traits. The CLI runs on the in-process [`host`]
//! implementation; tests substitute fakes with fault injection.
//!
//! The timer is deliberately NOT modeled as in-process state: a registration
//! outlives the process that made it, and the fire callback must carry
//! everything needed to deliver the alarm from a cold start.

pub mod host;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{NotificationsConfig, VibrationConfig};
use crate::error::BackendError;
use crate::trigger::{AlarmTrigger, LaunchParams};

/// Durable exact-timer facility.
///
/// Registrations are owned by the backend, not the process: they survive a
/// process restart and are destroyed by `cancel` or by firing exactly once.
/// Registering an id that already has a pending registration atomically
/// replaces it.
pub trait TimerBackend: Send + Sync {
    /// Whether the exact-scheduling grant is currently held. When false,
    /// `register` must not be called -- the caller surfaces the denial
    /// instead of degrading to inexact timing.
    fn can_schedule_exact(&self) -> bool;

    /// Register `trigger` to fire at its wall-clock time, replacing any
    /// pending registration with the same id.
    fn register(&self, trigger: &AlarmTrigger) -> Result<(), BackendError>;

    /// Remove the pending registration for `id`. Unknown ids are a no-op,
    /// not an error. Cancellation races with an in-flight fire of the same
    /// id resolve in the backend's favor: cancel wins only if it lands
    /// before the callback has irrevocably begun.
    fn cancel(&self, id: i64) -> Result<(), BackendError>;
}

/// Receives the backend's wake-up callback when a registration fires.
///
/// The callback runs on a constrained, time-boxed execution context;
/// implementations must return promptly and hand longer work off to spawned
/// tasks.
pub trait TriggerHandler: Send + Sync {
    fn on_trigger(&self, trigger: AlarmTrigger);
}

/// Wake/power facility: forces the device active and screen-capable.
pub trait WakeSource: Send + Sync {
    /// Acquire a raw lease. The facility force-expires it after `max_hold`
    /// if it has not been released by then.
    fn acquire(&self, tag: &str, max_hold: Duration)
        -> Result<Box<dyn RawWakeLease>, BackendError>;
}

/// Facility-held side of a wake lease. The coordinator guarantees at most
/// one `release` call; implementations do not need their own idempotence.
pub trait RawWakeLease: Send + Sync {
    fn release(&self);
}

/// Vibration hardware.
pub trait Vibrator: Send + Sync {
    /// Play `plan` until `cancel` or a later `vibrate` supersedes it.
    fn vibrate(&self, plan: &VibrationPlan) -> Result<(), BackendError>;

    fn cancel(&self) -> Result<(), BackendError>;
}

/// Notification facility.
pub trait Notifier: Send + Sync {
    /// Create the channel if it does not exist yet. Safe to call on every
    /// delivery.
    fn ensure_channel(&self, channel: &ChannelSpec) -> Result<(), BackendError>;

    /// Post or replace the notification keyed by `note.id`.
    fn post(&self, note: &AlarmNotification) -> Result<(), BackendError>;

    /// Dismiss the notification keyed by `id`, if visible. Unknown ids are
    /// a no-op.
    fn dismiss(&self, id: i64) -> Result<(), BackendError>;
}

/// Launches the full-screen alarm surface.
pub trait SurfaceLauncher: Send + Sync {
    /// Best-effort: the environment may refuse background launches, which
    /// is exactly why the fallback notification exists.
    fn launch(&self, params: &LaunchParams) -> Result<(), BackendError>;
}

/// Environment capability probe, taken once at startup.
///
/// Strategy selection happens here rather than as version checks scattered
/// through the call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Declarative show-when-locked / turn-screen-on / dismiss-keyguard
    /// requests are available; otherwise legacy window flags are used.
    pub declarative_lock_bypass: bool,
    /// Vibration hardware accepts per-segment amplitudes.
    pub amplitude_control: bool,
}

impl Capabilities {
    pub const MODERN: Self = Self {
        declarative_lock_bypass: true,
        amplitude_control: true,
    };

    pub const LEGACY: Self = Self {
        declarative_lock_bypass: false,
        amplitude_control: false,
    };
}

/// Channel/category settings for alarm-class notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Heads-up importance.
    pub high_importance: bool,
    /// Alarms ring through do-not-disturb.
    pub bypass_dnd: bool,
    pub vibration: bool,
}

impl ChannelSpec {
    pub fn alarms(cfg: &NotificationsConfig) -> Self {
        Self {
            id: cfg.channel_id.clone(),
            name: cfg.channel_name.clone(),
            description: cfg.channel_description.clone(),
            high_importance: true,
            bypass_dnd: true,
            vibration: true,
        }
    }
}

/// A concrete vibration request, already shaped for the probed hardware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VibrationPlan {
    /// Timed waveform with per-segment amplitudes.
    Waveform {
        timings_ms: Vec<u64>,
        amplitudes: Vec<u8>,
        /// Segment index to repeat from; `None` plays once.
        repeat_from: Option<usize>,
    },
    /// Plain on/off pattern for hardware without amplitude control.
    Pattern {
        timings_ms: Vec<u64>,
        repeat_from: Option<usize>,
    },
}

impl VibrationPlan {
    /// Shape `cfg` to what the probed hardware supports.
    pub fn from_config(cfg: &VibrationConfig, caps: &Capabilities) -> Self {
        let repeat_from = cfg.repeat.then_some(0);
        if caps.amplitude_control {
            VibrationPlan::Waveform {
                timings_ms: cfg.timings_ms.clone(),
                amplitudes: cfg.amplitudes.clone(),
                repeat_from,
            }
        } else {
            VibrationPlan::Pattern {
                timings_ms: cfg.timings_ms.clone(),
                repeat_from,
            }
        }
    }
}

/// The fallback notification posted on every fire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmNotification {
    /// Keyed by the trigger id; reposting replaces.
    pub id: i64,
    pub channel_id: String,
    pub title: String,
    pub body: String,
    /// Maximum priority, alarm category.
    pub max_priority: bool,
    /// Present full screen when the device is locked or idle.
    pub full_screen: bool,
    /// Dismiss automatically once tapped.
    pub auto_dismiss: bool,
    /// Tapping re-attempts the surface launch with the same payload.
    pub tap_action: LaunchParams,
}

impl AlarmNotification {
    /// The notification for a ringing alarm.
    pub fn ringing(trigger: &AlarmTrigger, channel_id: &str) -> Self {
        Self {
            id: trigger.id,
            channel_id: channel_id.to_string(),
            title: trigger.label.clone(),
            body: "Alarm ringing. Tap to open.".into(),
            max_priority: true,
            full_screen: true,
            auto_dismiss: true,
            tap_action: LaunchParams::for_trigger(trigger),
        }
    }
}

/// The full capability bundle handed to the delivery core.
#[derive(Clone)]
pub struct Platform {
    pub timer: Arc<dyn TimerBackend>,
    pub wake: Arc<dyn WakeSource>,
    pub vibrator: Arc<dyn Vibrator>,
    pub notifier: Arc<dyn Notifier>,
    pub launcher: Arc<dyn SurfaceLauncher>,
    pub capabilities: Capabilities,
}
