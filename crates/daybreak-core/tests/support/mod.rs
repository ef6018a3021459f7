//! Shared fakes with fault injection for the integration suites.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use daybreak_core::error::BackendError;
use daybreak_core::platform::{
    AlarmNotification, Capabilities, ChannelSpec, Notifier, Platform, RawWakeLease,
    SurfaceLauncher, TimerBackend, VibrationPlan, Vibrator, WakeSource,
};
use daybreak_core::trigger::{AlarmTrigger, LaunchParams};

#[derive(Default)]
pub struct FakeTimer {
    pub denied: AtomicBool,
    registered: Mutex<HashMap<i64, AlarmTrigger>>,
}

impl FakeTimer {
    pub fn registered_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.registered.lock().unwrap().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn registration(&self, id: i64) -> Option<AlarmTrigger> {
        self.registered.lock().unwrap().get(&id).cloned()
    }

    /// Simulate the backend beginning the callback: the registration is
    /// consumed and handed to the caller to fire.
    pub fn take(&self, id: i64) -> Option<AlarmTrigger> {
        self.registered.lock().unwrap().remove(&id)
    }
}

impl TimerBackend for FakeTimer {
    fn can_schedule_exact(&self) -> bool {
        !self.denied.load(Ordering::SeqCst)
    }

    fn register(&self, trigger: &AlarmTrigger) -> Result<(), BackendError> {
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

pub struct LeaseProbe {
    pub acquired_at: Instant,
    released_at: Mutex<Option<Instant>>,
}

impl LeaseProbe {
    pub fn held(&self) -> Option<Duration> {
        self.released_at
            .lock()
            .unwrap()
            .map(|at| at.duration_since(self.acquired_at))
    }

    pub fn is_released(&self) -> bool {
        self.released_at.lock().unwrap().is_some()
    }
}

struct ProbeLease {
    probe: Arc<LeaseProbe>,
}

impl RawWakeLease for ProbeLease {
    fn release(&self) {
        *self.probe.released_at.lock().unwrap() = Some(Instant::now());
    }
}

#[derive(Default)]
pub struct FakeWake {
    pub fail: AtomicBool,
    leases: Mutex<Vec<Arc<LeaseProbe>>>,
}

impl FakeWake {
    pub fn leases(&self) -> Vec<Arc<LeaseProbe>> {
        self.leases.lock().unwrap().clone()
    }
}

impl WakeSource for FakeWake {
    fn acquire(
        &self,
        _tag: &str,
        _max_hold: Duration,
    ) -> Result<Box<dyn RawWakeLease>, BackendError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable {
                facility: "wake",
                message: "injected wake failure".into(),
            });
        }
        let probe = Arc::new(LeaseProbe {
            acquired_at: Instant::now(),
            released_at: Mutex::new(None),
        });
        self.leases.lock().unwrap().push(probe.clone());
        Ok(Box::new(ProbeLease { probe }))
    }
}

#[derive(Default)]
pub struct FakeVibrator {
    pub fail: AtomicBool,
    pub starts: AtomicUsize,
}

impl Vibrator for FakeVibrator {
    fn vibrate(&self, _plan: &VibrationPlan) -> Result<(), BackendError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BackendError::Failed("injected vibration failure".into()));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn cancel(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeLauncher {
    pub fail: AtomicBool,
    launches: Mutex<Vec<LaunchParams>>,
}

impl FakeLauncher {
    pub fn launches(&self) -> Vec<LaunchParams> {
        self.launches.lock().unwrap().clone()
    }
}

impl SurfaceLauncher for FakeLauncher {
    fn launch(&self, params: &LaunchParams) -> Result<(), BackendError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BackendError::Failed(
                "injected background-launch restriction".into(),
            ));
        }
        self.launches.lock().unwrap().push(params.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    pub fail_post: AtomicBool,
    channels: Mutex<Vec<ChannelSpec>>,
    posted: Mutex<Vec<AlarmNotification>>,
    dismissed: Mutex<Vec<i64>>,
}

impl FakeNotifier {
    pub fn posted(&self) -> Vec<AlarmNotification> {
        self.posted.lock().unwrap().clone()
    }

    pub fn channels(&self) -> Vec<ChannelSpec> {
        self.channels.lock().unwrap().clone()
    }

    pub fn dismissed(&self) -> Vec<i64> {
        self.dismissed.lock().unwrap().clone()
    }
}

impl Notifier for FakeNotifier {
    fn ensure_channel(&self, channel: &ChannelSpec) -> Result<(), BackendError> {
        let mut channels = self.channels.lock().unwrap();
        if !channels.iter().any(|c| c.id == channel.id) {
            channels.push(channel.clone());
        }
        Ok(())
    }

    fn post(&self, note: &AlarmNotification) -> Result<(), BackendError> {
        if self.fail_post.load(Ordering::SeqCst) {
            return Err(BackendError::Failed("injected notification failure".into()));
        }
        self.posted.lock().unwrap().push(note.clone());
        Ok(())
    }

    fn dismiss(&self, id: i64) -> Result<(), BackendError> {
        self.dismissed.lock().unwrap().push(id);
        Ok(())
    }
}

pub struct Fakes {
    pub platform: Platform,
    pub timer: Arc<FakeTimer>,
    pub wake: Arc<FakeWake>,
    pub vibrator: Arc<FakeVibrator>,
    pub launcher: Arc<FakeLauncher>,
    pub notifier: Arc<FakeNotifier>,
}

pub fn fakes() -> Fakes {
    let timer = Arc::new(FakeTimer::default());
    let wake = Arc::new(FakeWake::default());
    let vibrator = Arc::new(FakeVibrator::default());
    let launcher = Arc::new(FakeLauncher::default());
    let notifier = Arc::new(FakeNotifier::default());
    let platform = Platform {
        timer: timer.clone(),
        wake: wake.clone(),
        vibrator: vibrator.clone(),
        notifier: notifier.clone(),
        launcher: launcher.clone(),
        capabilities: Capabilities::MODERN,
    };
    Fakes {
        platform,
        timer,
        wake,
        vibrator,
        launcher,
        notifier,
    }
}
