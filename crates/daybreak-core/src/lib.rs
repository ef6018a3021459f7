//! # Daybreak Core Library
//!
//! The alarm delivery core: schedule a wake-up at an exact future
//! wall-clock time, force the device awake when it arrives, and make sure
//! the user is reached through at least one channel even when the primary
//! UI path fails.
//!
//! ## Architecture
//!
//! - **Scheduling façade**: validated schedule/cancel over a durable
//!   external timer -- the id-to-registration mapping is owned by the
//!   backend, so it survives process restarts and cancellation is
//!   idempotent
//! - **Wake coordination**: a time-bounded wake lease acquired on fire,
//!   released by a deferred grace timer on every exit path
//! - **Delivery dispatch**: channel setup, vibration, direct surface
//!   launch, and a fallback full-screen notification, each an isolated
//!   failure domain
//! - **Alarm surface**: a lock-screen-bypassing presentation shim over the
//!   fired alarm, with bypass strategy selected by a capability probe
//!
//! ## Key Components
//!
//! - [`AlarmScheduler`]: the schedule/cancel boundary API
//! - [`DeliveryPipeline`]: the fire-path handler behind the timer callback
//! - [`platform::Platform`]: injected capability bundle (real host
//!   implementation in [`platform::host`], fakes in tests)
//! - [`Config`]: wake, vibration, and notification tunables

pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod platform;
pub mod scheduler;
pub mod surface;
pub mod trigger;
pub mod wake;

pub use config::Config;
pub use dispatch::{DeliveryAttempt, DeliveryDispatcher, DeliveryPipeline, DeliveryStep};
pub use error::{BackendError, ConfigError, CoreError, ScheduleError, SurfaceError};
pub use events::{Event, EventBus};
pub use platform::{Capabilities, Platform};
pub use scheduler::AlarmScheduler;
pub use surface::{AlarmSurface, SurfaceState};
pub use trigger::{AlarmTrigger, LaunchParams};
pub use wake::{WakeCoordinator, WakeLease};
