//! Full-screen alarm surface.
//!
//! The surface is a presentation shim over a fired alarm: it asserts itself
//! over a locked screen and hands the triggering alarm's identity to the
//! application. No alarm logic lives here.
//!
//! Lock-screen bypass must be in place before the surface becomes visible;
//! applying it afterwards leaves the first frame behind the keyguard.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SurfaceError;
use crate::platform::Capabilities;
use crate::trigger::LaunchParams;

/// Surface lifecycle: `Created -> Resumed -> Paused <-> Resumed -> Destroyed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceState {
    Created,
    Resumed,
    Paused,
    Destroyed,
}

/// Window flag bits used by the legacy bypass path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowFlags {
    pub show_when_locked: bool,
    pub dismiss_keyguard: bool,
    pub turn_screen_on: bool,
    pub keep_screen_on: bool,
}

/// Pre-visibility window state a bypass strategy manipulates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceWindow {
    pub flags: WindowFlags,
    /// Declarative requests on environments that support them.
    pub show_when_locked_requested: bool,
    pub turn_screen_on_requested: bool,
    pub keyguard_dismiss_requested: bool,
}

impl SurfaceWindow {
    /// Whether any bypass mechanism has been applied at all.
    pub fn bypass_applied(&self) -> bool {
        self.show_when_locked_requested || self.flags.show_when_locked
    }
}

/// Lock-screen bypass, chosen once from the capability probe.
pub trait BypassStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Apply bypass to `window`. Must run before the surface is shown.
    fn apply(&self, window: &mut SurfaceWindow);
}

/// Declarative show-when-locked / turn-screen-on / dismiss-keyguard
/// requests on newer environments.
pub struct DeclarativeBypass;

impl BypassStrategy for DeclarativeBypass {
    fn name(&self) -> &'static str {
        "declarative"
    }

    fn apply(&self, window: &mut SurfaceWindow) {
        window.show_when_locked_requested = true;
        window.turn_screen_on_requested = true;
        window.keyguard_dismiss_requested = true;
    }
}

/// Explicit window flag bits on older environments.
pub struct WindowFlagBypass;

impl BypassStrategy for WindowFlagBypass {
    fn name(&self) -> &'static str {
        "window-flags"
    }

    fn apply(&self, window: &mut SurfaceWindow) {
        window.flags.show_when_locked = true;
        window.flags.dismiss_keyguard = true;
        window.flags.turn_screen_on = true;
        window.flags.keep_screen_on = true;
    }
}

/// Select the bypass strategy for the probed environment.
pub fn bypass_for(caps: &Capabilities) -> Box<dyn BypassStrategy> {
    if caps.declarative_lock_bypass {
        Box::new(DeclarativeBypass)
    } else {
        Box::new(WindowFlagBypass)
    }
}

/// The alarm surface state machine.
#[derive(Debug)]
pub struct AlarmSurface {
    params: LaunchParams,
    state: SurfaceState,
    window: SurfaceWindow,
}

impl AlarmSurface {
    /// Build the surface with bypass applied before it can become visible.
    pub fn create(params: LaunchParams, bypass: &dyn BypassStrategy) -> Self {
        let mut window = SurfaceWindow::default();
        bypass.apply(&mut window);
        debug!(
            id = params.id,
            strategy = bypass.name(),
            "alarm surface created"
        );
        Self {
            params,
            state: SurfaceState::Created,
            window,
        }
    }

    pub fn alarm_id(&self) -> i64 {
        self.params.id
    }

    pub fn label(&self) -> &str {
        &self.params.label
    }

    /// The launch payload, for wiring stop/snooze and app navigation.
    pub fn params(&self) -> &LaunchParams {
        &self.params
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn window(&self) -> &SurfaceWindow {
        &self.window
    }

    pub fn resume(&mut self) -> Result<(), SurfaceError> {
        match self.state {
            SurfaceState::Created | SurfaceState::Paused => {
                self.transition(SurfaceState::Resumed);
                Ok(())
            }
            from => Err(SurfaceError::InvalidTransition {
                from,
                to: SurfaceState::Resumed,
            }),
        }
    }

    pub fn pause(&mut self) -> Result<(), SurfaceError> {
        match self.state {
            SurfaceState::Resumed => {
                self.transition(SurfaceState::Paused);
                Ok(())
            }
            from => Err(SurfaceError::InvalidTransition {
                from,
                to: SurfaceState::Paused,
            }),
        }
    }

    pub fn destroy(&mut self) -> Result<(), SurfaceError> {
        match self.state {
            SurfaceState::Destroyed => Err(SurfaceError::InvalidTransition {
                from: SurfaceState::Destroyed,
                to: SurfaceState::Destroyed,
            }),
            _ => {
                self.transition(SurfaceState::Destroyed);
                Ok(())
            }
        }
    }

    fn transition(&mut self, to: SurfaceState) {
        debug!(id = self.params.id, from = ?self.state, to = ?to, "surface transition");
        self.state = to;
    }
}
