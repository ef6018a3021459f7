//! Fired-trigger delivery.
//!
//! Four steps run in order per fired alarm: channel setup, vibration, direct
//! surface launch, fallback notification. A step failing must never stop the
//! steps after it -- the later steps ARE the retry strategy. Outcomes are
//! collected on a [`DeliveryAttempt`] for logging and tests; nothing here is
//! persisted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::BackendError;
use crate::events::{Event, EventBus};
use crate::platform::{
    AlarmNotification, ChannelSpec, Notifier, Platform, SurfaceLauncher, TriggerHandler,
    VibrationPlan, Vibrator,
};
use crate::trigger::{AlarmTrigger, LaunchParams};
use crate::wake::WakeCoordinator;

/// One delivery step, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStep {
    Channel,
    Vibration,
    SurfaceLaunch,
    Notification,
}

impl DeliveryStep {
    pub fn name(self) -> &'static str {
        match self {
            DeliveryStep::Channel => "channel",
            DeliveryStep::Vibration => "vibration",
            DeliveryStep::SurfaceLaunch => "surface_launch",
            DeliveryStep::Notification => "notification",
        }
    }

    /// Whether success of this step alone counts as reaching the user.
    /// Channel setup is plumbing; the other three are delivery paths.
    fn reaches_user(self) -> bool {
        !matches!(self, DeliveryStep::Channel)
    }
}

/// Outcome of a single step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: DeliveryStep,
    pub outcome: StepOutcome,
}

/// Ephemeral record of the dispatch sequence for one fired trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    /// Correlates the attempt's log lines; not persisted anywhere.
    pub attempt_id: Uuid,
    pub alarm_id: i64,
    pub started_at: DateTime<Utc>,
    pub steps: Vec<StepRecord>,
}

impl DeliveryAttempt {
    fn begin(alarm_id: i64) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            alarm_id,
            started_at: Utc::now(),
            steps: Vec::new(),
        }
    }

    fn record(&mut self, step: DeliveryStep, result: Result<(), BackendError>) {
        let outcome = match result {
            Ok(()) => StepOutcome::Succeeded,
            Err(err) => {
                error!(
                    attempt = %self.attempt_id,
                    id = self.alarm_id,
                    step = step.name(),
                    %err,
                    "delivery step failed; continuing with remaining steps"
                );
                StepOutcome::Failed {
                    message: err.to_string(),
                }
            }
        };
        self.steps.push(StepRecord { step, outcome });
    }

    pub fn step_succeeded(&self, step: DeliveryStep) -> bool {
        self.steps
            .iter()
            .any(|r| r.step == step && r.outcome == StepOutcome::Succeeded)
    }

    /// Best-effort contract: delivered if at least one user-reaching step
    /// (vibration, surface launch, notification) got through.
    pub fn delivered(&self) -> bool {
        self.steps
            .iter()
            .any(|r| r.step.reaches_user() && r.outcome == StepOutcome::Succeeded)
    }

    pub fn failed_steps(&self) -> Vec<DeliveryStep> {
        self.steps
            .iter()
            .filter(|r| matches!(r.outcome, StepOutcome::Failed { .. }))
            .map(|r| r.step)
            .collect()
    }
}

/// Runs the four-step delivery sequence for one fired trigger.
pub struct DeliveryDispatcher {
    vibrator: Arc<dyn Vibrator>,
    launcher: Arc<dyn SurfaceLauncher>,
    notifier: Arc<dyn Notifier>,
    channel: ChannelSpec,
    vibration: VibrationPlan,
}

impl DeliveryDispatcher {
    pub fn new(platform: &Platform, config: &Config) -> Self {
        Self {
            vibrator: platform.vibrator.clone(),
            launcher: platform.launcher.clone(),
            notifier: platform.notifier.clone(),
            channel: ChannelSpec::alarms(&config.notifications),
            vibration: VibrationPlan::from_config(&config.vibration, &platform.capabilities),
        }
    }

    pub fn dispatch(&self, trigger: &AlarmTrigger) -> DeliveryAttempt {
        let mut attempt = DeliveryAttempt::begin(trigger.id);
        info!(
            attempt = %attempt.attempt_id,
            id = trigger.id,
            label = %trigger.label,
            "dispatching fired alarm"
        );

        attempt.record(
            DeliveryStep::Channel,
            self.notifier.ensure_channel(&self.channel),
        );
        attempt.record(DeliveryStep::Vibration, self.vibrator.vibrate(&self.vibration));

        let params = LaunchParams::for_trigger(trigger);
        attempt.record(DeliveryStep::SurfaceLaunch, self.launcher.launch(&params));

        // Posted even when the direct launch succeeded: the launch can be
        // suppressed by background-launch restrictions without an error ever
        // reaching us, and the notification is the path the user can still
        // tap.
        let note = AlarmNotification::ringing(trigger, &self.channel.id);
        attempt.record(DeliveryStep::Notification, self.notifier.post(&note));

        if attempt.delivered() {
            info!(
                attempt = %attempt.attempt_id,
                id = trigger.id,
                failed = ?attempt.failed_steps(),
                "alarm delivered"
            );
        } else {
            // No escalation path exists past this point; the operator log is
            // the last resort.
            error!(
                attempt = %attempt.attempt_id,
                id = trigger.id,
                "all delivery paths failed; alarm was not presented to the user"
            );
        }
        attempt
    }
}

/// Fire-path entry point: wires the wake coordinator and the dispatcher
/// behind the timer backend's callback.
pub struct DeliveryPipeline {
    coordinator: WakeCoordinator,
    dispatcher: DeliveryDispatcher,
    events: EventBus,
}

impl DeliveryPipeline {
    pub fn new(platform: &Platform, config: &Config, events: EventBus) -> Self {
        Self {
            coordinator: WakeCoordinator::new(
                platform.wake.clone(),
                config.wake.clone(),
                events.clone(),
            ),
            dispatcher: DeliveryDispatcher::new(platform, config),
            events,
        }
    }

    /// Handle one fired trigger: wake the device, run delivery, leave the
    /// lease release to the coordinator's grace timer.
    pub fn handle(&self, trigger: AlarmTrigger) -> DeliveryAttempt {
        self.events.emit(Event::AlarmFired {
            id: trigger.id,
            label: trigger.label.clone(),
            at: Utc::now(),
        });

        // A wake failure is not fatal: the device may already be awake, and
        // every delivery step still has a chance of reaching the user.
        if let Err(err) = self.coordinator.acquire(trigger.id) {
            warn!(
                id = trigger.id,
                %err,
                "wake lease unavailable; delivering without a wake guarantee"
            );
        }

        let attempt = self.dispatcher.dispatch(&trigger);
        self.events.emit(Event::DeliveryCompleted {
            id: trigger.id,
            delivered: attempt.delivered(),
            failed_steps: attempt
                .failed_steps()
                .iter()
                .map(|s| s.name().to_string())
                .collect(),
            at: Utc::now(),
        });
        attempt
    }
}

impl TriggerHandler for DeliveryPipeline {
    fn on_trigger(&self, trigger: AlarmTrigger) {
        self.handle(trigger);
    }
}
