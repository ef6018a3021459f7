//! End-to-end demo loop on the in-process host platform.
//!
//! Schedules the requested alarms, optionally cancels some, then prints
//! every event as a JSON line until each scheduled alarm has either
//! delivered or been cancelled.

use std::collections::HashSet;
use std::error::Error;

use daybreak_core::platform::host::bring_up;
use daybreak_core::platform::Capabilities;
use daybreak_core::trigger::{now_ms, AlarmTrigger};
use daybreak_core::{Config, Event};

#[derive(Debug, PartialEq, Eq)]
pub struct AlarmSpec {
    pub id: i64,
    pub label: String,
    pub at_ms: i64,
}

/// Parse `id=<n>,label=<text>,in=<seconds>` (or `at=<epoch-millis>`).
pub fn parse_spec(spec: &str) -> Result<AlarmSpec, String> {
    let mut id = None;
    let mut label = None;
    let mut in_secs = None;
    let mut at_ms = None;

    for part in spec.split(',') {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| format!("bad segment '{part}', expected key=value"))?;
        let value = value.trim();
        match key.trim() {
            "id" => id = Some(value.parse::<i64>().map_err(|e| format!("id: {e}"))?),
            "label" => label = Some(value.to_string()),
            "in" => in_secs = Some(value.parse::<u64>().map_err(|e| format!("in: {e}"))?),
            "at" => at_ms = Some(value.parse::<i64>().map_err(|e| format!("at: {e}"))?),
            other => return Err(format!("unknown key: {other}")),
        }
    }

    let id = id.ok_or("missing id=")?;
    let label = label.ok_or("missing label=")?;
    let at_ms = match (at_ms, in_secs) {
        (Some(at), _) => at,
        (None, Some(secs)) => now_ms() + secs as i64 * 1000,
        (None, None) => return Err("missing in= or at=".into()),
    };
    Ok(AlarmSpec { id, label, at_ms })
}

pub async fn run(
    alarms: Vec<String>,
    cancels: Vec<i64>,
    deny_exact: bool,
    legacy: bool,
) -> Result<(), Box<dyn Error>> {
    let specs = alarms
        .iter()
        .map(|s| parse_spec(s))
        .collect::<Result<Vec<_>, _>>()?;

    let capabilities = if legacy {
        Capabilities::LEGACY
    } else {
        Capabilities::MODERN
    };
    let rt = bring_up(&Config::load_or_default(), capabilities, !deny_exact);
    let mut events = rt.events.subscribe();

    let mut outstanding = HashSet::new();
    for spec in specs {
        rt.scheduler
            .schedule(AlarmTrigger::new(spec.id, spec.label, spec.at_ms))?;
        outstanding.insert(spec.id);
    }
    for id in cancels {
        rt.scheduler.cancel(id)?;
    }

    while !outstanding.is_empty() {
        match events.recv().await {
            Ok(event) => {
                println!("{}", serde_json::to_string(&event)?);
                if let Event::DeliveryCompleted { id, .. } | Event::AlarmCancelled { id, .. } =
                    event
                {
                    outstanding.remove(&id);
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    Ok(())
}
