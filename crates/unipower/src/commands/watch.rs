//! `watch`: subscribe to every discovered outlet and port and print each
//! state change until interrupted. Inventory is rediscovered on the
//! configured refresh interval; each entity's last-seen state carries over
//! so a refresh alone prints nothing.

use std::collections::HashMap;

use chrono::{Local, Utc};
use serde::Serialize;
use tokio::time::{Instant, interval_at};
use tracing::{error, info};

use unipower_core::inventory::entity_key;
use unipower_core::{ChangeTracker, Device, EntityKind, EntityStatus, Inventory};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::Context;
use super::control::describe;

#[derive(Serialize)]
struct WatchEvent<'a> {
    at: chrono::DateTime<Utc>,
    key: String,
    device: &'a str,
    #[serde(flatten)]
    status: &'a EntityStatus,
}

#[derive(Clone)]
struct Printer {
    format: OutputFormat,
    color: bool,
    quiet: bool,
}

impl Printer {
    fn print(&self, device: &Device, status: &EntityStatus) {
        let line = match self.format {
            OutputFormat::Table | OutputFormat::Plain => format!(
                "{}  {}",
                Local::now().format("%H:%M:%S"),
                describe(device, status, self.color)
            ),
            // Structured formats stream one compact JSON object per line.
            OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml => {
                let event = WatchEvent {
                    at: Utc::now(),
                    key: entity_key(device, status.index()),
                    device: &device.name,
                    status,
                };
                match serde_json::to_string(&event) {
                    Ok(line) => line,
                    Err(e) => {
                        error!(error = %e, "failed to encode watch event");
                        return;
                    }
                }
            }
        };
        output::print_output(&line, self.quiet);
    }
}

pub async fn handle(ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    let refresh = ctx.config.polling.clamped().refresh_devices_interval;
    let printer = Printer {
        format: global.output.clone(),
        color: output::should_color(&global.color),
        quiet: global.quiet,
    };

    let mut trackers = Trackers::new();
    let inventory = ctx.inventory(None).await?;
    let watched = subscribe_all(ctx, &inventory, &printer, &mut trackers);
    info!(entities = watched, refresh_secs = refresh.as_secs(), "watching");

    let mut rediscover = interval_at(Instant::now() + refresh, refresh);
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("interrupted, shutting down");
                return Ok(());
            }
            _ = rediscover.tick() => {
                // Discovery resets the engine's subscriptions before walking sites.
                match ctx.inventory(None).await {
                    Ok(inventory) => {
                        let watched = subscribe_all(ctx, &inventory, &printer, &mut trackers);
                        info!(entities = watched, "inventory refreshed");
                    }
                    Err(e) => {
                        error!(error = %e, "device rediscovery failed, retrying next interval");
                    }
                }
            }
        }
    }
}

type TrackerKey = (EntityKind, String);
type Trackers = HashMap<TrackerKey, ChangeTracker>;

/// Trackers for `keys`, reusing any from `previous`. Entities that are no
/// longer watched lose their history.
fn carry_over(previous: &mut Trackers, keys: impl IntoIterator<Item = TrackerKey>) -> Trackers {
    keys.into_iter()
        .map(|key| {
            let tracker = previous.remove(&key).unwrap_or_default();
            (key, tracker)
        })
        .collect()
}

/// Subscribe to everything in `inventory`, printing only real changes.
fn subscribe_all(
    ctx: &Context,
    inventory: &Inventory,
    printer: &Printer,
    trackers: &mut Trackers,
) -> usize {
    let targets: Vec<(&Device, EntityKind, u32)> = inventory
        .devices()
        .flat_map(|entry| {
            let device = &entry.device;
            entry
                .outlets
                .iter()
                .map(move |o| (device, EntityKind::Outlet, o.index))
                .chain(entry.ports.iter().map(move |p| (device, EntityKind::Port, p.index)))
        })
        .collect();

    let current = carry_over(
        trackers,
        targets
            .iter()
            .map(|(device, kind, index)| (*kind, entity_key(device, *index))),
    );

    for &(device, kind, index) in &targets {
        let tracker = current
            .get(&(kind, entity_key(device, index)))
            .cloned()
            .unwrap_or_default();
        let owned = device.clone();
        let printer = printer.clone();
        ctx.engine.subscribe(
            device,
            kind,
            index,
            tracker.filter(move |status, _change| printer.print(&owned, status)),
        );
    }

    *trackers = current;
    targets.len()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use unipower_api::legacy::models::{OutletEntry, OutletOverride};
    use unipower_core::{InUse, Outlet, RelayState};

    use super::*;

    fn outlet(relay_state: RelayState) -> EntityStatus {
        EntityStatus::Outlet(Outlet {
            index: 1,
            name: "Lamp".into(),
            relay_state,
            in_use: InUse::Unknown,
            entry: serde_json::from_value::<OutletEntry>(json!({ "index": 1 })).unwrap(),
            override_: serde_json::from_value::<OutletOverride>(json!({ "index": 1 })).unwrap(),
        })
    }

    fn key(k: &str) -> TrackerKey {
        (EntityKind::Outlet, k.to_owned())
    }

    #[test]
    fn refresh_keeps_history_of_surviving_entities() {
        let mut trackers = carry_over(&mut Trackers::new(), [key("SER1.1"), key("SER2.1")]);
        trackers[&key("SER1.1")].observe(&outlet(RelayState::On));

        let current = carry_over(&mut trackers, [key("SER1.1")]);

        assert_eq!(current.len(), 1);
        assert!(current[&key("SER1.1")].observe(&outlet(RelayState::On)).is_none());
        assert!(current[&key("SER1.1")].observe(&outlet(RelayState::Off)).is_some());
    }

    #[test]
    fn new_entities_start_without_history() {
        let current = carry_over(&mut Trackers::new(), [key("SER3.2")]);
        assert!(current[&key("SER3.2")].observe(&outlet(RelayState::Off)).is_some());
    }
}
