#![allow(clippy::unwrap_used)]
// Engine behaviour against an in-memory controller, on a paused clock.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::time::sleep;

use unipower_api::legacy::models::{LegacyDevice, LegacySite, OverridePatch};
use unipower_core::{
    ControllerGateway, CoreError, Device, EngineConfig, EntityKind, EntityStatus, InUse,
    InventoryFilters, InventoryOptions, OutletAction, PoeAction, PoeMode, RelayState, SmartPower,
    discover,
};

// ── Fake controller ─────────────────────────────────────────────────

#[derive(Default)]
struct FakeGateway {
    sites: Vec<LegacySite>,
    devices: Mutex<Vec<(String, LegacyDevice)>>,
    pushes: Mutex<Vec<(String, OverridePatch)>>,
    logins: AtomicUsize,
    list_calls: AtomicUsize,
    fail_reads: AtomicBool,
    reject_writes: AtomicBool,
    latency: Duration,
}

impl FakeGateway {
    fn with_devices(devices: Vec<serde_json::Value>) -> Self {
        Self {
            sites: vec![
                serde_json::from_value(json!({ "_id": "site1", "name": "default", "desc": "Home" }))
                    .unwrap(),
            ],
            devices: Mutex::new(
                devices
                    .into_iter()
                    .map(|d| ("default".to_owned(), serde_json::from_value(d).unwrap()))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn pushes(&self) -> Vec<(String, OverridePatch)> {
        self.pushes.lock().unwrap().clone()
    }

    /// Mirror a write into the live tables, like a controller applying it.
    fn apply(&self, device_id: &str, patch: &OverridePatch) {
        let mut devices = self.devices.lock().unwrap();
        let Some((_, device)) = devices.iter_mut().find(|(_, d)| d.id == device_id) else {
            return;
        };
        if let Some(overrides) = &patch.outlet_overrides {
            for o in overrides {
                if let Some(entry) = device
                    .outlet_table
                    .iter_mut()
                    .flatten()
                    .find(|e| e.index == Some(o.index))
                {
                    entry.relay_state = o.relay_state;
                }
            }
            device.outlet_overrides = Some(overrides.clone());
        }
        if let Some(overrides) = &patch.port_overrides {
            for o in overrides {
                if let Some(entry) = device
                    .port_table
                    .iter_mut()
                    .flatten()
                    .find(|e| e.port_idx == Some(o.port_idx))
                {
                    entry.poe_mode.clone_from(&o.poe_mode);
                }
            }
            device.port_overrides = Some(overrides.clone());
        }
    }
}

impl ControllerGateway for FakeGateway {
    async fn login(&self) -> Result<(), CoreError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn logout(&self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn list_sites(&self) -> Result<Vec<LegacySite>, CoreError> {
        Ok(self.sites.clone())
    }

    async fn list_devices(
        &self,
        site: &str,
        mac: Option<&str>,
    ) -> Result<Vec<LegacyDevice>, CoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CoreError::ConnectionFailed {
                url: "https://controller".into(),
                reason: "connection refused".into(),
            });
        }
        let devices = self.devices.lock().unwrap();
        Ok(devices
            .iter()
            .filter(|(s, d)| s == site && mac.is_none_or(|m| d.mac == m))
            .map(|(_, d)| d.clone())
            .collect())
    }

    async fn push_overrides(
        &self,
        _site: &str,
        device_id: &str,
        patch: &OverridePatch,
    ) -> Result<(), CoreError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(CoreError::WriteRejected {
                message: "api.err.InvalidPayload".into(),
            });
        }
        self.pushes
            .lock()
            .unwrap()
            .push((device_id.to_owned(), patch.clone()));
        self.apply(device_id, patch);
        Ok(())
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

fn d1_json() -> serde_json::Value {
    json!({
        "_id": "D1", "mac": "aa:00:00:00:00:01", "serial": "SERD1", "name": "Rack PDU",
        "outlet_table": [
            { "index": 0, "name": "Router", "relay_state": false, "outlet_power": "0.0" },
            { "index": 1, "name": "NAS", "relay_state": true, "outlet_power": "21.4" }
        ],
        "outlet_overrides": [
            { "index": 1, "name": "NAS", "relay_state": false }
        ]
    })
}

fn pdu_with_overrides_json() -> serde_json::Value {
    json!({
        "_id": "D2", "mac": "aa:00:00:00:00:02", "serial": "SERD2", "name": "Office PDU",
        "outlet_table": [
            { "index": 1, "name": "Monitor", "relay_state": false },
            { "index": 2, "name": "Lamp", "relay_state": true },
            { "index": 3, "name": "Fan", "relay_state": false }
        ],
        "outlet_overrides": [
            { "index": 1, "name": "Monitor", "relay_state": false, "cycle_enabled": false },
            { "index": 2, "name": "Lamp", "relay_state": true, "cycle_enabled": true },
            { "index": 3, "name": "Fan", "relay_state": false, "cycle_enabled": false }
        ]
    })
}

fn switch_json() -> serde_json::Value {
    json!({
        "_id": "SW", "mac": "aa:00:00:00:00:03", "serial": "SERSW", "name": "Lab Switch",
        "port_table": [
            { "port_idx": 1, "name": "Bridge", "port_poe": true, "poe_caps": 8, "poe_mode": "off" },
            { "port_idx": 2, "name": "AP", "port_poe": true, "poe_caps": 0, "poe_mode": "auto",
              "poe_enable": true, "poe_power": "4.20" },
            { "port_idx": 3, "name": "Cam", "port_poe": true, "poe_mode": "weird" },
            { "port_idx": 4, "name": "Uplink", "port_poe": false }
        ],
        "port_overrides": [
            { "port_idx": 3, "name": "Cam", "poe_mode": "pasv24", "portconf_id": "pc1" },
            {
                "port_idx": 4, "name": "Uplink",
                "portconf_id": "trunk-profile", "op_mode": "switch"
            }
        ]
    })
}

fn fast() -> EngineConfig {
    EngineConfig::new(Some(5), Some(5))
}

fn engine(devices: Vec<serde_json::Value>) -> SmartPower<FakeGateway> {
    SmartPower::new(FakeGateway::with_devices(devices), fast())
}

async fn device(engine: &SmartPower<FakeGateway>, id: &str) -> Device {
    engine
        .get_device_statuses("default")
        .await
        .unwrap()
        .into_iter()
        .find(|s| s.device.id == id)
        .unwrap()
        .device
}

fn counter() -> (Arc<AtomicUsize>, impl Fn(&EntityStatus) + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    (count, move |_: &EntityStatus| {
        c.fetch_add(1, Ordering::SeqCst);
    })
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn outlet_command_echoes_sibling_relay_state() {
    let engine = engine(vec![d1_json()]);
    let d1 = device(&engine, "D1").await;

    engine
        .command_outlet(&d1, 0, OutletAction::On)
        .await
        .unwrap();

    let pushes = engine.gateway().pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].0, "D1");
    assert_eq!(
        serde_json::to_value(&pushes[0].1).unwrap(),
        json!({
            "outlet_overrides": [
                { "index": 0, "name": "Router", "relay_state": true },
                { "index": 1, "name": "NAS", "relay_state": true }
            ]
        })
    );
}

#[tokio::test(start_paused = true)]
async fn repeated_command_writes_same_list_with_siblings_untouched() {
    let engine = engine(vec![pdu_with_overrides_json()]);
    let d2 = device(&engine, "D2").await;
    let before = engine.get_device_status(&d2).await.unwrap();

    engine
        .command_outlet(&d2, 1, OutletAction::On)
        .await
        .unwrap();
    engine
        .command_outlet(&d2, 1, OutletAction::On)
        .await
        .unwrap();

    let pushes = engine.gateway().pushes();
    assert_eq!(pushes.len(), 2);
    assert_eq!(pushes[0].1, pushes[1].1);

    let written = pushes[0].1.outlet_overrides.clone().unwrap();
    assert!(written[0].relay_state);
    for sibling in [1, 2] {
        assert_eq!(
            serde_json::to_string(&written[sibling]).unwrap(),
            serde_json::to_string(&before.outlets[sibling].override_).unwrap()
        );
    }
}

#[tokio::test(start_paused = true)]
async fn outlet_command_keeps_overrides_without_live_outlet() {
    let engine = engine(vec![json!({
        "_id": "D3", "mac": "aa:00:00:00:00:04", "serial": "SERD3", "name": "Strip",
        "outlet_table": [{ "index": 1, "name": "Heater", "relay_state": false }],
        "outlet_overrides": [
            { "index": 1, "name": "Heater", "relay_state": false },
            { "index": 7, "name": "Retired", "relay_state": true, "cycle_enabled": true }
        ]
    })]);
    let d3 = device(&engine, "D3").await;

    engine
        .command_outlet(&d3, 1, OutletAction::On)
        .await
        .unwrap();

    let pushes = engine.gateway().pushes();
    assert_eq!(
        serde_json::to_value(&pushes[0].1).unwrap(),
        json!({
            "outlet_overrides": [
                { "index": 1, "name": "Heater", "relay_state": true },
                { "index": 7, "name": "Retired", "relay_state": true, "cycle_enabled": true }
            ]
        })
    );
}

#[tokio::test(start_paused = true)]
async fn read_after_command_is_never_stale() {
    let engine = engine(vec![d1_json()]);
    let d1 = device(&engine, "D1").await;

    let before = engine.get_outlet_status(&d1, 0).await.unwrap();
    assert_eq!(before.relay_state, RelayState::Off);

    engine
        .command_outlet(&d1, 0, OutletAction::On)
        .await
        .unwrap();

    let after = engine.get_outlet_status(&d1, 0).await.unwrap();
    assert_eq!(after.relay_state, RelayState::On);

    let site = engine.get_device_statuses("default").await.unwrap();
    assert_eq!(site[0].outlet(0).unwrap().relay_state, RelayState::On);
}

#[tokio::test(start_paused = true)]
async fn missing_index_is_not_found_and_writes_nothing() {
    let engine = engine(vec![d1_json()]);
    let d1 = device(&engine, "D1").await;

    let read = engine.get_outlet_status(&d1, 99).await;
    assert!(
        matches!(read, Err(CoreError::NotFound { .. })),
        "expected NotFound, got {read:?}"
    );

    let write = engine.command_outlet(&d1, 99, OutletAction::On).await;
    assert!(matches!(write, Err(CoreError::NotFound { .. })));
    assert!(engine.gateway().pushes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_device_is_not_found() {
    let engine = engine(vec![d1_json()]);
    let mut ghost = device(&engine, "D1").await;
    ghost.id = "GHOST".into();
    ghost.mac = "ff:ff:ff:ff:ff:ff".into();

    let result = engine.get_device_status(&ghost).await;
    assert!(matches!(result, Err(CoreError::NotFound { .. })));
}

#[tokio::test(start_paused = true)]
async fn rejected_write_leaves_cache_untouched() {
    let engine = engine(vec![d1_json()]);
    let d1 = device(&engine, "D1").await;
    engine.get_device_status(&d1).await.unwrap();
    let calls = engine.gateway().list_calls();

    engine.gateway().reject_writes.store(true, Ordering::SeqCst);
    let result = engine.command_outlet(&d1, 0, OutletAction::On).await;
    assert!(matches!(result, Err(CoreError::WriteRejected { .. })));

    let status = engine.get_device_status(&d1).await.unwrap();
    assert_eq!(status.outlet(0).unwrap().relay_state, RelayState::Off);
    assert_eq!(engine.gateway().list_calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn port_command_rewrites_full_port_list() {
    let engine = engine(vec![switch_json()]);
    let sw = device(&engine, "SW").await;

    engine
        .command_port(&sw, 1, PoeAction::Passthrough)
        .await
        .unwrap();

    let pushes = engine.gateway().pushes();
    assert_eq!(
        serde_json::to_value(&pushes[0].1).unwrap(),
        json!({
            "port_overrides": [
                { "port_idx": 1, "name": "Bridge", "poe_mode": "passthrough" },
                { "port_idx": 2, "name": "AP", "poe_mode": "auto" },
                { "port_idx": 3, "name": "Cam", "poe_mode": "pasv24", "portconf_id": "pc1" },
                {
                    "port_idx": 4, "name": "Uplink",
                    "portconf_id": "trunk-profile", "op_mode": "switch"
                }
            ]
        })
    );

    let port = engine.get_port_status(&sw, 1).await.unwrap();
    assert_eq!(port.poe_mode, PoeMode::Passthrough);
}

#[tokio::test(start_paused = true)]
async fn capability_scenarios_resolve_on_action() {
    let engine = engine(vec![switch_json()]);
    let sw = device(&engine, "SW").await;
    let status = engine.get_device_status(&sw).await.unwrap();

    assert_eq!(status.port(1).unwrap().poe_on_action, PoeAction::Passthrough);
    assert_eq!(status.port(2).unwrap().poe_on_action, PoeAction::Auto);
    assert_eq!(status.port(3).unwrap().poe_on_action, PoeAction::Auto);
    assert_eq!(status.port(3).unwrap().poe_mode, PoeMode::Unknown);
    assert_eq!(status.port(2).unwrap().in_use, InUse::Yes);
    assert!(status.port(4).is_none());
}

// ── Cache ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn concurrent_misses_fetch_once() {
    let mut gateway = FakeGateway::with_devices(vec![d1_json()]);
    gateway.latency = Duration::from_millis(200);
    let engine = SmartPower::new(gateway, fast());

    let (a, b) = tokio::join!(
        engine.get_device_statuses("default"),
        engine.get_device_statuses("default")
    );

    assert_eq!(a.unwrap().len(), 1);
    assert_eq!(b.unwrap().len(), 1);
    assert_eq!(engine.gateway().list_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn cache_expires_after_ttl() {
    let engine = engine(vec![d1_json()]);
    engine.get_device_statuses("default").await.unwrap();
    engine.get_device_statuses("default").await.unwrap();
    assert_eq!(engine.gateway().list_calls(), 1);

    sleep(Duration::from_secs(6)).await;
    engine.get_device_statuses("default").await.unwrap();
    assert_eq!(engine.gateway().list_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_read_surfaces_error() {
    let engine = engine(vec![d1_json()]);
    engine.gateway().fail_reads.store(true, Ordering::SeqCst);

    let result = engine.get_device_statuses("default").await;
    assert!(result.as_ref().is_err_and(CoreError::is_transient));
}

// ── Subscriptions ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn subscribers_share_one_loop_and_polling_stops_with_the_last() {
    let engine = engine(vec![d1_json()]);
    let d1 = device(&engine, "D1").await;
    let baseline = engine.gateway().list_calls();

    let (count_a, handler_a) = counter();
    let (count_b, handler_b) = counter();
    let a = engine.subscribe(&d1, EntityKind::Outlet, 1, handler_a);
    let b = engine.subscribe(&d1, EntityKind::Outlet, 1, handler_b);

    sleep(Duration::from_millis(1)).await;
    assert_eq!(count_a.load(Ordering::SeqCst), 1);
    assert_eq!(count_b.load(Ordering::SeqCst), 1);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(count_a.load(Ordering::SeqCst), 2);
    assert_eq!(count_b.load(Ordering::SeqCst), 2);

    assert!(engine.unsubscribe(a));
    sleep(Duration::from_secs(5)).await;
    assert_eq!(count_a.load(Ordering::SeqCst), 2);
    assert_eq!(count_b.load(Ordering::SeqCst), 3);

    assert!(engine.unsubscribe(b));
    let calls = engine.gateway().list_calls();
    assert!(calls > baseline);

    sleep(Duration::from_secs(60)).await;
    assert_eq!(engine.gateway().list_calls(), calls);
    assert_eq!(count_b.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn published_value_is_the_watched_entity() {
    let engine = engine(vec![d1_json()]);
    let d1 = device(&engine, "D1").await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    engine.subscribe(&d1, EntityKind::Outlet, 1, move |status: &EntityStatus| {
        sink.lock().unwrap().push(status.clone());
    });
    sleep(Duration::from_millis(1)).await;

    let seen = seen.lock().unwrap();
    match seen.as_slice() {
        [EntityStatus::Outlet(outlet)] => {
            assert_eq!(outlet.index, 1);
            assert_eq!(outlet.relay_state, RelayState::On);
            assert_eq!(outlet.in_use, InUse::Yes);
        }
        other => panic!("unexpected deliveries: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn resubscribe_does_not_double_the_loop() {
    let engine = engine(vec![d1_json()]);
    let d1 = device(&engine, "D1").await;

    let (_, first) = counter();
    let a = engine.subscribe(&d1, EntityKind::Outlet, 0, first);
    sleep(Duration::from_millis(1)).await;
    engine.unsubscribe(a);

    let (count, second) = counter();
    engine.subscribe(&d1, EntityKind::Outlet, 0, second);

    // New loop: immediate tick plus one at +5s. The orphaned loop's tick
    // at 5s must not deliver.
    sleep(Duration::from_secs(9)).await;
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn reset_stops_all_polling() {
    let engine = engine(vec![d1_json(), switch_json()]);
    let d1 = device(&engine, "D1").await;
    let sw = device(&engine, "SW").await;

    let (outlet_count, outlet_handler) = counter();
    let (port_count, port_handler) = counter();
    engine.subscribe(&d1, EntityKind::Outlet, 0, outlet_handler);
    engine.subscribe(&sw, EntityKind::Port, 2, port_handler);
    sleep(Duration::from_millis(1)).await;

    engine.reset();
    let calls = engine.gateway().list_calls();
    sleep(Duration::from_secs(60)).await;

    assert_eq!(engine.gateway().list_calls(), calls);
    assert_eq!(outlet_count.load(Ordering::SeqCst), 1);
    assert_eq!(port_count.load(Ordering::SeqCst), 1);
    assert_eq!(engine.subscriber_count(&d1, EntityKind::Outlet, 0), 0);
}

#[tokio::test(start_paused = true)]
async fn poll_errors_do_not_stop_the_schedule() {
    let engine = engine(vec![d1_json()]);
    let d1 = device(&engine, "D1").await;
    engine.gateway().fail_reads.store(true, Ordering::SeqCst);
    sleep(Duration::from_secs(6)).await;

    let (count, handler) = counter();
    engine.subscribe(&d1, EntityKind::Outlet, 1, handler);
    sleep(Duration::from_millis(1)).await;
    assert_eq!(count.load(Ordering::SeqCst), 0);

    engine.gateway().fail_reads.store(false, Ordering::SeqCst);
    sleep(Duration::from_secs(5)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_entity_is_logged_not_published() {
    let engine = engine(vec![d1_json()]);
    let d1 = device(&engine, "D1").await;

    let (count, handler) = counter();
    engine.subscribe(&d1, EntityKind::Outlet, 42, handler);
    sleep(Duration::from_secs(11)).await;

    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(engine.subscriber_count(&d1, EntityKind::Outlet, 42), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_loops() {
    let engine = engine(vec![d1_json()]);
    let d1 = device(&engine, "D1").await;

    let (count, handler) = counter();
    engine.subscribe(&d1, EntityKind::Outlet, 1, handler);
    sleep(Duration::from_millis(1)).await;

    engine.shutdown().await.unwrap();
    sleep(Duration::from_secs(30)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn discovery_applies_filters_and_resets_subscriptions() {
    let engine = engine(vec![d1_json(), switch_json()]);
    let d1 = device(&engine, "D1").await;
    let (_, handler) = counter();
    engine.subscribe(&d1, EntityKind::Outlet, 0, handler);

    let options = InventoryOptions {
        filters: InventoryFilters {
            exclude_devices: vec!["SERSW".into()],
            exclude_outlets: vec!["SERD1.0".into()],
            ..InventoryFilters::default()
        },
        log_api_responses: true,
    };
    let inventory = discover(&engine, &options).await.unwrap();

    assert_eq!(engine.subscriber_count(&d1, EntityKind::Outlet, 0), 0);
    assert_eq!(inventory.sites.len(), 1);
    assert_eq!(inventory.sites[0].site.description.as_deref(), Some("Home"));

    let devices: Vec<_> = inventory.devices().collect();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].device.serial_number.as_deref(), Some("SERD1"));
    assert_eq!(
        devices[0].outlets.iter().map(|o| o.index).collect::<Vec<_>>(),
        vec![1]
    );
    assert!(inventory.find_device("Rack PDU").is_some());
    assert!(inventory.find_device("aa:00:00:00:00:01").is_some());
}

#[tokio::test(start_paused = true)]
async fn discovery_fails_when_statuses_fail() {
    let engine = engine(vec![d1_json()]);
    engine.gateway().fail_reads.store(true, Ordering::SeqCst);

    let result = discover(&engine, &InventoryOptions::default()).await;
    assert!(result.is_err());
}
