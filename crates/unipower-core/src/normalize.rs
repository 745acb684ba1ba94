// ── Raw controller record → domain status ──
//
// Pure functions that turn a `LegacyDevice` into a `DeviceStatus`.
// Partial controller data is expected: rows without an index are not yet
// materialized and are skipped, and missing names get synthesized labels.

use chrono::{DateTime, Utc};

use unipower_api::legacy::models::{
    LegacyDevice, OutletEntry, OutletOverride, PortEntry, PortOverride,
};

use crate::model::{
    Device, DeviceStatus, InUse, Outlet, PoeAction, PoeCaps, PoeMode, RelayState, SwitchPort,
};

/// Normalize one device record read from `site`.
///
/// Returns `None` when the device has neither an outlet table nor a port
/// table; such devices are not power-controllable.
pub fn normalize_device(
    raw: LegacyDevice,
    site: Option<&str>,
    fetched_at: DateTime<Utc>,
) -> Option<DeviceStatus> {
    if !raw.has_power_tables() {
        return None;
    }

    let LegacyDevice {
        id,
        mac,
        ip,
        name,
        model,
        version,
        serial,
        site_id: _,
        outlet_table,
        outlet_overrides,
        port_table,
        port_overrides,
        extra: _,
    } = raw;

    let display_name = non_blank(name.as_deref())
        .or_else(|| non_blank(model.as_deref()))
        .or_else(|| non_blank(serial.as_deref()))
        .unwrap_or(&mac)
        .to_owned();

    let device = Device {
        id,
        mac,
        site: site.map(str::to_owned),
        ip,
        model,
        version,
        serial_number: serial,
        name: display_name,
    };

    let outlet_overrides = outlet_overrides.unwrap_or_default();
    let outlets = outlet_table
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| outlet_from_entry(entry, &outlet_overrides))
        .collect();

    let port_overrides = port_overrides.unwrap_or_default();
    let ports = port_table
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| port_from_entry(entry, &port_overrides))
        .collect();

    Some(DeviceStatus {
        device,
        outlets,
        ports,
        outlet_overrides,
        port_overrides,
        fetched_at,
    })
}

fn outlet_from_entry(entry: OutletEntry, overrides: &[OutletOverride]) -> Option<Outlet> {
    let index = entry.index?;

    let override_ = overrides
        .iter()
        .find(|o| o.index == index)
        .cloned()
        .unwrap_or_else(|| OutletOverride {
            index,
            name: entry.name.clone(),
            relay_state: entry.relay_state,
            extra: serde_json::Map::new(),
        });

    Some(Outlet {
        index,
        name: label(entry.name.as_deref(), "Outlet", index),
        relay_state: if entry.relay_state {
            RelayState::On
        } else {
            RelayState::Off
        },
        in_use: InUse::from_watts(entry.outlet_power.as_ref().and_then(|p| p.watts())),
        entry,
        override_,
    })
}

fn port_from_entry(entry: PortEntry, overrides: &[PortOverride]) -> Option<SwitchPort> {
    if !entry.port_poe {
        return None;
    }
    let index = entry.port_idx?;

    let poe_on_action = PoeCaps::on_action(entry.poe_caps.map(PoeCaps));
    if poe_on_action == PoeAction::Off {
        return None;
    }

    let override_ = overrides
        .iter()
        .find(|o| o.port_idx == index)
        .cloned()
        .unwrap_or_else(|| PortOverride {
            port_idx: index,
            name: entry.name.clone(),
            poe_mode: entry.poe_mode.clone(),
            portconf_id: entry.portconf_id.clone(),
            extra: serde_json::Map::new(),
        });

    Some(SwitchPort {
        index,
        name: label(entry.name.as_deref(), "Port", index),
        poe_mode: PoeMode::from_raw(entry.poe_mode.as_deref()),
        poe_on_action,
        in_use: InUse::from_watts(entry.poe_power.as_ref().and_then(|p| p.watts())),
        active: entry.poe_enable,
        entry,
        override_,
    })
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

fn label(name: Option<&str>, fallback: &str, index: u32) -> String {
    non_blank(name).map_or_else(|| format!("{fallback} {index}"), str::to_owned)
}
