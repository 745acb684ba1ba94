// ── Device domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use unipower_api::legacy::models::{OutletEntry, OutletOverride, PortEntry, PortOverride};

use super::power::{InUse, PoeAction, PoeMode, RelayState};

/// A controller-managed device that carries outlets or PoE ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Opaque controller id (`_id`).
    pub id: String,
    pub mac: String,
    /// Internal name of the site the device was read from.
    pub site: Option<String>,
    pub ip: Option<String>,
    pub model: Option<String>,
    /// Firmware version.
    pub version: Option<String>,
    pub serial_number: Option<String>,
    /// Display name; falls back to model, then serial.
    pub name: String,
}

impl Device {
    /// Site used for API paths.
    pub fn site_or_default(&self) -> &str {
        self.site.as_deref().unwrap_or("default")
    }

    /// Stable identifier for filters and labels: serial, else MAC.
    pub fn serial_or_mac(&self) -> &str {
        self.serial_number.as_deref().unwrap_or(&self.mac)
    }

    /// Whether `key` names this device by serial, MAC, id, or display name.
    pub fn matches(&self, key: &str) -> bool {
        self.id == key
            || self.mac.eq_ignore_ascii_case(key)
            || self.name == key
            || self
                .serial_number
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(key))
    }
}

/// One SmartPower outlet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outlet {
    pub index: u32,
    pub name: String,
    pub relay_state: RelayState,
    pub in_use: InUse,
    /// Live record as the controller reported it.
    pub entry: OutletEntry,
    /// Persisted override, or one synthesized from the entry.
    #[serde(rename = "override")]
    pub override_: OutletOverride,
}

/// One PoE-capable switch port.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchPort {
    pub index: u32,
    pub name: String,
    pub poe_mode: PoeMode,
    /// Mode the port takes when switched on. Never `Off`.
    pub poe_on_action: PoeAction,
    pub in_use: InUse,
    /// PoE currently enabled on the port.
    pub active: bool,
    pub entry: PortEntry,
    #[serde(rename = "override")]
    pub override_: PortOverride,
}

/// A device and its outlets/ports at one fetch instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatus {
    pub device: Device,
    pub outlets: Vec<Outlet>,
    pub ports: Vec<SwitchPort>,
    /// Override records as persisted, including ones no outlet above covers.
    #[serde(skip)]
    pub outlet_overrides: Vec<OutletOverride>,
    /// Override records as persisted, including non-PoE and unpowerable ports.
    #[serde(skip)]
    pub port_overrides: Vec<PortOverride>,
    pub fetched_at: DateTime<Utc>,
}

impl DeviceStatus {
    pub fn outlet(&self, index: u32) -> Option<&Outlet> {
        self.outlets.iter().find(|o| o.index == index)
    }

    pub fn port(&self, index: u32) -> Option<&SwitchPort> {
        self.ports.iter().find(|p| p.index == index)
    }
}
