// ── Inventory discovery ──
//
// Walks every site, fetches device statuses, and applies the user's
// include/exclude filters and display-name rules. Each discovery starts
// by resetting the engine's subscriptions, since the caller is expected
// to resubscribe from the fresh inventory.

use serde::Serialize;
use tracing::{debug, info};

use crate::engine::SmartPower;
use crate::error::CoreError;
use crate::gateway::ControllerGateway;
use crate::model::{Device, DeviceStatus, Outlet, Site, SwitchPort};

/// Include/exclude lists. Devices are keyed by serial number; outlets and
/// ports by `"{serial}.{index}"`; sites by id or internal name.
///
/// An include list that is present (even empty) admits only its members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryFilters {
    pub include_sites: Option<Vec<String>>,
    pub exclude_sites: Vec<String>,
    pub include_devices: Option<Vec<String>>,
    pub exclude_devices: Vec<String>,
    pub include_outlets: Option<Vec<String>>,
    pub exclude_outlets: Vec<String>,
    pub include_ports: Option<Vec<String>>,
    pub exclude_ports: Vec<String>,
    pub include_inactive_ports: bool,
}

fn admitted(key: &str, include: Option<&[String]>, exclude: &[String]) -> bool {
    !exclude.iter().any(|k| k == key) && include.is_none_or(|inc| inc.iter().any(|k| k == key))
}

impl InventoryFilters {
    fn site(&self, site: &Site) -> bool {
        let listed = |list: &[String]| list.iter().any(|k| site.matches(k));
        !listed(&self.exclude_sites) && self.include_sites.as_deref().is_none_or(listed)
    }

    fn device(&self, device: &Device) -> bool {
        admitted(
            device.serial_or_mac(),
            self.include_devices.as_deref(),
            &self.exclude_devices,
        )
    }

    fn outlet(&self, device: &Device, index: u32) -> bool {
        admitted(
            &entity_key(device, index),
            self.include_outlets.as_deref(),
            &self.exclude_outlets,
        )
    }

    fn port(&self, device: &Device, port: &SwitchPort) -> bool {
        (port.active || self.include_inactive_ports)
            && admitted(
                &entity_key(device, port.index),
                self.include_ports.as_deref(),
                &self.exclude_ports,
            )
    }
}

/// `"{serial}.{index}"`, the filter key for one outlet or port.
pub fn entity_key(device: &Device, index: u32) -> String {
    format!("{}.{index}", device.serial_or_mac())
}

#[derive(Debug, Clone, Default)]
pub struct InventoryOptions {
    pub filters: InventoryFilters,
    /// Log raw site and device payloads at info level.
    pub log_api_responses: bool,
}

/// One device with the outlets and ports that survived filtering.
/// Names are display names (single outlet/port naming applied).
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInventory {
    pub device: Device,
    pub outlets: Vec<Outlet>,
    pub ports: Vec<SwitchPort>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteInventory {
    pub site: Site,
    pub devices: Vec<DeviceInventory>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Inventory {
    pub sites: Vec<SiteInventory>,
}

impl Inventory {
    pub fn devices(&self) -> impl Iterator<Item = &DeviceInventory> {
        self.sites.iter().flat_map(|s| s.devices.iter())
    }

    /// Look a device up by serial, MAC, id, or display name.
    pub fn find_device(&self, key: &str) -> Option<&DeviceInventory> {
        self.devices().find(|d| d.device.matches(key))
    }
}

/// Apply filters and naming rules to one device's status.
/// Returns `None` when nothing controllable is left.
pub fn select_device(status: DeviceStatus, filters: &InventoryFilters) -> Option<DeviceInventory> {
    let DeviceStatus {
        device,
        outlets,
        ports,
        ..
    } = status;

    if !filters.device(&device) {
        return None;
    }

    let single_outlet = outlets.len() == 1;
    let outlets: Vec<Outlet> = outlets
        .into_iter()
        .map(|mut outlet| {
            if single_outlet {
                outlet.name.clone_from(&device.name);
            }
            outlet
        })
        .filter(|outlet| filters.outlet(&device, outlet.index))
        .collect();

    let single_port = ports.len() == 1;
    let ports: Vec<SwitchPort> = ports
        .into_iter()
        .filter(|port| filters.port(&device, port))
        .map(|mut port| {
            if single_port {
                port.name = format!("{} {}", device.name, port.name);
            }
            port
        })
        .collect();

    if outlets.is_empty() && ports.is_empty() {
        debug!(device = %device.name, "nothing to expose after filtering");
        return None;
    }
    Some(DeviceInventory {
        device,
        outlets,
        ports,
    })
}

/// Discover every controllable outlet and port across all admitted sites.
///
/// Resets the engine's subscriptions first. Any failure to list sites or
/// fetch a site's statuses aborts the whole discovery.
pub async fn discover<G: ControllerGateway>(
    engine: &SmartPower<G>,
    options: &InventoryOptions,
) -> Result<Inventory, CoreError> {
    engine.reset();

    let sites = engine.get_sites().await?;
    if options.log_api_responses {
        info!(sites = %to_json(&sites), "controller sites");
    }

    let mut inventory = Inventory::default();
    for site in sites {
        if !options.filters.site(&site) {
            debug!(site = %site.name, "site filtered out");
            continue;
        }
        info!(site = %site.name, id = %site.id, "discovering site");

        let statuses = engine.get_device_statuses(&site.name).await?;
        if options.log_api_responses {
            info!(site = %site.name, devices = %to_json(&statuses), "site device statuses");
        }

        let devices: Vec<DeviceInventory> = statuses
            .into_iter()
            .filter_map(|status| select_device(status, &options.filters))
            .collect();
        for d in &devices {
            info!(
                serial = d.device.serial_or_mac(),
                device = %d.device.name,
                outlets = d.outlets.len(),
                ports = d.ports.len(),
                "discovered device"
            );
        }
        inventory.sites.push(SiteInventory { site, devices });
    }
    Ok(inventory)
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}
