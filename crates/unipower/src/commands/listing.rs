//! Inventory listings: devices, outlets, ports.

use serde::Serialize;
use tabled::Tabled;

use unipower_core::inventory::entity_key;
use unipower_core::{Device, Inventory, Outlet, SwitchPort};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::Context;

// ── Flattened views ─────────────────────────────────────────────────

#[derive(Serialize)]
struct DeviceItem<'a> {
    site: &'a str,
    device: &'a Device,
    outlets: usize,
    ports: usize,
}

#[derive(Serialize)]
struct OutletItem<'a> {
    site: &'a str,
    key: String,
    device: &'a Device,
    outlet: &'a Outlet,
}

#[derive(Serialize)]
struct PortItem<'a> {
    site: &'a str,
    key: String,
    device: &'a Device,
    port: &'a SwitchPort,
}

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Site")]
    site: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Outlets")]
    outlets: usize,
    #[tabled(rename = "Ports")]
    ports: usize,
}

#[derive(Tabled)]
struct OutletRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Relay")]
    relay: String,
    #[tabled(rename = "In Use")]
    in_use: String,
}

#[derive(Tabled)]
struct PortRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "PoE")]
    mode: String,
    #[tabled(rename = "On Action")]
    on_action: String,
    #[tabled(rename = "In Use")]
    in_use: String,
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn devices(
    ctx: &Context,
    site: Option<&str>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let inventory = ctx.inventory(site).await?;
    let items = device_items(&inventory);

    let out = output::render_list(
        &global.output,
        &items,
        |d| DeviceRow {
            site: d.site.to_owned(),
            name: d.device.name.clone(),
            serial: d.device.serial_or_mac().to_owned(),
            model: d.device.model.clone().unwrap_or_default(),
            ip: d.device.ip.clone().unwrap_or_default(),
            mac: d.device.mac.clone(),
            outlets: d.outlets,
            ports: d.ports,
        },
        |d| d.device.serial_or_mac().to_owned(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn outlets(
    ctx: &Context,
    site: Option<&str>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let inventory = ctx.inventory(site).await?;
    let items = outlet_items(&inventory);
    let color = output::should_color(&global.color);

    let out = output::render_list(
        &global.output,
        &items,
        |o| OutletRow {
            key: o.key.clone(),
            device: o.device.name.clone(),
            name: o.outlet.name.clone(),
            relay: output::relay(o.outlet.relay_state, color),
            in_use: output::in_use(o.outlet.in_use, color),
        },
        |o| o.key.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn ports(
    ctx: &Context,
    site: Option<&str>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let inventory = ctx.inventory(site).await?;
    let items = port_items(&inventory);
    let color = output::should_color(&global.color);

    let out = output::render_list(
        &global.output,
        &items,
        |p| PortRow {
            key: p.key.clone(),
            device: p.device.name.clone(),
            name: p.port.name.clone(),
            mode: output::poe_mode(p.port.poe_mode, color),
            on_action: p.port.poe_on_action.to_string(),
            in_use: output::in_use(p.port.in_use, color),
        },
        |p| p.key.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Flattening ──────────────────────────────────────────────────────

fn device_items(inventory: &Inventory) -> Vec<DeviceItem<'_>> {
    inventory
        .sites
        .iter()
        .flat_map(|s| {
            s.devices.iter().map(|d| DeviceItem {
                site: &s.site.name,
                device: &d.device,
                outlets: d.outlets.len(),
                ports: d.ports.len(),
            })
        })
        .collect()
}

fn outlet_items(inventory: &Inventory) -> Vec<OutletItem<'_>> {
    inventory
        .sites
        .iter()
        .flat_map(|s| {
            s.devices.iter().flat_map(move |d| {
                d.outlets.iter().map(move |o| OutletItem {
                    site: &s.site.name,
                    key: entity_key(&d.device, o.index),
                    device: &d.device,
                    outlet: o,
                })
            })
        })
        .collect()
}

fn port_items(inventory: &Inventory) -> Vec<PortItem<'_>> {
    inventory
        .sites
        .iter()
        .flat_map(|s| {
            s.devices.iter().flat_map(move |d| {
                d.ports.iter().map(move |p| PortItem {
                    site: &s.site.name,
                    key: entity_key(&d.device, p.index),
                    device: &d.device,
                    port: p,
                })
            })
        })
        .collect()
}
