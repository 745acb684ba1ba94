//! Outlet relay and port PoE commands.

use unipower_core::inventory::entity_key;
use unipower_core::{Device, EntityStatus, PoeAction};

use crate::cli::{GlobalOpts, OutletArgs, PortArgs, PortState};
use crate::error::CliError;
use crate::output;

use super::Context;

pub async fn outlet(ctx: &Context, args: OutletArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let device = ctx.find_device(&args.device).await?;
    ctx.engine
        .command_outlet(&device, args.index, args.action)
        .await?;

    let status = ctx.engine.get_outlet_status(&device, args.index).await?;
    print_status(&device, &EntityStatus::Outlet(status), global)
}

pub async fn port(ctx: &Context, args: PortArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let device = ctx.find_device(&args.device).await?;
    let action = match args.action {
        PortState::On => {
            ctx.engine
                .get_port_status(&device, args.index)
                .await?
                .poe_on_action
        }
        PortState::Off => PoeAction::Off,
        PortState::Auto => PoeAction::Auto,
        PortState::Passthrough => PoeAction::Passthrough,
        PortState::Pasv24 => PoeAction::Pasv24,
    };
    ctx.engine.command_port(&device, args.index, action).await?;

    let status = ctx.engine.get_port_status(&device, args.index).await?;
    print_status(&device, &EntityStatus::Port(status), global)
}

/// One-line summary of an entity, shared with `watch`.
pub fn describe(device: &Device, status: &EntityStatus, color: bool) -> String {
    let key = entity_key(device, status.index());
    match status {
        EntityStatus::Outlet(o) => format!(
            "{key}  {} / {}  relay={} in_use={}",
            device.name,
            o.name,
            output::relay(o.relay_state, color),
            output::in_use(o.in_use, color),
        ),
        EntityStatus::Port(p) => format!(
            "{key}  {} / {}  poe={} in_use={}",
            device.name,
            p.name,
            output::poe_mode(p.poe_mode, color),
            output::in_use(p.in_use, color),
        ),
    }
}

fn print_status(
    device: &Device,
    status: &EntityStatus,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        status,
        |s| describe(device, s, color),
        |s| entity_key(device, s.index()),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
