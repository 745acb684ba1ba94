//! Command dispatch: bridges CLI args → engine calls → output formatting.

pub mod config_cmd;
pub mod control;
pub mod listing;
pub mod sites;
pub mod watch;

use std::path::PathBuf;

use tracing::warn;

use unipower_config::Config;
use unipower_core::{Device, Inventory, LegacyGateway, SmartPower, discover};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Loaded configuration plus a live engine bound to one controller.
pub struct Context {
    pub config: Config,
    pub engine: SmartPower<LegacyGateway>,
}

impl Context {
    pub async fn connect(global: &GlobalOpts) -> Result<Self, CliError> {
        let path = config_file(global);
        let config = unipower_config::load_config_from(&path)?;
        if config.controller.host.trim().is_empty() {
            return Err(CliError::NoConfig {
                path: path.display().to_string(),
            });
        }

        let controller = config.controller.to_controller_config()?;
        let gateway = LegacyGateway::connect(&controller).await?;
        let engine = SmartPower::new(gateway, config.polling.clamped().engine);
        Ok(Self { config, engine })
    }

    /// Stop polling and log out. Failures only warrant a warning here.
    pub async fn close(&self) {
        if let Err(e) = self.engine.shutdown().await {
            warn!(error = %e, "controller logout failed");
        }
    }

    /// Run discovery with the configured filters, optionally narrowed to
    /// one site.
    pub async fn inventory(&self, site: Option<&str>) -> Result<Inventory, CliError> {
        let mut options = self.config.inventory_options();
        if let Some(site) = site {
            options.filters.include_sites = Some(vec![site.to_owned()]);
        }
        Ok(discover(&self.engine, &options).await?)
    }

    /// Look a device up across every site, ignoring filters.
    pub async fn find_device(&self, key: &str) -> Result<Device, CliError> {
        for site in self.engine.get_sites().await? {
            let statuses = self.engine.get_device_statuses(&site.name).await?;
            if let Some(status) = statuses.into_iter().find(|s| s.device.matches(key)) {
                return Ok(status.device);
            }
        }
        Err(CliError::NotFound {
            resource_type: "device".into(),
            identifier: key.to_owned(),
            list_command: "devices".into(),
        })
    }
}

pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(unipower_config::config_path)
}

/// Dispatch a controller-bound command to its handler.
pub async fn dispatch(cmd: Command, ctx: &Context, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Sites => sites::handle(ctx, global).await,
        Command::Devices(args) => listing::devices(ctx, args.site.as_deref(), global).await,
        Command::Outlets(args) => listing::outlets(ctx, args.site.as_deref(), global).await,
        Command::Ports(args) => listing::ports(ctx, args.site.as_deref(), global).await,
        Command::Outlet(args) => control::outlet(ctx, args, global).await,
        Command::Port(args) => control::port(ctx, args, global).await,
        Command::Watch => watch::handle(ctx, global).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Validation {
            field: "command".into(),
            reason: "handled without a controller connection".into(),
        }),
    }
}
