//! Clap derive structures for the `unipower` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use unipower_core::OutletAction;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// unipower -- control UniFi SmartPower outlets and PoE ports
#[derive(Debug, Parser)]
#[command(
    name = "unipower",
    version,
    about = "Control UniFi SmartPower outlets and PoE switch ports",
    long_about = "Inspect and switch UniFi SmartPower outlets and PoE switch ports.\n\n\
        Talks to the controller's session-cookie API, caches device status\n\
        briefly, and serializes every controller request.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "UNIPOWER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "UNIPOWER_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List controller sites
    Sites,

    /// List discovered power devices
    #[command(alias = "dev")]
    Devices(SiteFilter),

    /// List outlets with relay and in-use state
    Outlets(SiteFilter),

    /// List PoE ports with mode, on-action, and in-use state
    Ports(SiteFilter),

    /// Switch an outlet relay
    Outlet(OutletArgs),

    /// Set a switch port's PoE mode
    Port(PortArgs),

    /// Watch every discovered outlet and port, printing state changes
    Watch,

    /// Inspect CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct SiteFilter {
    /// Only this site (name or id)
    #[arg(long, short = 's')]
    pub site: Option<String>,
}

#[derive(Debug, Args)]
pub struct OutletArgs {
    /// Device serial, MAC, id, or name
    pub device: String,

    /// Outlet index
    pub index: u32,

    /// Desired relay state
    #[arg(value_parser = parse_outlet_action)]
    pub action: OutletAction,
}

#[derive(Debug, Args)]
pub struct PortArgs {
    /// Device serial, MAC, id, or name
    pub device: String,

    /// Port index
    pub index: u32,

    /// Desired PoE state; `on` picks the mode the port's capabilities allow
    pub action: PortState,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PortState {
    On,
    Off,
    Auto,
    Passthrough,
    Pasv24,
}

fn parse_outlet_action(s: &str) -> Result<OutletAction, String> {
    s.to_ascii_lowercase()
        .parse()
        .map_err(|_| format!("expected 'on' or 'off', got '{s}'"))
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,
    /// Print the effective configuration (password masked)
    Show,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
