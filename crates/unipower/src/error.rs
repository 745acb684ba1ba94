//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use unipower_config::ConfigError;
use unipower_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to controller at {url}")]
    #[diagnostic(
        code(unipower::connection_failed),
        help(
            "Check that the controller is running and reachable.\n\
             Self-signed certificates need `insecure = true` under [controller]."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Controller request timed out")]
    #[diagnostic(
        code(unipower::timeout),
        help("Raise `timeout` under [controller] or check controller responsiveness.")
    )]
    Timeout,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(unipower::auth_failed),
        help(
            "Verify the controller username and password.\n\
             Use a local admin account; cloud accounts with 2FA cannot log in."
        )
    )]
    AuthFailed { message: String },

    #[error("No {what} configured for controller {host}")]
    #[diagnostic(
        code(unipower::no_credentials),
        help(
            "Set `username` under [controller], and a password via UNIPOWER_PASSWORD,\n\
             `password_env`, the system keyring (service 'unipower'), or `password`."
        )
    )]
    NoCredentials { what: String, host: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(unipower::not_found),
        help("Run: unipower {list_command} to see what the controller reports")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Controller rejected the change: {message}")]
    #[diagnostic(code(unipower::rejected))]
    Rejected { message: String },

    #[error("API error: {message}")]
    #[diagnostic(code(unipower::api_error))]
    ApiError { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(unipower::validation))]
    Validation { field: String, reason: String },

    #[error("No controller configured")]
    #[diagnostic(
        code(unipower::no_config),
        help(
            "Create a config file with a [controller] section.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(unipower::config))]
    Config(Box<figment::Error>),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(unipower::render))]
    Render(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::NoConfig { .. } | Self::Config(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::Timeout => Self::Timeout,
            CoreError::NotFound {
                entity_type,
                identifier,
            } => Self::NotFound {
                list_command: list_command(&entity_type).into(),
                resource_type: entity_type,
                identifier,
            },
            CoreError::WriteRejected { message } => Self::Rejected { message },
            CoreError::Api { message, .. } | CoreError::Internal(message) => {
                Self::ApiError { message }
            }
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

fn list_command(entity_type: &str) -> &'static str {
    match entity_type {
        "outlet" => "outlets",
        "port" => "ports",
        "site" => "sites",
        _ => "devices",
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { what, host } => Self::NoCredentials {
                what: what.into(),
                host,
            },
            ConfigError::Serialization(e) => Self::Render(e.to_string()),
            ConfigError::Figment(e) => Self::Config(e),
        }
    }
}
