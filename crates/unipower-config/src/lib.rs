//! Configuration for unipower.
//!
//! TOML file + `UNIPOWER_*` environment overlay, credential resolution
//! (env + keyring + plaintext), and translation into the core crate's
//! `ControllerConfig`, `EngineConfig`, and `InventoryOptions`. All
//! interval clamping happens here, before values reach the engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use unipower_api::ControllerPlatform;
use unipower_core::config::DEVICE_REFRESH_INTERVAL;
use unipower_core::{
    ControllerConfig, EngineConfig, InventoryFilters, InventoryOptions, TlsVerification,
};

/// Keyring service name; the entry is keyed by username.
pub const KEYRING_SERVICE: &str = "unipower";

/// Fallback password variable when `password_env` is unset or empty.
pub const PASSWORD_ENV: &str = "UNIPOWER_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no {what} configured for controller {host}")]
    NoCredentials { what: &'static str, host: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerSettings,

    #[serde(default)]
    pub polling: PollingSettings,

    #[serde(default)]
    pub filters: FilterSettings,

    /// Log raw site and device payloads during discovery.
    #[serde(default)]
    pub log_api_responses: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerSettings {
    /// Hostname, IP, or full URL of the controller.
    #[serde(default)]
    pub host: String,

    /// Defaults to 443.
    pub port: Option<u16>,

    /// `"unifi-os"`, `"classic"`, or `"auto"` (detect from the controller).
    #[serde(default = "default_platform")]
    pub platform: String,

    pub username: Option<String>,

    /// Plaintext password; prefer `password_env` or the keyring.
    pub password: Option<String>,

    /// Name of an environment variable holding the password.
    pub password_env: Option<String>,

    /// Accept self-signed certificates.
    #[serde(default = "default_insecure")]
    pub insecure: bool,

    /// Path to a custom CA certificate (used when `insecure` is false).
    pub ca_cert: Option<PathBuf>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: None,
            platform: default_platform(),
            username: None,
            password: None,
            password_env: None,
            insecure: default_insecure(),
            ca_cert: None,
            timeout: default_timeout(),
        }
    }
}

fn default_platform() -> String {
    "auto".into()
}
fn default_insecure() -> bool {
    true
}
fn default_timeout() -> u64 {
    30
}

/// Poll/caching intervals in seconds, as written by the user.
/// Unset or non-positive values fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PollingSettings {
    pub status_poll_interval: Option<i64>,
    pub status_cache_ttl: Option<i64>,
    pub refresh_devices_interval: Option<i64>,
}

/// Intervals after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClampedPolling {
    pub engine: EngineConfig,
    pub refresh_devices_interval: Duration,
}

impl PollingSettings {
    pub fn clamped(&self) -> ClampedPolling {
        ClampedPolling {
            engine: EngineConfig::new(self.status_cache_ttl, self.status_poll_interval),
            refresh_devices_interval: DEVICE_REFRESH_INTERVAL.clamp(self.refresh_devices_interval),
        }
    }
}

/// Include/exclude lists. An include list that is present admits only
/// its members; omit it to admit everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FilterSettings {
    pub include_sites: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_sites: Vec<String>,
    pub include_devices: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_devices: Vec<String>,
    pub include_outlets: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_outlets: Vec<String>,
    pub include_ports: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_ports: Vec<String>,
    #[serde(default)]
    pub include_inactive_ports: bool,
}

impl From<&FilterSettings> for InventoryFilters {
    fn from(f: &FilterSettings) -> Self {
        Self {
            include_sites: f.include_sites.clone(),
            exclude_sites: f.exclude_sites.clone(),
            include_devices: f.include_devices.clone(),
            exclude_devices: f.exclude_devices.clone(),
            include_outlets: f.include_outlets.clone(),
            exclude_outlets: f.exclude_outlets.clone(),
            include_ports: f.include_ports.clone(),
            exclude_ports: f.exclude_ports.clone(),
            include_inactive_ports: f.include_inactive_ports,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "unipower", "unipower").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("unipower");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path` (missing file is fine) + environment.
///
/// Environment keys use `__` for nesting:
/// `UNIPOWER_CONTROLLER__HOST`, `UNIPOWER_POLLING__STATUS_CACHE_TTL`,
/// `UNIPOWER_LOG_API_RESPONSES`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("UNIPOWER_").split("__"));

    Ok(figment.extract()?)
}

impl Config {
    /// TOML rendering with the plaintext password masked.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut copy = self.clone();
        if copy.controller.password.is_some() {
            copy.controller.password = Some("********".into());
        }
        Ok(toml::to_string_pretty(&copy)?)
    }

    pub fn inventory_options(&self) -> InventoryOptions {
        InventoryOptions {
            filters: InventoryFilters::from(&self.filters),
            log_api_responses: self.log_api_responses,
        }
    }
}

// ── Translation to core types ───────────────────────────────────────

impl ControllerSettings {
    /// Controller base URL. A bare host gets `https://` and the port.
    pub fn url(&self) -> Result<url::Url, ConfigError> {
        let host = self.host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(ConfigError::Validation {
                field: "controller.host".into(),
                reason: "not set".into(),
            });
        }
        let invalid = |e: url::ParseError| ConfigError::Validation {
            field: "controller.host".into(),
            reason: format!("invalid URL {host}: {e}"),
        };

        let mut url = if host.contains("://") {
            url::Url::parse(host).map_err(invalid)?
        } else {
            url::Url::parse(&format!("https://{host}")).map_err(invalid)?
        };
        if let Some(port) = self.port {
            url.set_port(Some(port))
                .map_err(|()| ConfigError::Validation {
                    field: "controller.port".into(),
                    reason: format!("cannot set port on {host}"),
                })?;
        }
        Ok(url)
    }

    pub fn platform(&self) -> Result<Option<ControllerPlatform>, ConfigError> {
        match self.platform.as_str() {
            "auto" | "" => Ok(None),
            "unifi-os" | "unifios" => Ok(Some(ControllerPlatform::UnifiOs)),
            "classic" | "standalone" => Ok(Some(ControllerPlatform::ClassicController)),
            other => Err(ConfigError::Validation {
                field: "controller.platform".into(),
                reason: format!("expected 'auto', 'unifi-os', or 'classic', got '{other}'"),
            }),
        }
    }

    pub fn tls(&self) -> TlsVerification {
        if self.insecure {
            TlsVerification::DangerAcceptInvalid
        } else if let Some(ref ca_path) = self.ca_cert {
            TlsVerification::CustomCa(ca_path.clone())
        } else {
            TlsVerification::SystemDefaults
        }
    }

    fn username(&self) -> Result<String, ConfigError> {
        self.username
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ConfigError::NoCredentials {
                what: "username",
                host: self.host.clone(),
            })
    }

    /// Resolve the password: `password_env` → `UNIPOWER_PASSWORD` →
    /// keyring (`unipower` / username) → plaintext.
    pub fn resolve_password(&self) -> Result<SecretString, ConfigError> {
        let from_env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        // 1. Configured env var
        if let Some(val) = self.password_env.as_deref().and_then(from_env) {
            return Ok(SecretString::from(val));
        }

        // 2. Fixed env var
        if let Some(val) = from_env(PASSWORD_ENV) {
            return Ok(SecretString::from(val));
        }

        // 3. System keyring
        if let Some(user) = self.username.as_deref() {
            if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, user) {
                if let Ok(pw) = entry.get_password() {
                    return Ok(SecretString::from(pw));
                }
            }
        }

        // 4. Plaintext in config
        if let Some(ref pw) = self.password {
            return Ok(SecretString::from(pw.clone()));
        }

        Err(ConfigError::NoCredentials {
            what: "password",
            host: self.host.clone(),
        })
    }

    /// Build the core `ControllerConfig`, resolving credentials.
    pub fn to_controller_config(&self) -> Result<ControllerConfig, ConfigError> {
        Ok(ControllerConfig {
            url: self.url()?,
            username: self.username()?,
            password: self.resolve_password()?,
            platform: self.platform()?,
            tls: self.tls(),
            timeout: Duration::from_secs(self.timeout.max(1)),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn settings(host: &str) -> ControllerSettings {
        ControllerSettings {
            host: host.into(),
            username: Some("admin".into()),
            ..ControllerSettings::default()
        }
    }

    #[test]
    fn bare_host_becomes_https_url() {
        let mut s = settings("192.168.1.1");
        assert_eq!(s.url().unwrap().as_str(), "https://192.168.1.1/");

        s.port = Some(8443);
        assert_eq!(s.url().unwrap().as_str(), "https://192.168.1.1:8443/");
    }

    #[test]
    fn full_url_is_kept() {
        let s = settings("https://unifi.example.com/");
        assert_eq!(s.url().unwrap().as_str(), "https://unifi.example.com/");
    }

    #[test]
    fn empty_host_is_rejected() {
        assert!(matches!(
            settings("").url(),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn platform_names() {
        let mut s = settings("h");
        assert_eq!(s.platform().unwrap(), None);
        s.platform = "classic".into();
        assert_eq!(
            s.platform().unwrap(),
            Some(ControllerPlatform::ClassicController)
        );
        s.platform = "cloud".into();
        assert!(s.platform().is_err());
    }

    #[test]
    fn tls_follows_insecure_then_ca() {
        let mut s = settings("h");
        assert_eq!(s.tls(), TlsVerification::DangerAcceptInvalid);
        s.insecure = false;
        assert_eq!(s.tls(), TlsVerification::SystemDefaults);
        s.ca_cert = Some("/etc/ca.pem".into());
        assert_eq!(s.tls(), TlsVerification::CustomCa("/etc/ca.pem".into()));
    }

    #[test]
    fn polling_is_clamped() {
        let polling = PollingSettings {
            status_poll_interval: Some(1),
            status_cache_ttl: Some(0),
            refresh_devices_interval: Some(100_000),
        };
        let clamped = polling.clamped();
        assert_eq!(clamped.engine.status_poll_interval, Duration::from_secs(5));
        assert_eq!(clamped.engine.status_cache_ttl, Duration::from_secs(15));
        assert_eq!(clamped.refresh_devices_interval, Duration::from_secs(3600));
    }

    #[test]
    fn password_env_wins_over_plaintext() {
        Jail::expect_with(|jail| {
            jail.set_env("UNIPOWER_TEST_PW", "from-env");
            let s = ControllerSettings {
                password: Some("plain".into()),
                password_env: Some("UNIPOWER_TEST_PW".into()),
                ..settings("h")
            };
            assert_eq!(s.resolve_password().unwrap().expose_secret(), "from-env");
            Ok(())
        });
    }

    #[test]
    fn fixed_env_var_is_second_in_chain() {
        Jail::expect_with(|jail| {
            jail.set_env(PASSWORD_ENV, "fixed");
            let s = ControllerSettings {
                password: Some("plain".into()),
                password_env: Some("UNIPOWER_UNSET_VAR".into()),
                ..settings("h")
            };
            assert_eq!(s.resolve_password().unwrap().expose_secret(), "fixed");
            Ok(())
        });
    }

    #[test]
    fn missing_username_is_reported() {
        let s = ControllerSettings {
            host: "h".into(),
            password: Some("pw".into()),
            ..ControllerSettings::default()
        };
        assert!(matches!(
            s.to_controller_config(),
            Err(ConfigError::NoCredentials {
                what: "username",
                ..
            })
        ));
    }

    #[test]
    fn loads_toml_with_env_overlay() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                log_api_responses = true

                [controller]
                host = "10.0.0.1"
                username = "admin"
                password = "secret"

                [polling]
                status_cache_ttl = 30

                [filters]
                include_sites = ["default"]
                exclude_ports = ["F4E2C6000001.4"]
                "#,
            )?;
            jail.set_env("UNIPOWER_CONTROLLER__PORT", "8443");
            jail.set_env("UNIPOWER_POLLING__STATUS_POLL_INTERVAL", "20");

            let cfg = load_config_from(Path::new("config.toml")).unwrap();
            assert_eq!(cfg.controller.host, "10.0.0.1");
            assert_eq!(cfg.controller.port, Some(8443));
            assert!(cfg.controller.insecure);
            assert_eq!(cfg.polling.status_cache_ttl, Some(30));
            assert_eq!(cfg.polling.status_poll_interval, Some(20));
            assert!(cfg.log_api_responses);

            let options = cfg.inventory_options();
            assert_eq!(
                options.filters.include_sites,
                Some(vec!["default".to_owned()])
            );
            assert_eq!(options.filters.include_devices, None);
            assert_eq!(options.filters.exclude_ports, vec!["F4E2C6000001.4"]);
            Ok(())
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_jail| {
            let cfg = load_config_from(Path::new("nope.toml")).unwrap();
            assert_eq!(cfg.controller.timeout, 30);
            assert_eq!(cfg.controller.platform, "auto");
            assert_eq!(cfg.polling, PollingSettings::default());
            Ok(())
        });
    }

    #[test]
    fn redacted_toml_masks_password() {
        let cfg = Config {
            controller: ControllerSettings {
                password: Some("hunter2".into()),
                ..settings("h")
            },
            ..Config::default()
        };
        let rendered = cfg.to_redacted_toml().unwrap();
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("********"));
    }

    #[test]
    fn tempfile_config_round_trips_through_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[controller]\nhost = \"unifi.lan\"\nplatform = \"unifi-os\"\n",
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(
            cfg.controller.platform().unwrap(),
            Some(ControllerPlatform::UnifiOs)
        );
    }
}
