// ── Runtime configuration ──
//
// These types describe how to reach a controller and how aggressively to
// poll it. They carry credential data and timing, but never touch disk.
// The CLI constructs them (via `unipower-config`) and hands them in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use unipower_api::ControllerPlatform;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed certs). Default for local controllers.
    #[default]
    DangerAcceptInvalid,
}

/// Configuration for connecting to a single controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Controller URL (e.g., `https://192.168.1.1`).
    pub url: Url,
    pub username: String,
    pub password: SecretString,
    /// `None` asks the controller at login time.
    pub platform: Option<ControllerPlatform>,
    pub tls: TlsVerification,
    /// Upper bound on each controller request.
    pub timeout: Duration,
}

/// Inclusive bounds and fallback for a seconds-valued setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min: u64,
    pub max: u64,
    pub default: u64,
}

impl Bounds {
    /// Clamp a configured value. Unset or non-positive values take the default.
    pub fn clamp(self, configured: Option<i64>) -> Duration {
        let secs = configured
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(self.default);
        Duration::from_secs(secs.clamp(self.min, self.max))
    }
}

/// How long a fetched status snapshot stays fresh.
pub const STATUS_CACHE_TTL: Bounds = Bounds {
    min: 5,
    max: 60,
    default: 15,
};

/// Interval between polls of one subscribed outlet/port.
pub const STATUS_POLL_INTERVAL: Bounds = Bounds {
    min: 5,
    max: 60,
    default: 15,
};

/// Interval between full inventory rediscoveries.
pub const DEVICE_REFRESH_INTERVAL: Bounds = Bounds {
    min: 120,
    max: 3600,
    default: 600,
};

/// Engine timing, already clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub status_cache_ttl: Duration,
    pub status_poll_interval: Duration,
}

impl EngineConfig {
    pub fn new(status_cache_ttl: Option<i64>, status_poll_interval: Option<i64>) -> Self {
        Self {
            status_cache_ttl: STATUS_CACHE_TTL.clamp(status_cache_ttl),
            status_poll_interval: STATUS_POLL_INTERVAL.clamp(status_poll_interval),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(None, None)
    }
}
