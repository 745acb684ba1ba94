// ── Controller gateway ──
//
// The engine talks to the controller only through `ControllerGateway`.
// `LegacyGateway` is the production implementation over `LegacyClient`;
// tests substitute an in-memory fake.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use secrecy::SecretString;
use tracing::{debug, info};

use unipower_api::legacy::models::{LegacyDevice, LegacySite, OverridePatch};
use unipower_api::{LegacyClient, TlsMode, TransportConfig};

use crate::config::{ControllerConfig, TlsVerification};
use crate::error::CoreError;

/// Operations the engine needs from a controller connection.
///
/// Implementations must be cheap to call concurrently; the engine's lock
/// already serializes every conversation.
pub trait ControllerGateway: Send + Sync + 'static {
    /// Make sure an authenticated session exists.
    fn login(&self) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// End the session, if any.
    fn logout(&self) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn list_sites(&self) -> impl Future<Output = Result<Vec<LegacySite>, CoreError>> + Send;

    /// Devices in `site`, or only the one with `mac`.
    fn list_devices(
        &self,
        site: &str,
        mac: Option<&str>,
    ) -> impl Future<Output = Result<Vec<LegacyDevice>, CoreError>> + Send;

    /// Replace the override lists carried by `patch` on one device.
    fn push_overrides(
        &self,
        site: &str,
        device_id: &str,
        patch: &OverridePatch,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;
}

/// Gateway over the controller's legacy cookie-session API.
pub struct LegacyGateway {
    client: LegacyClient,
    username: String,
    password: SecretString,
    authenticated: AtomicBool,
}

impl LegacyGateway {
    /// Build the HTTP stack and, if the platform is not configured,
    /// ask the controller which login path it serves.
    pub async fn connect(config: &ControllerConfig) -> Result<Self, CoreError> {
        let transport = build_transport(config);
        let platform = match config.platform {
            Some(p) => p,
            None => LegacyClient::detect_platform(&config.url, &transport).await?,
        };
        info!(url = %config.url, ?platform, "controller gateway ready");

        let client = LegacyClient::new(config.url.clone(), platform, &transport)?;
        Ok(Self::new(
            client,
            config.username.clone(),
            config.password.clone(),
        ))
    }

    pub fn new(client: LegacyClient, username: String, password: SecretString) -> Self {
        Self {
            client,
            username,
            password,
            authenticated: AtomicBool::new(false),
        }
    }

    /// Forget the session when the controller says it is gone.
    fn track<T>(&self, result: Result<T, unipower_api::Error>) -> Result<T, CoreError> {
        result.map_err(|e| {
            if e.is_auth_expired() {
                self.authenticated.store(false, Ordering::SeqCst);
            }
            CoreError::from(e)
        })
    }
}

impl ControllerGateway for LegacyGateway {
    async fn login(&self) -> Result<(), CoreError> {
        if self.authenticated.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.client.login(&self.username, &self.password).await?;
        self.authenticated.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn logout(&self) -> Result<(), CoreError> {
        if self.authenticated.swap(false, Ordering::SeqCst) {
            self.client.logout().await?;
        }
        Ok(())
    }

    async fn list_sites(&self) -> Result<Vec<LegacySite>, CoreError> {
        self.track(self.client.list_sites().await)
    }

    async fn list_devices(
        &self,
        site: &str,
        mac: Option<&str>,
    ) -> Result<Vec<LegacyDevice>, CoreError> {
        self.track(self.client.list_devices(site, mac).await)
    }

    async fn push_overrides(
        &self,
        site: &str,
        device_id: &str,
        patch: &OverridePatch,
    ) -> Result<(), CoreError> {
        debug!(site, device_id, "writing overrides");
        match self.client.set_device_overrides(site, device_id, patch).await {
            Err(unipower_api::Error::LegacyApi { message }) => {
                Err(CoreError::WriteRejected { message })
            }
            other => self.track(other),
        }
    }
}

fn build_transport(config: &ControllerConfig) -> TransportConfig {
    TransportConfig {
        tls: tls_to_transport(&config.tls),
        timeout: config.timeout,
        cookie_jar: None, // LegacyClient::new adds one automatically
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
