// Legacy API device endpoints
//
// Device status reads via `stat/device` and override writes via
// `rest/device/{id}`.

use serde_json::json;
use tracing::debug;

use crate::error::Error;
use crate::legacy::client::LegacyClient;
use crate::legacy::models::{LegacyDevice, OverridePatch};

impl LegacyClient {
    /// List devices in a site, optionally narrowed to one MAC address.
    ///
    /// - all devices: `GET /api/s/{site}/stat/device`
    /// - one device: `POST /api/s/{site}/stat/device` with `{"macs": [mac]}`
    pub async fn list_devices(
        &self,
        site: &str,
        mac: Option<&str>,
    ) -> Result<Vec<LegacyDevice>, Error> {
        let url = self.site_url(site, "stat/device")?;
        match mac {
            Some(mac) => {
                debug!(site, mac, "fetching device");
                self.post(url, &json!({ "macs": [mac.to_lowercase()] }))
                    .await
            }
            None => {
                debug!(site, "listing devices");
                self.get(url).await
            }
        }
    }

    /// Replace a device's outlet and/or port override lists.
    ///
    /// `PUT /api/s/{site}/rest/device/{device_id}`
    pub async fn set_device_overrides(
        &self,
        site: &str,
        device_id: &str,
        patch: &OverridePatch,
    ) -> Result<(), Error> {
        let url = self.site_url(site, &format!("rest/device/{device_id}"))?;
        debug!(site, device_id, "pushing device overrides");
        let _: Vec<serde_json::Value> = self.put(url, patch).await?;
        Ok(())
    }
}
