// Legacy API response types
//
// Models for the slice of the UniFi legacy JSON API that SmartPower outlets
// and PoE switch ports live in. Every table/override record keeps a flattened
// `extra` map so unmodelled fields survive a read-modify-write round trip.
// Fields use `#[serde(default)]` liberally because the API is inconsistent
// about field presence across firmware versions.

use serde::{Deserialize, Serialize};

// ── Response Envelope ────────────────────────────────────────────────

/// Standard UniFi legacy API response envelope.
///
/// Every legacy endpoint wraps its payload:
/// ```json
/// { "meta": { "rc": "ok", "msg": "optional" }, "data": [...] }
/// ```
#[derive(Debug, Deserialize)]
pub struct LegacyResponse<T> {
    pub meta: Meta,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Metadata from the legacy envelope. `rc` == `"ok"` means success.
#[derive(Debug, Deserialize)]
pub struct Meta {
    pub rc: String,
    #[serde(default)]
    pub msg: Option<String>,
}

// ── Site ─────────────────────────────────────────────────────────────

/// Site from `GET /api/self/sites`.
///
/// `name` is the short internal reference used in `/api/s/{name}/...`
/// paths; `desc` is the human-readable label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacySite {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Power telemetry ──────────────────────────────────────────────────

/// A power reading as the controller reports it.
///
/// Firmware versions disagree on whether `outlet_power` / `poe_power` is a
/// JSON string (`"3.21"`) or a number; both are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PowerReading {
    Number(f64),
    Text(String),
}

impl PowerReading {
    /// Parsed draw in watts, or `None` when the text is blank or garbage.
    pub fn watts(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

// ── Device ───────────────────────────────────────────────────────────

/// Device object from `stat/device`.
///
/// The legacy API returns 100+ fields per device. Only identity and the
/// outlet/port tables are modelled; everything else lands in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyDevice {
    #[serde(rename = "_id")]
    pub id: String,
    pub mac: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub outlet_table: Option<Vec<OutletEntry>>,
    #[serde(default)]
    pub outlet_overrides: Option<Vec<OutletOverride>>,
    #[serde(default)]
    pub port_table: Option<Vec<PortEntry>>,
    #[serde(default)]
    pub port_overrides: Option<Vec<PortOverride>>,
    /// Catch-all for undocumented fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl LegacyDevice {
    /// Whether the device exposes any outlet or switch-port rows at all.
    pub fn has_power_tables(&self) -> bool {
        self.outlet_table.as_ref().is_some_and(|t| !t.is_empty())
            || self.port_table.as_ref().is_some_and(|t| !t.is_empty())
    }
}

// ── Outlets ──────────────────────────────────────────────────────────

/// Live outlet row from a SmartPower device's `outlet_table`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutletEntry {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub relay_state: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outlet_power: Option<PowerReading>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outlet_caps: Option<u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Persisted desired state for one outlet (`outlet_overrides[]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutletOverride {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub relay_state: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Switch ports ─────────────────────────────────────────────────────

/// Live switch port row from `port_table`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortEntry {
    #[serde(default)]
    pub port_idx: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub port_poe: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poe_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poe_caps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poe_power: Option<PowerReading>,
    #[serde(default)]
    pub poe_enable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portconf_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Persisted desired state for one switch port (`port_overrides[]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortOverride {
    pub port_idx: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poe_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portconf_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Writes ───────────────────────────────────────────────────────────

/// Body of `PUT rest/device/{id}`.
///
/// The controller replaces each list wholesale, so a patch always carries
/// the complete override list for whichever table it touches.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverridePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlet_overrides: Option<Vec<OutletOverride>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_overrides: Option<Vec<PortOverride>>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn power_reading_accepts_strings_and_numbers() {
        let text: PowerReading = serde_json::from_value(json!("3.5")).unwrap();
        let num: PowerReading = serde_json::from_value(json!(0)).unwrap();
        let blank: PowerReading = serde_json::from_value(json!("")).unwrap();
        assert_eq!(text.watts(), Some(3.5));
        assert_eq!(num.watts(), Some(0.0));
        assert_eq!(blank.watts(), None);
    }

    #[test]
    fn override_keeps_unknown_fields() {
        let raw = json!({"index": 2, "name": "Lamp", "relay_state": true, "cycle_enabled": false});
        let parsed: OutletOverride = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(parsed.extra.get("cycle_enabled"), Some(&json!(false)));
        assert_eq!(serde_json::to_value(&parsed).unwrap(), raw);
    }

    #[test]
    fn patch_omits_untouched_table() {
        let patch = OverridePatch {
            outlet_overrides: Some(vec![]),
            port_overrides: None,
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"outlet_overrides": []})
        );
    }
}
