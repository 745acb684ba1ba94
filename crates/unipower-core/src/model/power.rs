// ── Power state vocabulary ──
//
// Observed relay / PoE states, the actions a caller can request, and the
// PoE capability bitmask that decides what "on" means for a port.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::device::{Outlet, SwitchPort};

/// Observed relay state of a SmartPower outlet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RelayState {
    Unknown,
    Off,
    On,
}

/// Whether something is drawing power from an outlet or port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InUse {
    Unknown,
    No,
    Yes,
}

impl InUse {
    /// Classify a power draw. `None` means the controller reported no
    /// usable telemetry.
    pub fn from_watts(watts: Option<f64>) -> Self {
        match watts {
            None => Self::Unknown,
            Some(w) if w > 0.0 => Self::Yes,
            Some(_) => Self::No,
        }
    }
}

/// Observed PoE mode of a switch port.
///
/// `Unknown` covers any value the controller reports that this crate
/// does not recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PoeMode {
    Unknown,
    Auto,
    Passthrough,
    Pasv24,
    Off,
}

impl PoeMode {
    /// Decode the controller's `poe_mode` string; absent means `Off`.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            None | Some("") => Self::Off,
            Some(s) => s.parse().unwrap_or(Self::Unknown),
        }
    }

    /// Wire value for an override record, if this mode has one.
    pub fn as_wire(self) -> Option<&'static str> {
        match self {
            Self::Unknown => None,
            Self::Auto => Some("auto"),
            Self::Passthrough => Some("passthrough"),
            Self::Pasv24 => Some("pasv24"),
            Self::Off => Some("off"),
        }
    }
}

/// A PoE mode a port can be commanded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PoeAction {
    Auto,
    Passthrough,
    Pasv24,
    Off,
}

impl From<PoeAction> for PoeMode {
    fn from(action: PoeAction) -> Self {
        match action {
            PoeAction::Auto => Self::Auto,
            PoeAction::Passthrough => Self::Passthrough,
            PoeAction::Pasv24 => Self::Pasv24,
            PoeAction::Off => Self::Off,
        }
    }
}

/// Desired relay state for an outlet command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OutletAction {
    Off,
    On,
}

impl OutletAction {
    pub fn relay_on(self) -> bool {
        matches!(self, Self::On)
    }
}

/// PoE capability bitmask reported in `poe_caps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoeCaps(pub u32);

impl PoeCaps {
    pub const AF: u32 = 1;
    pub const AT: u32 = 2;
    pub const PASV24: u32 = 4;
    pub const PASSTHROUGH_CAPABLE: u32 = 8;
    pub const PASSTHROUGH: u32 = 16;
    pub const BT: u32 = 32;

    fn has(self, flag: u32) -> bool {
        self.0 & flag == flag
    }

    /// The mode a port takes when turned on.
    ///
    /// Fixed priority: missing caps or any 802.3af/at/bt flag → auto,
    /// then passthrough, then 24V passive, else the port cannot be
    /// powered and the result is `Off`. A zero mask counts as missing.
    pub fn on_action(caps: Option<Self>) -> PoeAction {
        let Some(caps) = caps.filter(|c| c.0 != 0) else {
            return PoeAction::Auto;
        };
        if caps.has(Self::AF) || caps.has(Self::AT) || caps.has(Self::BT) {
            PoeAction::Auto
        } else if caps.has(Self::PASSTHROUGH) || caps.has(Self::PASSTHROUGH_CAPABLE) {
            PoeAction::Passthrough
        } else if caps.has(Self::PASV24) {
            PoeAction::Pasv24
        } else {
            PoeAction::Off
        }
    }
}

/// Outlet or switch port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Outlet,
    Port,
}

/// One polled entity, as published to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntityStatus {
    Outlet(Outlet),
    Port(SwitchPort),
}

impl EntityStatus {
    pub fn index(&self) -> u32 {
        match self {
            Self::Outlet(o) => o.index,
            Self::Port(p) => p.index,
        }
    }

    pub fn in_use(&self) -> InUse {
        match self {
            Self::Outlet(o) => o.in_use,
            Self::Port(p) => p.in_use,
        }
    }
}
