// ── Domain model ──
//
// Canonical types handed out by the engine. Built from raw controller
// payloads by `crate::normalize`; never mutated after construction.

pub mod device;
pub mod power;
pub mod site;

pub use device::{Device, DeviceStatus, Outlet, SwitchPort};
pub use power::{
    EntityKind, EntityStatus, InUse, OutletAction, PoeAction, PoeCaps, PoeMode, RelayState,
};
pub use site::Site;
