//! Device-status synchronization engine for UniFi SmartPower outlets and
//! PoE switch ports.
//!
//! - **[`SmartPower`]**: the engine. Fetches device status through a
//!   [`ControllerGateway`], caches it per scope, serializes every
//!   controller conversation behind one lock, runs a demand-driven poll
//!   loop per watched outlet/port, and executes relay / PoE commands as
//!   full override-list rewrites.
//!
//! - **[`normalize`]**: raw controller records → [`DeviceStatus`].
//!
//! - **[`inventory`]**: site walk with include/exclude filters and
//!   display-name rules, used to decide what to watch.
//!
//! - **[`subscription::on_change`]**: subscriber-side filter that only
//!   forwards real state changes.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod inventory;
pub mod lock;
pub mod model;
pub mod normalize;
pub mod subscription;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ControllerConfig, EngineConfig, TlsVerification};
pub use engine::SmartPower;
pub use error::CoreError;
pub use gateway::{ControllerGateway, LegacyGateway};
pub use inventory::{Inventory, InventoryFilters, InventoryOptions, discover};
pub use subscription::{Change, ChangeTracker, SubscriptionId, on_change};

pub use model::{
    Device, DeviceStatus, EntityKind, EntityStatus, InUse, Outlet, OutletAction, PoeAction,
    PoeMode, RelayState, Site, SwitchPort,
};
