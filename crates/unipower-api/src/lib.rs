// unipower-api: Async Rust client for the UniFi controller's legacy API
//
// Only the surface the power engine needs: session login, site listing,
// device status (outlet and switch-port tables), and override writes.

pub mod auth;
pub mod error;
pub mod legacy;
pub mod transport;

pub use auth::ControllerPlatform;
pub use error::Error;
pub use legacy::LegacyClient;
pub use transport::{TlsMode, TransportConfig};
