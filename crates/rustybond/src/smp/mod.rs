//! Security Manager Protocol (SMP) implementation
//!
//! This module drives the host side of Bluetooth LE security:
//! - Negotiating pairing with a connected peer
//! - Handing passkey and out-of-band key requests to the user
//! - Resolving private addresses against bonded identities
//! - Persisting and reusing long-term keys across reconnects
//!
//! Link-layer encryption itself is performed by the controller behind the
//! [`SmpTransport`] interface.

mod bond_db;
mod constants;
pub mod crypto;
mod events;
mod host;
mod keys;
mod manager;
mod transport;
mod types;

// Re-export public API
pub use self::bond_db::*;
pub use self::events::DriverEvent;
pub use self::host::{EventLoop, SecurityHost};
pub use self::keys::*;
pub use self::manager::{
    PasskeyEntryEventArgs, PasskeyResolver, PeerInfo, SecurityContext, SecurityManager,
};
pub use self::transport::SmpTransport;
pub use self::types::*;
