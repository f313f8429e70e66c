//! RustyBond - Bluetooth LE pairing and bonding for Rust
//!
//! This library implements the host side of the Bluetooth LE Security
//! Manager: it negotiates pairing with connected peers through an abstract
//! controller transport, resolves private addresses against a bond
//! database, and persists long-term keys so reconnecting peers can skip
//! pairing.

pub mod error;
pub mod event;
pub mod gap;
pub mod scan;
pub mod smp;
pub mod waitable;

// Re-export common types for convenience
pub use error::{SmpError, SmpResult};
pub use event::{EventSource, ListenerId};
pub use gap::{AddressType, PeerAddress, Role};
pub use scan::{parse_advertising_data, ScanReport};
pub use smp::{
    BondDatabase, BondRecord, DriverEvent, EventLoop, IoCapability, PairingCompleteEventArgs,
    SecurityHost, SecurityManager, SecurityParameters, SecurityStatus, SmpTransport,
};
pub use waitable::{GenericWaitable, ScanFinishedWaitable, Waitable};
