pub mod constants;
pub mod types;

pub use types::{AddressType, PeerAddress, Role};
