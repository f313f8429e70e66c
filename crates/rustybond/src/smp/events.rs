//! Events delivered by the transport collaborator

use super::keys::MasterId;
use super::types::{AuthKeyType, SecParams, SecurityStatus, TimeoutSource};
use crate::gap::{PeerAddress, Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    Connected {
        conn_handle: u16,
        peer_address: PeerAddress,
        role: Role,
    },
    Disconnected {
        conn_handle: u16,
        reason: u8,
    },
    /// The peer started pairing and the controller needs our parameters
    SecParamsRequest {
        conn_handle: u16,
        /// The peer's pairing request, when the controller forwards it
        peer_params: Option<SecParams>,
    },
    /// The peer wants to resume encryption with a stored key
    SecInfoRequest {
        conn_handle: u16,
        master_id: MasterId,
    },
    AuthKeyRequest {
        conn_handle: u16,
        key_type: AuthKeyType,
    },
    PasskeyDisplay {
        conn_handle: u16,
        passkey: u32,
        match_request: bool,
    },
    AuthStatus {
        conn_handle: u16,
        status: SecurityStatus,
        bonded: bool,
    },
    Timeout {
        conn_handle: Option<u16>,
        src: TimeoutSource,
    },
    AdvertisingReport {
        peer_address: PeerAddress,
        rssi: i8,
        data: Vec<u8>,
    },
}

impl DriverEvent {
    /// Connection the event belongs to, if any
    pub fn conn_handle(&self) -> Option<u16> {
        match self {
            DriverEvent::Connected { conn_handle, .. }
            | DriverEvent::Disconnected { conn_handle, .. }
            | DriverEvent::SecParamsRequest { conn_handle, .. }
            | DriverEvent::SecInfoRequest { conn_handle, .. }
            | DriverEvent::AuthKeyRequest { conn_handle, .. }
            | DriverEvent::PasskeyDisplay { conn_handle, .. }
            | DriverEvent::AuthStatus { conn_handle, .. } => Some(*conn_handle),
            DriverEvent::Timeout { conn_handle, .. } => *conn_handle,
            DriverEvent::AdvertisingReport { .. } => None,
        }
    }
}
