use crate::error::{SmpError, SmpResult};
use crate::gap::constants::*;
use std::fmt;
use std::str::FromStr;

/// Local role on a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Central,
    Peripheral,
}

impl Role {
    /// Whether the remote peer acts as the client on a connection where we hold this role.
    ///
    /// A peripheral hosts the GATT server, so its peer is the client.
    pub fn peer_is_client(&self) -> bool {
        matches!(self, Role::Peripheral)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressType {
    Public,
    RandomStatic,
    RandomPrivateResolvable,
    RandomPrivateNonResolvable,
}

impl AddressType {
    /// Whether the address carries a stable identity that can be compared byte for byte
    pub fn is_identity(&self) -> bool {
        matches!(self, AddressType::Public | AddressType::RandomStatic)
    }

    /// Classify a random address from its two most significant bits
    pub fn from_random_msb(msb: u8) -> Option<Self> {
        match msb & RANDOM_ADDR_SUBTYPE_MASK {
            RANDOM_ADDR_STATIC_BITS => Some(AddressType::RandomStatic),
            RANDOM_ADDR_RESOLVABLE_BITS => Some(AddressType::RandomPrivateResolvable),
            RANDOM_ADDR_NON_RESOLVABLE_BITS => Some(AddressType::RandomPrivateNonResolvable),
            _ => None,
        }
    }
}

impl TryFrom<u8> for AddressType {
    type Error = SmpError;

    fn try_from(value: u8) -> SmpResult<Self> {
        match value {
            ADDR_TYPE_PUBLIC => Ok(AddressType::Public),
            ADDR_TYPE_RANDOM_STATIC => Ok(AddressType::RandomStatic),
            ADDR_TYPE_RANDOM_PRIVATE_RESOLVABLE => Ok(AddressType::RandomPrivateResolvable),
            ADDR_TYPE_RANDOM_PRIVATE_NON_RESOLVABLE => Ok(AddressType::RandomPrivateNonResolvable),
            other => Err(SmpError::InvalidInput(format!(
                "Unknown address type {:#04x}",
                other
            ))),
        }
    }
}

impl From<AddressType> for u8 {
    fn from(value: AddressType) -> Self {
        match value {
            AddressType::Public => ADDR_TYPE_PUBLIC,
            AddressType::RandomStatic => ADDR_TYPE_RANDOM_STATIC,
            AddressType::RandomPrivateResolvable => ADDR_TYPE_RANDOM_PRIVATE_RESOLVABLE,
            AddressType::RandomPrivateNonResolvable => ADDR_TYPE_RANDOM_PRIVATE_NON_RESOLVABLE,
        }
    }
}

/// A peer device address.
///
/// Bytes are held most significant first, i.e. in the order they are
/// displayed (`4x:xx:xx:yy:yy:yy`). For a resolvable private address the
/// first three bytes are `prand` and the last three are the hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerAddress {
    pub addr_type: AddressType,
    pub addr: [u8; BD_ADDR_LEN],
}

impl PeerAddress {
    pub fn new(addr_type: AddressType, addr: [u8; BD_ADDR_LEN]) -> Self {
        Self { addr_type, addr }
    }

    pub fn from_slice(addr_type: AddressType, slice: &[u8]) -> SmpResult<Self> {
        let addr: [u8; BD_ADDR_LEN] = slice.try_into().map_err(|_| {
            SmpError::InvalidInput(format!(
                "Address must be {} bytes, got {}",
                BD_ADDR_LEN,
                slice.len()
            ))
        })?;
        Ok(Self { addr_type, addr })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.addr
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.addr[0], self.addr[1], self.addr[2], self.addr[3], self.addr[4], self.addr[5]
        )?;
        match self.addr_type {
            AddressType::Public => write!(f, ",p"),
            AddressType::RandomStatic => write!(f, ",s"),
            AddressType::RandomPrivateResolvable => write!(f, ",r"),
            AddressType::RandomPrivateNonResolvable => write!(f, ",n"),
        }
    }
}

impl FromStr for PeerAddress {
    type Err = SmpError;

    /// Parses `AA:BB:CC:DD:EE:FF[,p|s|r|n]`.
    ///
    /// The suffix may only be left out for static (`0b11`) and resolvable
    /// (`0b01`) random addresses, whose type follows from the top bits.
    fn from_str(s: &str) -> SmpResult<Self> {
        let (addr_part, type_part) = match s.split_once(',') {
            Some((a, t)) => (a, Some(t)),
            None => (s, None),
        };
        let cleaned: String = addr_part.chars().filter(|c| *c != ':').collect();
        let mut addr = [0u8; BD_ADDR_LEN];
        hex::decode_to_slice(&cleaned, &mut addr)
            .map_err(|e| SmpError::InvalidInput(format!("Bad address {:?}: {}", s, e)))?;

        let addr_type = match type_part {
            Some("p") => AddressType::Public,
            Some("s") => AddressType::RandomStatic,
            Some("r") => AddressType::RandomPrivateResolvable,
            Some("n") => AddressType::RandomPrivateNonResolvable,
            Some(other) => {
                return Err(SmpError::InvalidInput(format!(
                    "Unknown address type suffix {:?}",
                    other
                )))
            }
            None => match AddressType::from_random_msb(addr[0]) {
                Some(t @ (AddressType::RandomStatic | AddressType::RandomPrivateResolvable)) => t,
                _ => {
                    return Err(SmpError::InvalidInput(format!(
                        "Address {:?} needs a type suffix (,p ,s ,r or ,n)",
                        s
                    )))
                }
            },
        };
        Ok(Self { addr_type, addr })
    }
}
