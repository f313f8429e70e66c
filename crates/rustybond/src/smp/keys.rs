//! Key management for Security Manager Protocol
//!
//! This module holds the key material exchanged during pairing: Long Term
//! Keys (LTK) with their master identification, Identity Resolving Keys (IRK)
//! with the peer identity address, and the key set negotiated for a
//! connection. 128-bit keys are stored little-endian, as the controller
//! hands them over.

use super::constants::*;
use super::types::SecurityLevel;
use crate::gap::PeerAddress;
use std::fmt;

/// Identifies which LTK a peer wants to resume (EDIV, RAND)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MasterId {
    /// Encrypted diversifier
    pub ediv: u16,
    /// Random number
    pub rand: [u8; SMP_MASTER_ID_RAND_LEN],
}

impl MasterId {
    pub fn new(ediv: u16, rand: [u8; SMP_MASTER_ID_RAND_LEN]) -> Self {
        Self { ediv, rand }
    }
}

/// Encryption information distributed during key exchange
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct EncryptionInfo {
    pub ltk: [u8; SMP_KEY_LEN],
    /// Generated with LE Secure Connections
    pub lesc: bool,
    /// Generated with MITM protection
    pub auth: bool,
    /// Significant bytes of the LTK
    pub ltk_len: u8,
}

impl EncryptionInfo {
    pub fn new(ltk: [u8; SMP_KEY_LEN], lesc: bool, auth: bool) -> Self {
        Self {
            ltk,
            lesc,
            auth,
            ltk_len: SMP_MAX_ENCRYPTION_KEY_SIZE,
        }
    }
}

// Keys never show up in plain Debug output
impl fmt::Debug for EncryptionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionInfo")
            .field("lesc", &self.lesc)
            .field("auth", &self.auth)
            .field("ltk_len", &self.ltk_len)
            .finish_non_exhaustive()
    }
}

/// Long Term Key (LTK) information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LongTermKey {
    pub enc_info: EncryptionInfo,
    pub master_id: MasterId,
}

impl LongTermKey {
    pub fn new(enc_info: EncryptionInfo, master_id: MasterId) -> Self {
        Self {
            enc_info,
            master_id,
        }
    }

    /// Get the security level provided by this key
    pub fn security_level(&self) -> SecurityLevel {
        if self.enc_info.lesc {
            SecurityLevel::SecureConnections
        } else if self.enc_info.auth {
            SecurityLevel::EncryptionWithAuthentication
        } else {
            SecurityLevel::EncryptionOnly
        }
    }
}

/// Identity Resolving Key (IRK) and the identity address it belongs to
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct IdentityKey {
    /// Little-endian IRK
    pub irk: [u8; SMP_KEY_LEN],
    pub peer_addr: PeerAddress,
}

impl IdentityKey {
    pub fn new(irk: [u8; SMP_KEY_LEN], peer_addr: PeerAddress) -> Self {
        Self { irk, peer_addr }
    }
}

impl fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKey")
            .field("peer_addr", &self.peer_addr.to_string())
            .finish_non_exhaustive()
    }
}

/// Connection Signature Resolving Key (CSRK)
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct SigningInfo {
    pub csrk: [u8; SMP_KEY_LEN],
}

impl fmt::Debug for SigningInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningInfo").finish_non_exhaustive()
    }
}

/// Keys held by one side of a connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceKeys {
    pub enc_key: Option<LongTermKey>,
    pub id_key: Option<IdentityKey>,
    pub sign_key: Option<SigningInfo>,
}

impl DeviceKeys {
    pub fn has_keys(&self) -> bool {
        self.enc_key.is_some() || self.id_key.is_some() || self.sign_key.is_some()
    }
}

/// Own and peer keys generated or received during a pairing exchange
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeySet {
    pub own_keys: DeviceKeys,
    pub peer_keys: DeviceKeys,
}

/// Key material persisted in a bond record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BondingData {
    pub own_ltk: LongTermKey,
    pub peer_ltk: LongTermKey,
    /// Peer IRK and identity address, if the peer distributed them
    pub peer_id: Option<IdentityKey>,
}

impl BondingData {
    pub fn from_keyset(keyset: &KeySet) -> Self {
        Self {
            own_ltk: keyset.own_keys.enc_key.unwrap_or_default(),
            peer_ltk: keyset.peer_keys.enc_key.unwrap_or_default(),
            peer_id: keyset.peer_keys.id_key,
        }
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.own_ltk.security_level().max(self.peer_ltk.security_level())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gap::AddressType;

    #[test]
    fn test_bonding_data_from_keyset() {
        let own = LongTermKey::new(EncryptionInfo::new([1; 16], false, true), MasterId::new(1, [2; 8]));
        let peer = LongTermKey::new(EncryptionInfo::new([3; 16], false, false), MasterId::new(4, [5; 8]));
        let id = IdentityKey::new([9; 16], PeerAddress::new(AddressType::Public, [1, 2, 3, 4, 5, 6]));

        let keyset = KeySet {
            own_keys: DeviceKeys {
                enc_key: Some(own),
                ..Default::default()
            },
            peer_keys: DeviceKeys {
                enc_key: Some(peer),
                id_key: Some(id),
                sign_key: None,
            },
        };

        let data = BondingData::from_keyset(&keyset);
        assert_eq!(data.own_ltk, own);
        assert_eq!(data.peer_ltk, peer);
        assert_eq!(data.peer_id, Some(id));
        assert_eq!(data.security_level(), SecurityLevel::EncryptionWithAuthentication);
    }

    #[test]
    fn test_debug_hides_keys() {
        let info = EncryptionInfo::new([0xAB; 16], false, false);
        assert!(!format!("{:?}", info).contains("171"));
        assert!(!DeviceKeys::default().has_keys());
    }
}
