//! Command interface of the controller/driver collaborator
//!
//! The security manager never talks to hardware directly; it issues these
//! commands and reacts to the [`DriverEvent`](super::DriverEvent)s the
//! transport delivers.

use super::keys::{EncryptionInfo, IdentityKey, KeySet, SigningInfo};
use super::types::{AuthKeyType, SecParams, SecurityStatus};
use crate::error::SmpResult;

pub trait SmpTransport: Send + Sync {
    /// Start authentication with the peer (initiator role)
    fn authenticate(&self, conn_handle: u16, params: &SecParams) -> SmpResult<()>;

    /// Answer a security parameters request
    fn sec_params_reply(
        &self,
        conn_handle: u16,
        status: SecurityStatus,
        params: Option<&SecParams>,
        keyset: &KeySet,
    ) -> SmpResult<()>;

    /// Answer a security info request. `None` everywhere means no stored keys.
    fn sec_info_reply(
        &self,
        conn_handle: u16,
        enc_info: Option<&EncryptionInfo>,
        id_info: Option<&IdentityKey>,
        sign_info: Option<&SigningInfo>,
    ) -> SmpResult<()>;

    /// Supply the passkey or OOB key the controller asked for
    fn auth_key_reply(&self, conn_handle: u16, key_type: AuthKeyType, key: &[u8]) -> SmpResult<()>;

    /// Read back the key set negotiated on a connection
    fn load_keyset(&self, conn_handle: u16) -> SmpResult<KeySet>;
}
