//! Type definitions for the Security Manager Protocol
use super::constants::*;
use crate::error::{SmpError, SmpResult};
use bitflags::bitflags;
use std::fmt;

/// IO Capability types for pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoCapability {
    /// Display only capability
    DisplayOnly,
    /// Display with yes/no capability
    DisplayYesNo,
    /// Keyboard only
    KeyboardOnly,
    /// No input, no output
    NoInputNoOutput,
    /// Both keyboard and display
    KeyboardDisplay,
}

impl IoCapability {
    /// Convert to u8 value for protocol
    pub fn to_u8(&self) -> u8 {
        match self {
            IoCapability::DisplayOnly => SMP_IO_CAPABILITY_DISPLAY_ONLY,
            IoCapability::DisplayYesNo => SMP_IO_CAPABILITY_DISPLAY_YES_NO,
            IoCapability::KeyboardOnly => SMP_IO_CAPABILITY_KEYBOARD_ONLY,
            IoCapability::NoInputNoOutput => SMP_IO_CAPABILITY_NO_INPUT_NO_OUTPUT,
            IoCapability::KeyboardDisplay => SMP_IO_CAPABILITY_KEYBOARD_DISPLAY,
        }
    }

    /// Convert from u8 value from protocol
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            SMP_IO_CAPABILITY_DISPLAY_ONLY => Some(IoCapability::DisplayOnly),
            SMP_IO_CAPABILITY_DISPLAY_YES_NO => Some(IoCapability::DisplayYesNo),
            SMP_IO_CAPABILITY_KEYBOARD_ONLY => Some(IoCapability::KeyboardOnly),
            SMP_IO_CAPABILITY_NO_INPUT_NO_OUTPUT => Some(IoCapability::NoInputNoOutput),
            SMP_IO_CAPABILITY_KEYBOARD_DISPLAY => Some(IoCapability::KeyboardDisplay),
            _ => None,
        }
    }
}

impl fmt::Display for IoCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoCapability::DisplayOnly => write!(f, "Display Only"),
            IoCapability::DisplayYesNo => write!(f, "Display Yes/No"),
            IoCapability::KeyboardOnly => write!(f, "Keyboard Only"),
            IoCapability::NoInputNoOutput => write!(f, "No Input No Output"),
            IoCapability::KeyboardDisplay => write!(f, "Keyboard Display"),
        }
    }
}

bitflags! {
    /// Key distribution preferences
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct KeyDistribution: u8 {
        /// Encryption key (LTK, EDIV, RAND)
        const ENCRYPTION = SMP_KEY_DIST_ENC_KEY;
        /// Identity key (IRK, identity address)
        const IDENTITY = SMP_KEY_DIST_ID_KEY;
        /// Signing key (CSRK)
        const SIGNING = SMP_KEY_DIST_SIGN_KEY;
        /// Link key derivation
        const LINK = SMP_KEY_DIST_LINK_KEY;
    }
}

/// Security level for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecurityLevel {
    /// No security (unencrypted)
    None = 0,
    /// Encryption without authentication (Just Works)
    EncryptionOnly = 1,
    /// Encryption with authentication (MITM protection)
    EncryptionWithAuthentication = 2,
    /// Secure Connections with encryption and authentication
    SecureConnections = 3,
}

impl SecurityLevel {
    pub fn is_encrypted(&self) -> bool {
        *self >= SecurityLevel::EncryptionOnly
    }

    pub fn is_authenticated(&self) -> bool {
        *self >= SecurityLevel::EncryptionWithAuthentication
    }
}

/// Status reported when a security procedure ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityStatus {
    Success,
    Timeout,
    PduInvalid,
    PasskeyEntryFailed,
    OobNotAvailable,
    AuthenticationRequirements,
    ConfirmValueFailed,
    PairingNotSupported,
    EncryptionKeySize,
    CommandNotSupported,
    Unspecified,
    RepeatedAttempts,
    InvalidParameters,
    DhKeyFailure,
    NumericComparisonFailure,
    BrEdrInProgress,
    CrossTransportKeyDisallowed,
    /// Reserved or vendor specific code
    Unknown(u8),
}

impl SecurityStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, SecurityStatus::Success)
    }

    /// Map an SMP Pairing Failed reason to the status the controller reports for it
    pub fn from_smp_reason(reason: u8) -> Self {
        Self::from(SEC_STATUS_SMP_REASON_BASE.wrapping_add(reason))
    }
}

impl From<u8> for SecurityStatus {
    fn from(value: u8) -> Self {
        if value < SEC_STATUS_SMP_REASON_BASE {
            return match value {
                SEC_STATUS_SUCCESS => SecurityStatus::Success,
                SEC_STATUS_TIMEOUT => SecurityStatus::Timeout,
                SEC_STATUS_PDU_INVALID => SecurityStatus::PduInvalid,
                other => SecurityStatus::Unknown(other),
            };
        }
        match value - SEC_STATUS_SMP_REASON_BASE {
            SMP_REASON_PASSKEY_ENTRY_FAILED => SecurityStatus::PasskeyEntryFailed,
            SMP_REASON_OOB_NOT_AVAILABLE => SecurityStatus::OobNotAvailable,
            SMP_REASON_AUTHENTICATION_REQUIREMENTS => SecurityStatus::AuthenticationRequirements,
            SMP_REASON_CONFIRM_VALUE_FAILED => SecurityStatus::ConfirmValueFailed,
            SMP_REASON_PAIRING_NOT_SUPPORTED => SecurityStatus::PairingNotSupported,
            SMP_REASON_ENCRYPTION_KEY_SIZE => SecurityStatus::EncryptionKeySize,
            SMP_REASON_COMMAND_NOT_SUPPORTED => SecurityStatus::CommandNotSupported,
            SMP_REASON_UNSPECIFIED_REASON => SecurityStatus::Unspecified,
            SMP_REASON_REPEATED_ATTEMPTS => SecurityStatus::RepeatedAttempts,
            SMP_REASON_INVALID_PARAMETERS => SecurityStatus::InvalidParameters,
            SMP_REASON_DHKEY_CHECK_FAILED => SecurityStatus::DhKeyFailure,
            SMP_REASON_NUMERIC_COMPARISON_FAILED => SecurityStatus::NumericComparisonFailure,
            SMP_REASON_BR_EDR_PAIRING_IN_PROGRESS => SecurityStatus::BrEdrInProgress,
            SMP_REASON_CROSS_TRANSPORT_KEY_NOT_ALLOWED => {
                SecurityStatus::CrossTransportKeyDisallowed
            }
            _ => SecurityStatus::Unknown(value),
        }
    }
}

impl From<SecurityStatus> for u8 {
    fn from(value: SecurityStatus) -> Self {
        let smp = |reason: u8| SEC_STATUS_SMP_REASON_BASE + reason;
        match value {
            SecurityStatus::Success => SEC_STATUS_SUCCESS,
            SecurityStatus::Timeout => SEC_STATUS_TIMEOUT,
            SecurityStatus::PduInvalid => SEC_STATUS_PDU_INVALID,
            SecurityStatus::PasskeyEntryFailed => smp(SMP_REASON_PASSKEY_ENTRY_FAILED),
            SecurityStatus::OobNotAvailable => smp(SMP_REASON_OOB_NOT_AVAILABLE),
            SecurityStatus::AuthenticationRequirements => {
                smp(SMP_REASON_AUTHENTICATION_REQUIREMENTS)
            }
            SecurityStatus::ConfirmValueFailed => smp(SMP_REASON_CONFIRM_VALUE_FAILED),
            SecurityStatus::PairingNotSupported => smp(SMP_REASON_PAIRING_NOT_SUPPORTED),
            SecurityStatus::EncryptionKeySize => smp(SMP_REASON_ENCRYPTION_KEY_SIZE),
            SecurityStatus::CommandNotSupported => smp(SMP_REASON_COMMAND_NOT_SUPPORTED),
            SecurityStatus::Unspecified => smp(SMP_REASON_UNSPECIFIED_REASON),
            SecurityStatus::RepeatedAttempts => smp(SMP_REASON_REPEATED_ATTEMPTS),
            SecurityStatus::InvalidParameters => smp(SMP_REASON_INVALID_PARAMETERS),
            SecurityStatus::DhKeyFailure => smp(SMP_REASON_DHKEY_CHECK_FAILED),
            SecurityStatus::NumericComparisonFailure => smp(SMP_REASON_NUMERIC_COMPARISON_FAILED),
            SecurityStatus::BrEdrInProgress => smp(SMP_REASON_BR_EDR_PAIRING_IN_PROGRESS),
            SecurityStatus::CrossTransportKeyDisallowed => {
                smp(SMP_REASON_CROSS_TRANSPORT_KEY_NOT_ALLOWED)
            }
            SecurityStatus::Unknown(code) => code,
        }
    }
}

impl fmt::Display for SecurityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityStatus::Unknown(code) => write!(f, "Unknown({:#04x})", code),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Kind of key the controller asks the user for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKeyType {
    None,
    Passkey,
    Oob,
}

impl AuthKeyType {
    pub fn to_u8(&self) -> u8 {
        match self {
            AuthKeyType::None => SMP_AUTH_KEY_TYPE_NONE,
            AuthKeyType::Passkey => SMP_AUTH_KEY_TYPE_PASSKEY,
            AuthKeyType::Oob => SMP_AUTH_KEY_TYPE_OOB,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            SMP_AUTH_KEY_TYPE_NONE => Some(AuthKeyType::None),
            SMP_AUTH_KEY_TYPE_PASSKEY => Some(AuthKeyType::Passkey),
            SMP_AUTH_KEY_TYPE_OOB => Some(AuthKeyType::Oob),
            _ => None,
        }
    }
}

/// Key material supplied by the user in response to an auth key request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKey {
    /// Six digit passkey (0-999999)
    Passkey(u32),
    /// 128-bit out-of-band temporary key
    Oob([u8; SMP_KEY_LEN]),
}

impl AuthKey {
    pub fn key_type(&self) -> AuthKeyType {
        match self {
            AuthKey::Passkey(_) => AuthKeyType::Passkey,
            AuthKey::Oob(_) => AuthKeyType::Oob,
        }
    }

    /// Check the key is well formed
    pub fn validate(&self) -> SmpResult<()> {
        match self {
            AuthKey::Passkey(passkey) if *passkey > SMP_PASSKEY_MAX => Err(SmpError::InvalidInput(
                format!("Passkey {} exceeds {} digits", passkey, SMP_PASSKEY_DIGITS),
            )),
            _ => Ok(()),
        }
    }

    /// Encode for the auth key reply: passkeys as six ASCII digits, OOB keys raw
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            AuthKey::Passkey(passkey) => format!("{:06}", passkey).into_bytes(),
            AuthKey::Oob(key) => key.to_vec(),
        }
    }
}

/// Source of a controller timeout event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutSource {
    Advertising,
    SecurityRequest,
    Scan,
    Connection,
    Unknown(u8),
}

impl From<u8> for TimeoutSource {
    fn from(value: u8) -> Self {
        match value {
            TIMEOUT_SRC_ADVERTISING => TimeoutSource::Advertising,
            TIMEOUT_SRC_SECURITY_REQUEST => TimeoutSource::SecurityRequest,
            TIMEOUT_SRC_SCAN => TimeoutSource::Scan,
            TIMEOUT_SRC_CONN => TimeoutSource::Connection,
            other => TimeoutSource::Unknown(other),
        }
    }
}

/// Desired security behaviour for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityParameters {
    /// Require passcode (MITM protected) pairing
    pub passcode_pairing: bool,
    pub io_capabilities: IoCapability,
    /// Perform long-term bonding
    pub bond: bool,
    pub out_of_band: bool,
    /// Reject every pairing request from the peer
    pub reject_pairing_requests: bool,
}

impl Default for SecurityParameters {
    fn default() -> Self {
        Self {
            passcode_pairing: false,
            io_capabilities: IoCapability::KeyboardDisplay,
            bond: false,
            out_of_band: false,
            reject_pairing_requests: false,
        }
    }
}

impl SecurityParameters {
    pub fn with_passcode_pairing(mut self, passcode_pairing: bool) -> Self {
        self.passcode_pairing = passcode_pairing;
        self
    }

    pub fn with_io_capabilities(mut self, io_capabilities: IoCapability) -> Self {
        self.io_capabilities = io_capabilities;
        self
    }

    pub fn with_bond(mut self, bond: bool) -> Self {
        self.bond = bond;
        self
    }

    pub fn with_out_of_band(mut self, out_of_band: bool) -> Self {
        self.out_of_band = out_of_band;
        self
    }

    pub fn with_reject_pairing_requests(mut self, reject: bool) -> Self {
        self.reject_pairing_requests = reject;
        self
    }

    /// Derive the parameters handed to the controller
    pub fn to_sec_params(&self) -> SecParams {
        SecParams {
            bond: self.bond,
            mitm: self.passcode_pairing,
            lesc: false,
            keypress: false,
            io_capabilities: self.io_capabilities,
            oob: self.out_of_band,
            min_key_size: SMP_MIN_ENCRYPTION_KEY_SIZE,
            max_key_size: SMP_MAX_ENCRYPTION_KEY_SIZE,
            own_key_dist: KeyDistribution::ENCRYPTION | KeyDistribution::IDENTITY,
            peer_key_dist: KeyDistribution::ENCRYPTION | KeyDistribution::IDENTITY,
        }
    }
}

/// Security parameters as exchanged with the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecParams {
    pub bond: bool,
    pub mitm: bool,
    /// LE Secure Connections
    pub lesc: bool,
    pub keypress: bool,
    pub io_capabilities: IoCapability,
    pub oob: bool,
    pub min_key_size: u8,
    pub max_key_size: u8,
    pub own_key_dist: KeyDistribution,
    pub peer_key_dist: KeyDistribution,
}

/// Pairing progress of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    Idle,
    /// Responder received a security parameters request and is replying
    AwaitingSecurityParamsReply,
    Negotiating,
    /// Waiting for the user to supply a passkey or OOB key
    AwaitingAuthKey,
    /// Peer asked for stored key information
    AwaitingKeyInfo,
    Complete(SecurityStatus),
}

impl PairingState {
    /// Whether a new pairing procedure may start from this state
    pub fn is_idle(&self) -> bool {
        matches!(self, PairingState::Idle | PairingState::Complete(_))
    }
}

/// Payload of the pairing-complete notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingCompleteEventArgs {
    pub conn_handle: u16,
    pub status: SecurityStatus,
}

/// Payload of the passkey-display notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasskeyDisplayEventArgs {
    pub conn_handle: u16,
    pub passkey: u32,
    /// The user must confirm the passkey matches the one shown on the peer
    pub match_request: bool,
}
