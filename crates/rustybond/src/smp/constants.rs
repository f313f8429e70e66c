//! Constants for the Security Manager Protocol

// IO Capability values
pub const SMP_IO_CAPABILITY_DISPLAY_ONLY: u8 = 0x00;
pub const SMP_IO_CAPABILITY_DISPLAY_YES_NO: u8 = 0x01;
pub const SMP_IO_CAPABILITY_KEYBOARD_ONLY: u8 = 0x02;
pub const SMP_IO_CAPABILITY_NO_INPUT_NO_OUTPUT: u8 = 0x03;
pub const SMP_IO_CAPABILITY_KEYBOARD_DISPLAY: u8 = 0x04;

// Pairing Failed reason codes
pub const SMP_REASON_PASSKEY_ENTRY_FAILED: u8 = 0x01;
pub const SMP_REASON_OOB_NOT_AVAILABLE: u8 = 0x02;
pub const SMP_REASON_AUTHENTICATION_REQUIREMENTS: u8 = 0x03;
pub const SMP_REASON_CONFIRM_VALUE_FAILED: u8 = 0x04;
pub const SMP_REASON_PAIRING_NOT_SUPPORTED: u8 = 0x05;
pub const SMP_REASON_ENCRYPTION_KEY_SIZE: u8 = 0x06;
pub const SMP_REASON_COMMAND_NOT_SUPPORTED: u8 = 0x07;
pub const SMP_REASON_UNSPECIFIED_REASON: u8 = 0x08;
pub const SMP_REASON_REPEATED_ATTEMPTS: u8 = 0x09;
pub const SMP_REASON_INVALID_PARAMETERS: u8 = 0x0A;
pub const SMP_REASON_DHKEY_CHECK_FAILED: u8 = 0x0B;
pub const SMP_REASON_NUMERIC_COMPARISON_FAILED: u8 = 0x0C;
pub const SMP_REASON_BR_EDR_PAIRING_IN_PROGRESS: u8 = 0x0D;
pub const SMP_REASON_CROSS_TRANSPORT_KEY_NOT_ALLOWED: u8 = 0x0E;

// Controller security status codes. SMP failure reasons are reported
// with SEC_STATUS_SMP_REASON_BASE added.
pub const SEC_STATUS_SUCCESS: u8 = 0x00;
pub const SEC_STATUS_TIMEOUT: u8 = 0x01;
pub const SEC_STATUS_PDU_INVALID: u8 = 0x02;
pub const SEC_STATUS_SMP_REASON_BASE: u8 = 0x80;

// SMP key distribution bit masks
pub const SMP_KEY_DIST_ENC_KEY: u8 = 0x01;
pub const SMP_KEY_DIST_ID_KEY: u8 = 0x02;
pub const SMP_KEY_DIST_SIGN_KEY: u8 = 0x04;
pub const SMP_KEY_DIST_LINK_KEY: u8 = 0x08;

// SMP encryption key size limits
pub const SMP_MIN_ENCRYPTION_KEY_SIZE: u8 = 7;
pub const SMP_MAX_ENCRYPTION_KEY_SIZE: u8 = 16;

// Authentication key types requested by the controller
pub const SMP_AUTH_KEY_TYPE_NONE: u8 = 0x00;
pub const SMP_AUTH_KEY_TYPE_PASSKEY: u8 = 0x01;
pub const SMP_AUTH_KEY_TYPE_OOB: u8 = 0x02;

// Timeout sources
pub const TIMEOUT_SRC_ADVERTISING: u8 = 0x00;
pub const TIMEOUT_SRC_SECURITY_REQUEST: u8 = 0x01;
pub const TIMEOUT_SRC_SCAN: u8 = 0x02;
pub const TIMEOUT_SRC_CONN: u8 = 0x03;

// Passkeys are six decimal digits
pub const SMP_PASSKEY_MAX: u32 = 999_999;
pub const SMP_PASSKEY_DIGITS: usize = 6;

pub const SMP_KEY_LEN: usize = 16;
pub const SMP_MASTER_ID_RAND_LEN: usize = 8;

// Address resolution (ah) sizes
pub const SMP_PRAND_LEN: usize = 3;
pub const SMP_ADDR_HASH_LEN: usize = 3;
