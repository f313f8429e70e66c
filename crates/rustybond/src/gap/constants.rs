// Peer address types as reported by the controller
pub const ADDR_TYPE_PUBLIC: u8 = 0x00;
pub const ADDR_TYPE_RANDOM_STATIC: u8 = 0x01;
pub const ADDR_TYPE_RANDOM_PRIVATE_RESOLVABLE: u8 = 0x02;
pub const ADDR_TYPE_RANDOM_PRIVATE_NON_RESOLVABLE: u8 = 0x03;

pub const BD_ADDR_LEN: usize = 6;

// The two most significant bits of a random address encode its sub-type
pub const RANDOM_ADDR_SUBTYPE_MASK: u8 = 0xC0;
pub const RANDOM_ADDR_STATIC_BITS: u8 = 0xC0;
pub const RANDOM_ADDR_RESOLVABLE_BITS: u8 = 0x40;
pub const RANDOM_ADDR_NON_RESOLVABLE_BITS: u8 = 0x00;
