//! Cryptographic functions for the Security Manager Protocol
//!
//! Resolvable private address support: the `ah` random address hash
//! (BT Core Spec Vol 3, Part H, 2.2.2) and the checks built on it.

use super::constants::*;
use crate::error::{SmpError, SmpResult};
use crate::gap::constants::{BD_ADDR_LEN, RANDOM_ADDR_RESOLVABLE_BITS, RANDOM_ADDR_SUBTYPE_MASK};
use crate::gap::{AddressType, PeerAddress};
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use rand::RngCore;

/// AES-128 encrypt a single block. Key and data are big-endian.
pub fn aes_encrypt(key: &[u8; SMP_KEY_LEN], data: &[u8; SMP_KEY_LEN]) -> [u8; SMP_KEY_LEN] {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut block = GenericArray::clone_from_slice(data);
    cipher.encrypt_block(&mut block);

    let mut output = [0u8; SMP_KEY_LEN];
    output.copy_from_slice(&block);
    output
}

/// Random address hash function `ah`
///
/// `ah(k, r) = e(k, r') mod 2^24` where `r'` is `r` padded with 13 leading
/// zero bytes. `key` is the IRK in big-endian order.
pub fn ah(key: &[u8; SMP_KEY_LEN], prand: &[u8]) -> SmpResult<[u8; SMP_ADDR_HASH_LEN]> {
    if prand.len() != SMP_PRAND_LEN {
        return Err(SmpError::InvalidInput(format!(
            "prand must be {} bytes, got {}",
            SMP_PRAND_LEN,
            prand.len()
        )));
    }

    let mut r_prime = [0u8; SMP_KEY_LEN];
    r_prime[SMP_KEY_LEN - SMP_PRAND_LEN..].copy_from_slice(prand);

    let encrypted = aes_encrypt(key, &r_prime);
    let mut hash = [0u8; SMP_ADDR_HASH_LEN];
    hash.copy_from_slice(&encrypted[SMP_KEY_LEN - SMP_ADDR_HASH_LEN..]);
    Ok(hash)
}

/// Check whether raw address bytes were generated from `irk`.
///
/// `addr` is most significant byte first: `prand[3] || hash[3]`.
/// `irk` is little-endian, as stored in key sets and bond records.
pub fn resolve_address_bytes(addr: &[u8], irk: &[u8; SMP_KEY_LEN]) -> SmpResult<bool> {
    if addr.len() != BD_ADDR_LEN {
        return Err(SmpError::InvalidInput(format!(
            "Address must be {} bytes, got {}",
            BD_ADDR_LEN,
            addr.len()
        )));
    }
    let (prand, addr_hash) = addr.split_at(SMP_PRAND_LEN);

    let mut key = *irk;
    key.reverse();
    let local_hash = ah(&key, prand)?;

    // Compare every byte regardless of where a mismatch occurs
    let diff = local_hash
        .iter()
        .zip(addr_hash)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));
    Ok(diff == 0)
}

/// Check whether a resolvable private address was generated from `irk`
pub fn private_address_resolves(peer_addr: &PeerAddress, irk: &[u8; SMP_KEY_LEN]) -> bool {
    // A PeerAddress always holds six bytes, so resolution cannot fail
    resolve_address_bytes(&peer_addr.addr, irk).unwrap_or(false)
}

/// Build a resolvable private address from a given `prand` and little-endian `irk`
pub fn resolvable_address_from_prand(
    irk: &[u8; SMP_KEY_LEN],
    prand: [u8; SMP_PRAND_LEN],
) -> SmpResult<PeerAddress> {
    let mut key = *irk;
    key.reverse();
    let hash = ah(&key, &prand)?;

    let mut addr = [0u8; BD_ADDR_LEN];
    addr[..SMP_PRAND_LEN].copy_from_slice(&prand);
    addr[SMP_PRAND_LEN..].copy_from_slice(&hash);
    Ok(PeerAddress::new(AddressType::RandomPrivateResolvable, addr))
}

/// Generate a fresh resolvable private address for `irk`
pub fn generate_resolvable_address(irk: &[u8; SMP_KEY_LEN]) -> SmpResult<PeerAddress> {
    let mut prand = [0u8; SMP_PRAND_LEN];
    rand::thread_rng().fill_bytes(&mut prand);
    prand[0] = (prand[0] & !RANDOM_ADDR_SUBTYPE_MASK) | RANDOM_ADDR_RESOLVABLE_BITS;
    resolvable_address_from_prand(irk, prand)
}

/// Generate a local Identity Resolving Key (IRK)
pub fn generate_irk() -> [u8; SMP_KEY_LEN] {
    let mut irk = [0u8; SMP_KEY_LEN];
    rand::thread_rng().fill_bytes(&mut irk);
    irk
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // BT Core Spec Vol 3, Part H, Appendix D.7
    const SPEC_IRK_BE: &str = "ec0234a357c8ad05341010a60a397d9b";
    const SPEC_PRAND: [u8; 3] = [0x70, 0x81, 0x94];
    const SPEC_HASH: [u8; 3] = [0x0d, 0xfb, 0xaa];

    fn spec_irk_le() -> [u8; 16] {
        let mut irk = [0u8; 16];
        hex::decode_to_slice(SPEC_IRK_BE, &mut irk).unwrap();
        irk.reverse();
        irk
    }

    #[test]
    fn test_ah_spec_vector() {
        let mut key = [0u8; 16];
        hex::decode_to_slice(SPEC_IRK_BE, &mut key).unwrap();
        assert_eq!(ah(&key, &SPEC_PRAND).unwrap(), SPEC_HASH);
    }

    #[test]
    fn test_aes_encrypt_fips197_vector() {
        let mut key = [0u8; 16];
        let mut plain = [0u8; 16];
        let mut expected = [0u8; 16];
        hex::decode_to_slice("000102030405060708090a0b0c0d0e0f", &mut key).unwrap();
        hex::decode_to_slice("00112233445566778899aabbccddeeff", &mut plain).unwrap();
        hex::decode_to_slice("69c4e0d86a7b0430d8cdb78070b4c55a", &mut expected).unwrap();
        assert_eq!(aes_encrypt(&key, &plain), expected);
    }

    #[test]
    fn test_spec_address_resolves() {
        let addr: PeerAddress = "70:81:94:0D:FB:AA".parse().unwrap();
        assert!(private_address_resolves(&addr, &spec_irk_le()));
        assert!(!private_address_resolves(&addr, &[0u8; 16]));
    }

    #[test]
    fn test_ah_rejects_bad_prand_length() {
        let key = [0u8; 16];
        assert!(matches!(ah(&key, &[1, 2]), Err(SmpError::InvalidInput(_))));
        assert!(matches!(ah(&key, &[1, 2, 3, 4]), Err(SmpError::InvalidInput(_))));
    }

    #[test]
    fn test_resolve_rejects_bad_address_length() {
        let irk = spec_irk_le();
        for len in [0usize, 3, 5, 7, 12] {
            let addr = vec![0x40u8; len];
            assert!(matches!(
                resolve_address_bytes(&addr, &irk),
                Err(SmpError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_generated_address_is_resolvable() {
        let irk = generate_irk();
        let addr = generate_resolvable_address(&irk).unwrap();
        assert_eq!(addr.addr_type, AddressType::RandomPrivateResolvable);
        assert_eq!(addr.addr[0] & 0xC0, 0x40);
        assert!(private_address_resolves(&addr, &irk));
    }

    proptest! {
        #[test]
        fn prop_address_resolves_against_own_irk(irk in any::<[u8; 16]>(), prand in any::<[u8; 3]>()) {
            let addr = resolvable_address_from_prand(&irk, prand).unwrap();
            prop_assert!(private_address_resolves(&addr, &irk));
        }

        #[test]
        fn prop_flipped_hash_bit_fails(
            irk in any::<[u8; 16]>(),
            prand in any::<[u8; 3]>(),
            bit in 0usize..24,
        ) {
            let mut addr = resolvable_address_from_prand(&irk, prand).unwrap();
            addr.addr[SMP_PRAND_LEN + bit / 8] ^= 1 << (bit % 8);
            prop_assert!(!private_address_resolves(&addr, &irk));
        }
    }
}
