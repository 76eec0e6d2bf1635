//! Resolvable private address generation.
//!
//! An RPA is `hash(24 bit) || prand(24 bit)` where
//! `hash = AES-128-E(IRK, 0^104 || prand)` truncated to its low 24 bits —
//! the `ah()` function of the Core Specification.  The address is stored
//! little-endian: bytes 0..3 carry the hash, bytes 3..6 the prand, and the
//! top two bits of byte 5 are forced to the resolvable class (`01`).

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use rand_core::RngCore;

use crate::adv::BdAddr;
use crate::config::{RESOLVE_ADDR_MASK, RESOLVE_ADDR_MSB};

/// Build a fresh resolvable private address from a random prand draw and
/// the local identity resolving key.
pub fn generate(irk: &[u8; 16], rng: &mut dyn RngCore) -> BdAddr {
    let mut prand = [0u8; 3];
    rng.fill_bytes(&mut prand);
    resolvable_from_prand(irk, prand)
}

/// Deterministic core of [`generate`], split out so known-answer vectors
/// can drive it.  `prand` is little-endian (byte 2 is the address's top
/// byte and gets the class bits).
pub fn resolvable_from_prand(irk: &[u8; 16], mut prand: [u8; 3]) -> BdAddr {
    prand[2] = (prand[2] & !RESOLVE_ADDR_MASK) | RESOLVE_ADDR_MSB;

    // ah(k, r): r sits in the least-significant 24 bits of the block.
    let mut block = GenericArray::from([0u8; 16]);
    block[13] = prand[2];
    block[14] = prand[1];
    block[15] = prand[0];

    let cipher = Aes128::new(GenericArray::from_slice(irk));
    cipher.encrypt_block(&mut block);

    [block[15], block[14], block[13], prand[0], prand[1], prand[2]]
}
