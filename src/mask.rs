//! C2: client masking-key generation and the XOR mask/unmask routine.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generates a fresh 32-bit masking key from a cryptographic random source,
/// as core spec §4.2 requires for every client-sent frame.
pub fn generate_key() -> [u8; 4] {
    let mut rng = StdRng::from_rng(rand::thread_rng());
    [rng.random(), rng.random(), rng.random(), rng.random()]
}

/// XOR-masks (or unmasks — the operation is its own inverse) `payload` in
/// place with `key`, cycling the key every 4 bytes.
pub fn xor_mask(payload: &mut [u8], key: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_is_involution() {
        let key = [0x12, 0x34, 0x56, 0x78];
        let original = b"the quick brown fox jumps over the lazy dog".to_vec();
        let mut buf = original.clone();
        xor_mask(&mut buf, key);
        assert_ne!(buf, original);
        xor_mask(&mut buf, key);
        assert_eq!(buf, original);
    }

    #[test]
    fn generated_keys_are_not_trivially_constant() {
        let a = generate_key();
        let b = generate_key();
        assert_ne!(a, b, "two generated keys collided; RNG looks broken");
    }
}
