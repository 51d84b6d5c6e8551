/*!
 * Deterministic byte-stream PRNG used to build the Gear table and to draw
 * sampling-digest offsets.
 *
 * Not a cryptographic primitive - it is a keyed deterministic expander built
 * on SHA-256, chosen for the same reason `orbit`'s checksum module reaches
 * for `sha2`: it is already on the dependency graph and its output has no
 * detectable structure for our purposes.
 */

use sha2::{Digest, Sha256};

use crate::error::{CdcError, Result};

const STATE_LEN: usize = 1024;
const MIN_SEED_LEN: usize = 16;
const BLOCK_LEN: usize = 32; // Sha256 output width

/// A reproducible 32-bit stream seeded by a caller-supplied byte sequence.
///
/// Given the same seed, `next_u32` yields a bit-identical sequence on any
/// host, any process, forever - this is the property the Gear table and the
/// sampling digest both depend on.
pub struct DeterministicPrng {
    state: Vec<u8>,
    pos: usize,
    counter: u64,
}

impl DeterministicPrng {
    /// Construct a new PRNG from a seed of at least 16 bytes.
    pub fn new(seed: &[u8]) -> Result<Self> {
        if seed.len() < MIN_SEED_LEN {
            return Err(CdcError::SeedTooShort {
                actual: seed.len(),
                minimum: MIN_SEED_LEN,
            });
        }
        let mut prng = Self {
            state: Vec::with_capacity(STATE_LEN),
            pos: 0,
            counter: 0,
        };
        prng.fill_initial(seed);
        Ok(prng)
    }

    fn fill_initial(&mut self, seed: &[u8]) {
        while self.state.len() < STATE_LEN {
            let mut hasher = Sha256::new();
            hasher.update(seed);
            hasher.update(self.counter.to_le_bytes());
            self.state.extend_from_slice(&hasher.finalize());
            self.counter = self.counter.wrapping_add(1);
        }
        self.state.truncate(STATE_LEN);
    }

    /// Refill the state buffer once it is exhausted: SHA-256 of the current
    /// state, block by block, XORed with a monotonically increasing counter.
    fn refill(&mut self) {
        let ctr_bytes = self.counter.to_le_bytes();
        let mut next_state = Vec::with_capacity(STATE_LEN);
        let mut block_index: u64 = 0;

        while next_state.len() < STATE_LEN {
            let start = next_state.len();
            let end = (start + BLOCK_LEN).min(self.state.len());
            let mut block = self.state[start..end].to_vec();
            for (i, byte) in block.iter_mut().enumerate() {
                *byte ^= ctr_bytes[i % ctr_bytes.len()];
            }

            let mut hasher = Sha256::new();
            hasher.update(&block);
            hasher.update(block_index.to_le_bytes());
            next_state.extend_from_slice(&hasher.finalize());
            block_index += 1;
        }

        next_state.truncate(STATE_LEN);
        self.state = next_state;
        self.pos = 0;
        self.counter = self.counter.wrapping_add(1);
    }

    /// Read the next 4 bytes of the stream as a little-endian `u32`.
    pub fn next_u32(&mut self) -> u32 {
        if self.pos + 4 > self.state.len() {
            self.refill();
        }
        let bytes = [
            self.state[self.pos],
            self.state[self.pos + 1],
            self.state[self.pos + 2],
            self.state[self.pos + 3],
        ];
        self.pos += 4;
        u32::from_le_bytes(bytes)
    }

    /// Draw a `u64` uniformly from `[0, bound)`. Returns 0 when `bound == 0`.
    pub fn next_below(&mut self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        let hi = self.next_u32() as u64;
        let lo = self.next_u32() as u64;
        ((hi << 32) | lo) % bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_seed() {
        let err = DeterministicPrng::new(b"short").unwrap_err();
        assert!(matches!(err, CdcError::SeedTooShort { .. }));
    }

    #[test]
    fn same_seed_same_sequence() {
        let seed = b"0123456789abcdef";
        let mut a = DeterministicPrng::new(seed).unwrap();
        let mut b = DeterministicPrng::new(seed).unwrap();
        for _ in 0..2000 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn different_seed_different_sequence() {
        let mut a = DeterministicPrng::new(b"0123456789abcdef").unwrap();
        let mut b = DeterministicPrng::new(b"fedcba9876543210").unwrap();
        let seq_a: Vec<u32> = (0..64).map(|_| a.next_u32()).collect();
        let seq_b: Vec<u32> = (0..64).map(|_| b.next_u32()).collect();
        assert_ne!(seq_a, seq_b);
    }

    #[test]
    fn survives_multiple_refills() {
        let mut prng = DeterministicPrng::new(b"0123456789abcdef").unwrap();
        // STATE_LEN / 4 = 256 draws per fill; force several refills.
        let values: Vec<u32> = (0..3000).map(|_| prng.next_u32()).collect();
        assert_eq!(values.len(), 3000);
        // Not every value should be identical - sanity check against a
        // degenerate all-zero implementation.
        assert!(values.iter().any(|&v| v != values[0]));
    }

    #[test]
    fn next_below_respects_bound() {
        let mut prng = DeterministicPrng::new(b"0123456789abcdef").unwrap();
        for _ in 0..256 {
            let v = prng.next_below(17);
            assert!(v < 17);
        }
        assert_eq!(prng.next_below(0), 0);
    }
}
