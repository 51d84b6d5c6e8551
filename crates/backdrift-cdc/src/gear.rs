/*!
 * Gear table construction and the rolling hash state it drives.
 *
 * Grounded on `orbit_core_cdc::gear::GearHash` (a from-scratch, crate-local
 * rolling hash with no external RNG dependency) - generalized here so the
 * table itself is produced by a deterministic, seedable expander rather than
 * baked into the binary, per the cross-host reproducibility contract.
 */

use crate::error::Result;
use crate::prng::DeterministicPrng;

/// Mask applied to every PRNG output when building the Gear table.
pub const GEAR_MASK: u32 = 0x0000_D8F3;

/// Fixed 16-byte seed used by [`GearTable::standard`]. Any chunker built
/// with this seed produces byte-identical tables across hosts and processes.
pub const STANDARD_SEED: [u8; 16] = *b"backdrift-gear01";

/// A 256-entry table mapping byte value to a 32-bit Gear weight.
#[derive(Clone)]
pub struct GearTable([u32; 256]);

impl GearTable {
    /// Build a table from an arbitrary seed (must be at least 16 bytes).
    pub fn new(seed: &[u8]) -> Result<Self> {
        let mut prng = DeterministicPrng::new(seed)?;
        let mut table = [0u32; 256];
        for slot in table.iter_mut() {
            *slot = prng.next_u32() & GEAR_MASK;
        }
        Ok(Self(table))
    }

    /// The table every `Chunker` uses unless a caller explicitly supplies a
    /// different seed. Identical across hosts and platforms by construction.
    pub fn standard() -> Self {
        Self::new(&STANDARD_SEED).expect("STANDARD_SEED satisfies the minimum PRNG seed length")
    }

    #[inline]
    pub fn get(&self, byte: u8) -> u32 {
        self.0[byte as usize]
    }

    /// Raw table contents, mostly useful for cross-host stability tests.
    pub fn as_slice(&self) -> &[u32; 256] {
        &self.0
    }
}

/// Rolling 32-bit Gear hash register. Reset at the start of every chunk.
#[derive(Clone, Copy, Default)]
pub struct HashState(u32);

impl HashState {
    pub fn new() -> Self {
        Self(0)
    }

    /// Fold one more byte into the rolling hash: `h <- (h << 1) + T[byte]`.
    #[inline]
    pub fn roll(&mut self, table: &GearTable, byte: u8) -> u32 {
        self.0 = (self.0 << 1).wrapping_add(table.get(byte));
        self.0
    }

    #[inline]
    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}
