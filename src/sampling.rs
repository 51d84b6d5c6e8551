/*!
 * Sampling (fingerprint) digest: a cheap stand-in for a full content digest
 * on large files, built from a handful of seeded sample windows rather than
 * the whole byte stream.
 *
 * Grounded on `orbit::core::checksum::StreamingHasher` for the full-digest
 * fallback path, combined with `backdrift_cdc::DeterministicPrng` for the
 * sample-offset draws it otherwise has no use for.
 */

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use chrono::{Datelike, Utc};

use backdrift_cdc::{content_digest, DeterministicPrng, HashKind};

use crate::error::Result;

const DEFAULT_SAMPLE_SIZE: usize = 1024;
const DEFAULT_K: usize = 16;

/// Parameters for [`sampling_digest`].
#[derive(Debug, Clone, Copy)]
pub struct SamplingConfig {
    pub sample_size: usize,
    pub k: usize,
    pub hash_kind: HashKind,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self { sample_size: DEFAULT_SAMPLE_SIZE, k: DEFAULT_K, hash_kind: HashKind::Sha256 }
    }
}

/// A day-scoped fingerprint: full content digest for files smaller than the
/// sampling threshold, otherwise a digest over a handful of seeded sample
/// windows.
///
/// `base_seed` is folded with the current UTC calendar day before any sample
/// offsets are drawn, so the result is stable within a day and changes at
/// every UTC midnight - a deliberate TTL for cached fingerprints. Local time
/// is never consulted.
pub fn sampling_digest(path: &Path, base_seed: &[u8], config: SamplingConfig) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();

    let threshold = config.sample_size as u64 * (3 + config.k as u64);
    if len < threshold {
        let mut buf = Vec::with_capacity(len as usize);
        file.read_to_end(&mut buf)?;
        return Ok(content_digest(config.hash_kind, &buf));
    }

    let seed = fold_day_into_seed(base_seed);
    let offsets = sample_offsets(len, config, &seed)?;

    let mut scratch = Vec::with_capacity(offsets.len() * config.sample_size);
    for offset in offsets {
        file.seek(SeekFrom::Start(offset))?;
        let mut window = vec![0u8; config.sample_size];
        file.read_exact(&mut window)?;
        scratch.extend_from_slice(&window);
    }

    Ok(content_digest(config.hash_kind, &scratch))
}

fn fold_day_into_seed(base_seed: &[u8]) -> Vec<u8> {
    let today = Utc::now();
    let day_code = today.year() as i64 * 10_000 + today.month() as i64 * 100 + today.day() as i64;
    let mut seed = base_seed.to_vec();
    seed.extend_from_slice(&day_code.to_le_bytes());
    // DeterministicPrng requires at least 16 bytes; pad deterministically if
    // the caller's base seed plus the 8-byte day code still falls short.
    while seed.len() < 16 {
        seed.push(0u8);
    }
    seed
}

fn sample_offsets(len: u64, config: SamplingConfig, seed: &[u8]) -> Result<Vec<u64>> {
    let sample_size = config.sample_size as u64;
    let max_start = len.saturating_sub(sample_size);

    let mut offsets = vec![0u64, max_start / 2, max_start];

    let mut prng = DeterministicPrng::new(seed)?;
    for _ in 0..config.k {
        offsets.push(prng.next_below(max_start.max(1)));
    }

    offsets.sort_unstable();
    Ok(offsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn small_file_uses_full_content_digest() {
        let bytes = b"a small file, well under the sampling threshold";
        let file = write_file(bytes);
        let digest = sampling_digest(file.path(), b"seed", SamplingConfig::default()).unwrap();
        assert_eq!(digest, content_digest(HashKind::Sha256, bytes));
    }

    #[test]
    fn large_file_is_deterministic_within_the_same_day() {
        let bytes: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let file = write_file(&bytes);
        let a = sampling_digest(file.path(), b"seed-one", SamplingConfig::default()).unwrap();
        let b = sampling_digest(file.path(), b"seed-one", SamplingConfig::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_base_seeds_yield_different_digests() {
        let bytes: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let file = write_file(&bytes);
        let a = sampling_digest(file.path(), b"seed-one", SamplingConfig::default()).unwrap();
        let b = sampling_digest(file.path(), b"seed-two", SamplingConfig::default()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn sample_offsets_never_exceed_the_file() {
        let len = 500_000u64;
        let config = SamplingConfig::default();
        let offsets = sample_offsets(len, config, b"0123456789abcdef").unwrap();
        for offset in offsets {
            assert!(offset + config.sample_size as u64 <= len);
        }
    }
}
