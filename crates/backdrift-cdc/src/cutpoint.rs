/*!
 * Normalized-chunking cut-point finder: the four-phase scan described in the
 * FastCDC 2020 paper, driven by the crate's own Gear hash rather than the
 * paper's reference table.
 *
 * The scalar loop below is the sole semantic reference. A SIMD-accelerated
 * variant could prefetch/load bytes ahead of the scalar scan, but must never
 * emit a cut decision independently of it - see `docs` on [`find_cut_point`].
 */

use crate::gear::{GearTable, HashState};

const KIB: u32 = 1024;
const MIB: u32 = 1024 * 1024;

/// Select the primary cut-point mask for a given target average chunk size.
pub fn mask_for_avg_size(avg_size: u32) -> u32 {
    if avg_size <= 8 * KIB {
        0x0000_7FFF
    } else if avg_size <= MIB {
        0x0007_FFFF
    } else if avg_size <= 16 * MIB {
        0x007F_FFFF
    } else {
        0x07FF_FFFF
    }
}

/// Find the next cut point in `buf[start..end]`.
///
/// `end - start` must not exceed `max_size`. The returned index `cut`
/// satisfies `start + min_size <= cut <= end`.
///
/// This is the scalar reference algorithm: skip phase, primary phase,
/// extended phase, relaxed phase, then a hard fallback at `end`. A
/// SIMD-accelerated implementation MAY vectorize the byte loads feeding each
/// phase, but the rolling hash carries history across bytes, so cut
/// decisions themselves must still come from the scalar state update and
/// mask check, byte by byte - vector lanes cannot emit cuts independently of
/// each other without changing the algorithm's output.
#[allow(clippy::too_many_arguments)]
pub fn find_cut_point(
    table: &GearTable,
    buf: &[u8],
    start: usize,
    end: usize,
    min_size: usize,
    avg_size: usize,
    max_size: usize,
) -> usize {
    debug_assert!(end >= start);
    debug_assert!(end - start <= max_size);

    let mut hash = HashState::new();
    let primary_mask = mask_for_avg_size(avg_size as u32);
    let relaxed_mask = primary_mask >> 1;

    // Skip phase: pre-warm the hash on [start, start+min_size) but never cut here.
    let skip_end = (start + min_size).min(end);
    for &byte in &buf[start..skip_end] {
        hash.roll(table, byte);
    }
    if skip_end >= end {
        return end;
    }

    // Primary phase.
    let primary_end = (start + min_size + avg_size / 2).min(end);
    for (offset, &byte) in buf[skip_end..primary_end].iter().enumerate() {
        let i = skip_end + offset;
        hash.roll(table, byte);
        if hash.value() & primary_mask == 0 {
            return i + 1;
        }
    }

    // Extended phase: same mask, wider window.
    let extended_end = (start + 2 * avg_size).min(end);
    for (offset, &byte) in buf[primary_end..extended_end].iter().enumerate() {
        let i = primary_end + offset;
        hash.roll(table, byte);
        if hash.value() & primary_mask == 0 {
            return i + 1;
        }
    }

    // Relaxed phase: halved mask roughly doubles cut probability near max_size.
    for (offset, &byte) in buf[extended_end..end].iter().enumerate() {
        let i = extended_end + offset;
        hash.roll(table, byte);
        if hash.value() & relaxed_mask == 0 {
            return i + 1;
        }
    }

    // Fallback: hard cap.
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_selection_matches_thresholds() {
        assert_eq!(mask_for_avg_size(4 * 1024), 0x0000_7FFF);
        assert_eq!(mask_for_avg_size(8 * 1024), 0x0000_7FFF);
        assert_eq!(mask_for_avg_size(64 * 1024), 0x0007_FFFF);
        assert_eq!(mask_for_avg_size(1024 * 1024), 0x0007_FFFF);
        assert_eq!(mask_for_avg_size(4 * 1024 * 1024), 0x007F_FFFF);
        assert_eq!(mask_for_avg_size(32 * 1024 * 1024), 0x07FF_FFFF);
    }

    #[test]
    fn never_cuts_before_min_size() {
        let table = GearTable::standard();
        let buf = vec![0xAAu8; 4096];
        let cut = find_cut_point(&table, &buf, 0, buf.len(), 512, 2048, 4096);
        assert!(cut >= 512);
    }

    #[test]
    fn falls_back_to_end_on_pathological_input() {
        // All-zero input rarely satisfies the mask check; confirm we never
        // exceed end regardless.
        let table = GearTable::standard();
        let buf = vec![0u8; 4096];
        let cut = find_cut_point(&table, &buf, 0, buf.len(), 512, 2048, 4096);
        assert!(cut <= buf.len());
        assert!(cut >= 512);
    }

    #[test]
    fn deterministic_across_calls() {
        let table = GearTable::standard();
        let buf: Vec<u8> = (0..8192u32).map(|i| (i % 251) as u8).collect();
        let a = find_cut_point(&table, &buf, 0, buf.len(), 512, 2048, 8192);
        let b = find_cut_point(&table, &buf, 0, buf.len(), 512, 2048, 8192);
        assert_eq!(a, b);
    }
}
