//! Rolling-hash signature search: the sender's half of delta matching.
//!
//! # Upstream Reference
//!
//! `match.c:hash_search`, as summarized in spec.md §4.H: scan the source
//! byte by byte, looking up tag candidates, confirming with the strong
//! checksum, and emitting literal/reference tokens. This module is pure
//! (operates on an in-memory byte slice and a prebuilt signature table)
//! so `transfer::sender` can own the actual wire I/O and chunking.

use checksums::{block_strong_sum, RollingChecksum};
use signature::SumBuf;

use crate::tag_table::TagTable;

/// One matched span of the source file relative to the block signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match {
    /// Bytes with no corresponding remote block; the caller emits these
    /// as one or more positive-length literal tokens.
    Literal(std::ops::Range<usize>),
    /// A byte range matching block `index` in the signature list; the
    /// caller emits a single negative reference token.
    Reference {
        /// Matched block index.
        index: u32,
        /// Byte range in `source` this reference covers (for callers
        /// that want to verify or log the match).
        range: std::ops::Range<usize>,
    },
}

/// Scans `source` against `sums` (built from a [`TagTable`] over the
/// same `sums`) and returns the ordered sequence of literal/reference
/// spans covering the whole source.
///
/// `block_length` and `seed`/`checksum_length` must match the
/// [`signature::SumHead`] that produced `sums`.
#[must_use]
pub fn scan(
    source: &[u8],
    sums: &[SumBuf],
    table: &TagTable,
    block_length: u32,
    seed: i32,
    checksum_length: usize,
) -> Vec<Match> {
    let mut matches = Vec::new();
    if source.is_empty() || block_length == 0 {
        if !source.is_empty() {
            matches.push(Match::Literal(0..source.len()));
        }
        return matches;
    }

    let block_length = block_length as usize;
    let mut last_match = 0usize;
    let mut window_start = 0usize;
    let mut window_end = block_length.min(source.len());
    let mut rolling = RollingChecksum::new(&source[window_start..window_end]);

    loop {
        let window_len = window_end - window_start;
        let is_final_window = window_end == source.len();
        // A window is only worth confirming when it's either a full
        // block (the common sliding case) or the short tail at the end
        // of the source: `SumHead::plan`'s remainder block has exactly
        // this length, via `find_confirmed_match`'s own `sum.len` check.
        if window_len == block_length || (is_final_window && window_len > 0) {
            if let Some(index) = find_confirmed_match(
                source,
                window_start,
                window_end,
                sums,
                table,
                &rolling,
                seed,
                checksum_length,
            ) {
                if window_start > last_match {
                    matches.push(Match::Literal(last_match..window_start));
                }
                matches.push(Match::Reference {
                    index,
                    range: window_start..window_end,
                });
                last_match = window_end;

                window_start = window_end;
                if window_start >= source.len() {
                    break;
                }
                window_end = (window_start + block_length).min(source.len());
                rolling = RollingChecksum::new(&source[window_start..window_end]);
                continue;
            }
        }

        if window_end >= source.len() {
            break;
        }

        let outgoing = source[window_start];
        let incoming = source[window_end];
        rolling.roll(outgoing, incoming);
        window_start += 1;
        window_end += 1;
    }

    if last_match < source.len() {
        matches.push(Match::Literal(last_match..source.len()));
    }

    matches
}

#[allow(clippy::too_many_arguments)]
fn find_confirmed_match(
    source: &[u8],
    window_start: usize,
    window_end: usize,
    sums: &[SumBuf],
    table: &TagTable,
    rolling: &RollingChecksum,
    seed: i32,
    checksum_length: usize,
) -> Option<u32> {
    let short_sum = rolling.value();
    for candidate in table.candidates(short_sum) {
        let sum = &sums[candidate as usize];
        if sum.sum1 != short_sum {
            continue;
        }
        if sum.len as usize != window_end - window_start {
            continue;
        }
        let window = &source[window_start..window_end];
        let strong = block_strong_sum(seed, window, checksum_length);
        if strong == sum.sum2 {
            return Some(sum.index);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use signature::SumHead;

    fn signatures_for(data: &[u8], seed: i32) -> (SumHead, Vec<SumBuf>, TagTable) {
        let head = SumHead::plan(data.len() as u64, 16);
        let mut sums = Vec::new();
        let mut offset = 0usize;
        for index in 0..head.checksum_count {
            let len = head.block_len_at(index) as usize;
            let block = &data[offset..offset + len];
            sums.push(SumBuf {
                index,
                offset: offset as u64,
                len: len as u32,
                sum1: RollingChecksum::new(block).value(),
                sum2: block_strong_sum(seed, block, 16),
            });
            offset += len;
        }
        let table = TagTable::build(&sums);
        (head, sums, table)
    }

    #[test]
    fn identical_file_is_two_full_matches_including_the_remainder_block() {
        // 1024 bytes plans to block_length=700, checksum_count=2,
        // remainder_length=324: the tail is shorter than a full block
        // and must still be matched through the remainder sum.
        let data = vec![0x55u8; 1024];
        let (head, sums, table) = signatures_for(&data, 3);
        assert_eq!(head.checksum_count, 2);
        assert_eq!(head.remainder_length, 324);

        let matches = scan(&data, &sums, &table, head.block_length, 3, 16);
        assert_eq!(
            matches,
            vec![
                Match::Reference { index: 0, range: 0..700 },
                Match::Reference { index: 1, range: 700..1024 },
            ]
        );
    }

    #[test]
    fn changed_remainder_block_falls_back_to_a_trailing_literal() {
        // Same plan as above (block_length=700, remainder_length=324),
        // but the local copy's tail doesn't match the remote's, so it
        // must still be attempted against the remainder sum and then
        // fall back to a literal rather than being silently dropped.
        let remote = vec![0x55u8; 1024];
        let (head, sums, table) = signatures_for(&remote, 3);

        let mut local = vec![0x55u8; 700];
        local.extend_from_slice(&[0x77u8; 324]);

        let matches = scan(&local, &sums, &table, head.block_length, 3, 16);
        assert_eq!(
            matches,
            vec![
                Match::Reference { index: 0, range: 0..700 },
                Match::Literal(700..1024),
            ]
        );
    }

    #[test]
    fn file_shorter_than_the_minimum_block_length_can_still_match() {
        // A whole file under MIN_BLOCK_LENGTH plans to a single block
        // covering the entire file; the main loop's initial window is
        // already shorter than `block_length` and must still be tried.
        let data = vec![0x33u8; 400];
        let (head, sums, table) = signatures_for(&data, 7);
        assert_eq!(head.checksum_count, 1);

        let matches = scan(&data, &sums, &table, head.block_length, 7, 16);
        assert_eq!(matches, vec![Match::Reference { index: 0, range: 0..400 }]);
    }

    #[test]
    fn disjoint_blocks_are_found_after_a_shifted_prefix() {
        let block_a = vec![0xAAu8; 16];
        let block_b = vec![0xBBu8; 16];
        let block_c = vec![0xCCu8; 16];
        let mut remote = Vec::new();
        remote.extend_from_slice(&block_a);
        remote.extend_from_slice(&block_b);
        remote.extend_from_slice(&block_c);

        let head = SumHead {
            checksum_count: 3,
            block_length: 16,
            checksum_length: 16,
            remainder_length: 0,
        };
        let mut sums = Vec::new();
        for (index, block) in [&block_a, &block_b, &block_c].into_iter().enumerate() {
            sums.push(SumBuf {
                index: index as u32,
                offset: (index * 16) as u64,
                len: 16,
                sum1: RollingChecksum::new(block).value(),
                sum2: block_strong_sum(9, block, 16),
            });
        }
        let table = TagTable::build(&sums);

        let mut local = vec![0xFFu8; 4];
        local.extend_from_slice(&block_b);
        local.extend_from_slice(&[0xEEu8; 5]);

        let matches = scan(&local, &sums, &table, head.block_length, 9, 16);
        assert!(matches
            .iter()
            .any(|m| matches!(m, Match::Reference { index: 1, .. })));
        assert!(matches.iter().any(|m| matches!(m, Match::Literal(_))));
    }

    #[test]
    fn completely_different_file_yields_only_literals() {
        let data = vec![0x11u8; 1024];
        let (head, sums, table) = signatures_for(&data, 3);
        let different = vec![0x22u8; 1024];
        let matches = scan(&different, &sums, &table, head.block_length, 3, 16);
        assert!(matches.iter().all(|m| matches!(m, Match::Literal(_))));
    }

    #[test]
    fn empty_source_yields_no_matches() {
        let matches = scan(&[], &[], &TagTable::build(&[]), 0, 0, 16);
        assert!(matches.is_empty());
    }
}
