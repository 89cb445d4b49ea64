//! Dense tag-table index used to find candidate blocks in O(1).
//!
//! # Upstream Reference
//!
//! `match.c:build_hash_table`: blocks are sorted by the 16-bit tag of
//! their rolling sum, then a 65,536-slot table records, for each tag
//! value, the position of the first matching block in the sorted order.
//! Ties are broken by original block index so scans are deterministic.

use checksums::tag;
use signature::SumBuf;

const NO_ENTRY: u32 = u32::MAX;

/// Maps a 16-bit tag to the first candidate block in tag-sorted order.
pub struct TagTable {
    /// `(tag, original block index)`, sorted by `(tag, original index)`.
    sorted: Vec<(u16, u32)>,
    /// `first_of_tag[t]` is the position in `sorted` of the first block
    /// whose tag is `t`, or [`NO_ENTRY`] if no block has that tag.
    first_of_tag: Box<[u32; 65536]>,
}

impl TagTable {
    /// Builds a tag table over `sums`.
    #[must_use]
    pub fn build(sums: &[SumBuf]) -> Self {
        let mut sorted: Vec<(u16, u32)> = sums
            .iter()
            .enumerate()
            .map(|(i, s)| (tag(s.sum1), i as u32))
            .collect();
        sorted.sort_unstable();

        let mut first_of_tag = Box::new([NO_ENTRY; 65536]);
        for (pos, &(t, _)) in sorted.iter().enumerate() {
            let slot = &mut first_of_tag[t as usize];
            if *slot == NO_ENTRY {
                *slot = pos as u32;
            }
        }

        Self { sorted, first_of_tag }
    }

    /// Iterates the candidate block indices (original indices, not
    /// sorted positions) whose tag matches `short_sum`'s derived tag, in
    /// ascending original-index order among ties.
    pub fn candidates(&self, short_sum: u32) -> impl Iterator<Item = u32> + '_ {
        let t = tag(short_sum);
        let start = self.first_of_tag[t as usize];
        let start = if start == NO_ENTRY {
            self.sorted.len()
        } else {
            start as usize
        };
        self.sorted[start..]
            .iter()
            .take_while(move |&&(entry_tag, _)| entry_tag == t)
            .map(|&(_, index)| index)
    }
}
