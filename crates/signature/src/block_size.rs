//! Block-size planning: turns a file length into block count, block
//! length, and remainder.
//!
//! # Upstream Reference
//!
//! Approximates rsync's `checksum.c:sum_sizes_sqroot`. The exact bit-trick
//! constants used by upstream were not available in this workspace's
//! reference material (see `SPEC_FULL.md` §11); this implementation
//! follows spec.md §4.D literally and is covered by property tests
//! instead of byte-for-byte upstream parity.

/// Smallest block length ever chosen for a non-empty file.
pub const MIN_BLOCK_LENGTH: u32 = 700;

/// Largest block length this planner will choose.
pub const MAX_BLOCK_LENGTH: u32 = 16 * 1024 * 1024;

/// Sum header: the four `int32` fields that precede a file's per-block
/// checksum stream on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SumHead {
    /// Number of blocks (`count`).
    pub checksum_count: u32,
    /// Nominal chunk size for this file.
    pub block_length: u32,
    /// Strong-sum truncation length in bytes.
    pub checksum_length: u32,
    /// Length of the final short block, or zero if the file divides
    /// evenly.
    pub remainder_length: u32,
}

impl SumHead {
    /// Plans a [`SumHead`] for a file of `file_len` bytes, using
    /// `checksum_length` for the strong-sum truncation (normally
    /// [`checksums::DEFAULT_CHECKSUM_LEN`]).
    #[must_use]
    pub fn plan(file_len: u64, checksum_length: u32) -> Self {
        if file_len == 0 {
            return Self {
                checksum_count: 0,
                block_length: 0,
                checksum_length,
                remainder_length: 0,
            };
        }

        let block_length = block_length_for(file_len);
        let block_length_u64 = u64::from(block_length);
        let checksum_count = file_len.div_ceil(block_length_u64);
        let remainder = file_len % block_length_u64;

        Self {
            checksum_count: checksum_count as u32,
            block_length,
            checksum_length,
            remainder_length: remainder as u32,
        }
    }

    /// Returns the length in bytes of block `index`, accounting for a
    /// short final block.
    #[must_use]
    pub fn block_len_at(&self, index: u32) -> u32 {
        if index + 1 == self.checksum_count && self.remainder_length != 0 {
            self.remainder_length
        } else {
            self.block_length
        }
    }

    /// Returns the byte offset of block `index` within the file.
    #[must_use]
    pub const fn block_offset(&self, index: u32) -> u64 {
        (index as u64) * (self.block_length as u64)
    }
}

/// Computes the nominal block length for a non-zero file length,
/// approximately `sqrt(len)` rounded up to a multiple of 8 and clamped
/// to `[MIN_BLOCK_LENGTH, MAX_BLOCK_LENGTH]`.
fn block_length_for(file_len: u64) -> u32 {
    debug_assert!(file_len > 0);
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
    let sqrt = (file_len as f64).sqrt().ceil() as u64;
    let rounded = sqrt.div_ceil(8) * 8;
    rounded.clamp(u64::from(MIN_BLOCK_LENGTH), u64::from(MAX_BLOCK_LENGTH)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_length_file_has_no_blocks() {
        let head = SumHead::plan(0, 16);
        assert_eq!(head.checksum_count, 0);
        assert_eq!(head.block_length, 0);
        assert_eq!(head.remainder_length, 0);
    }

    #[test]
    fn small_file_uses_minimum_block_length() {
        let head = SumHead::plan(100, 16);
        assert_eq!(head.block_length, MIN_BLOCK_LENGTH);
        assert_eq!(head.checksum_count, 1);
        assert_eq!(head.remainder_length, 100);
    }

    #[test]
    fn exact_multiple_has_zero_remainder() {
        let head = SumHead::plan(u64::from(MIN_BLOCK_LENGTH) * 4, 16);
        assert_eq!(head.checksum_count, 4);
        assert_eq!(head.remainder_length, 0);
    }

    #[test]
    fn block_len_at_uses_remainder_only_for_last_block() {
        let head = SumHead::plan(2000, 16);
        for i in 0..head.checksum_count - 1 {
            assert_eq!(head.block_len_at(i), head.block_length);
        }
        let last = head.checksum_count - 1;
        let expected = if head.remainder_length != 0 {
            head.remainder_length
        } else {
            head.block_length
        };
        assert_eq!(head.block_len_at(last), expected);
    }

    proptest::proptest! {
        #[test]
        fn property_p3_block_planner_consistency(len in 0u64..50_000_000) {
            let head = SumHead::plan(len, 16);
            if len == 0 {
                proptest::prop_assert_eq!(head.checksum_count, 0);
                proptest::prop_assert_eq!(head.block_length, 0);
            } else {
                proptest::prop_assert!(head.block_length % 8 == 0);
                proptest::prop_assert!(head.block_length >= MIN_BLOCK_LENGTH);
                let accounted = u64::from(head.checksum_count - 1) * u64::from(head.block_length)
                    + u64::from(head.block_len_at(head.checksum_count - 1));
                proptest::prop_assert_eq!(accounted, len);
            }
        }
    }
}
