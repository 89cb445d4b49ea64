//! Strong checksum ("sum2"): MD4 keyed with the per-session seed.
//!
//! # Upstream Reference
//!
//! Mirrors `checksum.c:get_checksum2` (per-block, keyed with the seed
//! appended after the block) and the whole-file digest computed in
//! `receiver.c`/`sender.c` (seed fed *before* the data, not after —
//! the two orderings differ and both are required by spec.md §4.C).

use digest::Digest;

/// Default strong-checksum truncation length for this protocol family
/// (full MD4 digest).
pub const DEFAULT_CHECKSUM_LEN: usize = 16;

/// Computes the per-block strong checksum: `MD4(block ++ seed_le)`,
/// truncated to `checksum_len` bytes.
#[must_use]
pub fn block_strong_sum(seed: i32, block: &[u8], checksum_len: usize) -> Vec<u8> {
    let mut hasher = md4::Md4::new();
    hasher.update(block);
    hasher.update(seed.to_le_bytes());
    let digest = hasher.finalize();
    digest[..checksum_len.min(digest.len())].to_vec()
}

/// Streaming whole-file MD4 hasher, seeded by feeding the little-endian
/// session seed *before* any file bytes.
///
/// # Upstream Reference
///
/// `receiver.c:receive_data` / `sender.c:send_files`: both roles prefix
/// the running hash with the seed before the first literal or reference
/// byte is fed in, then compare the finished digests byte-exact.
#[derive(Clone)]
pub struct WholeFileHasher {
    inner: md4::Md4,
}

impl WholeFileHasher {
    /// Creates a hasher already seeded with `seed`.
    #[must_use]
    pub fn new(seed: i32) -> Self {
        let mut inner = md4::Md4::new();
        inner.update(seed.to_le_bytes());
        Self { inner }
    }

    /// Feeds additional reconstructed bytes into the running hash.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalizes the digest.
    #[must_use]
    pub fn finalize(self) -> [u8; 16] {
        self.inner.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_strong_sum_truncates() {
        let full = block_strong_sum(0, b"abc", 16);
        let short = block_strong_sum(0, b"abc", 4);
        assert_eq!(full.len(), 16);
        assert_eq!(short.len(), 4);
        assert_eq!(&full[..4], &short[..]);
    }

    #[test]
    fn seed_changes_block_sum() {
        let a = block_strong_sum(0, b"abc", 16);
        let b = block_strong_sum(1, b"abc", 16);
        assert_ne!(a, b);
    }

    #[test]
    fn whole_file_hasher_is_order_sensitive_to_seed_prefix() {
        let mut with_seed = WholeFileHasher::new(7);
        with_seed.update(b"payload");
        let digest_a = with_seed.finalize();

        let mut manual = md4::Md4::new();
        manual.update(7i32.to_le_bytes());
        manual.update(b"payload");
        let digest_b: [u8; 16] = manual.finalize().into();

        assert_eq!(digest_a, digest_b);
    }

    #[test]
    fn whole_file_hasher_accumulates_across_updates() {
        let mut streamed = WholeFileHasher::new(3);
        streamed.update(b"hello ");
        streamed.update(b"world");
        let streamed_digest = streamed.finalize();

        let mut one_shot = WholeFileHasher::new(3);
        one_shot.update(b"hello world");
        assert_eq!(streamed_digest, one_shot.finalize());
    }
}
