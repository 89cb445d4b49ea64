#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # Overview
//!
//! `checksums` provides the two checksum primitives the delta algorithm
//! is built on:
//!
//! - [`rolling`] — the Adler-like weak checksum (`sum1`) used for O(1)
//!   sliding-window block matching, plus its derived 16-bit tag.
//! - [`strong`] — MD4 keyed with the per-session seed, used both as the
//!   truncated per-block strong checksum and as the whole-file integrity
//!   check.
//!
//! Block-size planning and the on-wire signature header live one layer
//! up, in the `signature` crate, since they are a policy on top of these
//! primitives rather than a checksum algorithm themselves.

pub mod rolling;
pub mod strong;

pub use rolling::{tag, RollingChecksum};
pub use strong::{block_strong_sum, WholeFileHasher, DEFAULT_CHECKSUM_LEN};
