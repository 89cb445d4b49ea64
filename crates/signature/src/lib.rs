#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # Overview
//!
//! `signature` turns a file's length into a block plan ([`block_size`])
//! and turns a block plan plus a readable file into the on-wire
//! signature stream consumed by the sender's matching search
//! ([`wire`]). It sits directly on top of `checksums` and `protocol` and
//! knows nothing about the file list or the session state machine.

pub mod block_size;
pub mod error;
pub mod wire;

pub use block_size::{SumHead, MAX_BLOCK_LENGTH, MIN_BLOCK_LENGTH};
pub use error::{SignatureError, SignatureResult};
pub use wire::{
    read_signature_stream, read_sum_head, write_signature_stream, write_sum_head, SumBuf,
};
