#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # Overview
//!
//! `matching` is the sender's half of delta compression: given a
//! remote's block signatures it builds a dense tag index
//! ([`tag_table`]) and scans a local byte slice with a rolling
//! checksum to decide which spans can be sent as block references and
//! which must be sent as literal bytes ([`search`]).
//!
//! Wire I/O, token chunking, and file-handle ownership belong to
//! `transfer::sender`; this crate only knows about bytes and indices.

pub mod search;
pub mod tag_table;

pub use search::{scan, Match};
pub use tag_table::TagTable;
