#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # Overview
//!
//! `flist` is the file-list half of the rsync peer core: the delta
//! entry codec ([`codec`]), the receiver/sender data model
//! ([`entry`]), the transmission flag bits ([`flags`]), path cleaning
//! ([`path`]), and the post-list uid/gid name maps ([`idmap`]).
//!
//! The IO-error flag that follows the id maps on the wire is a bare
//! 32-bit integer with no further structure, so it is read/written
//! directly with `protocol::codec` by the session orchestrator rather
//! than wrapped here.

pub mod codec;
pub mod entry;
pub mod error;
pub mod flags;
pub mod idmap;
pub mod path;

pub use codec::{decode_entry, decode_file_list, encode_entry, encode_file_list, CodecOptions};
pub use entry::{FileEntry, SenderEntry, WPath};
pub use error::{FlistError, FlistResult};
pub use idmap::{read_id_list, write_id_list, IdEntry};
pub use path::clean_name;
