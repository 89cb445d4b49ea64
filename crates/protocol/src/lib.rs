#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # Overview
//!
//! `protocol` provides the wire-level plumbing shared by every other
//! crate in this workspace: byte-ordered primitives and counting stream
//! wrappers ([`codec`]), the out-of-band multiplexed error/info channel
//! ([`multiplex`]), and the protocol-version handshake ([`negotiation`]).
//!
//! Nothing in this crate understands file lists, checksums, or tokens —
//! those live in `flist`, `checksums`/`signature`, and `transfer`
//! respectively. Keeping the wire layer separate means every higher
//! layer can be tested against an in-memory byte buffer without pulling
//! in socket or filesystem dependencies.
//!
//! # Errors
//!
//! All fallible operations return [`error::WireError`], which
//! distinguishes a short read (`WireEof`) from any other I/O failure
//! (`WireIo`) as required by the core error-handling design.

pub mod codec;
pub mod error;
pub mod multiplex;
pub mod negotiation;

pub use error::{WireError, WireResult};
