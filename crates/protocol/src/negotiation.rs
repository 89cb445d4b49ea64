//! Protocol-version handshake.
//!
//! # Upstream Reference
//!
//! Mirrors the exchange at the top of `rsync/main.c:client_run` as
//! reflected in `original_source/rsyncreceiver/rsync.go`'s `ClientRun`:
//! the side negotiating reads the peer's 4-byte protocol number first,
//! then writes its own. This core targets the pre-protocol-28 v27
//! family exclusively.
//!
//! The Go reference only ever plays one side of this exchange (the
//! other end is a real upstream rsync binary that writes its greeting
//! unprompted, the way `am_server` does in `compat.c`). Since this core
//! implements both ends of the same connection, the two sides can't
//! both read first without deadlocking; [`negotiate_version`] is the
//! read-first half used by the receiver role, and
//! [`negotiate_version_as_server`] is the write-first half used by the
//! sender role.

use std::io::{Read, Write};

use crate::codec::{read_i32, write_i32};
use crate::error::WireResult;

/// Highest protocol version this core speaks.
pub const PROTOCOL_VERSION: i32 = 27;

/// Performs the version handshake, reading the peer's advertised version
/// and writing ours in reply.
///
/// Returns the version to use for the rest of the session: the lower of
/// the two advertised versions, matching rsync's "negotiate down"
/// convention.
pub fn negotiate_version<S: Read + Write>(stream: &mut S) -> WireResult<i32> {
    let peer_version = read_i32(stream)?;
    write_i32(stream, PROTOCOL_VERSION)?;
    Ok(peer_version.min(PROTOCOL_VERSION))
}

/// The write-first half of [`negotiate_version`]: writes our version
/// unprompted, then reads the peer's reply. Used by whichever side
/// would otherwise deadlock waiting on a peer that is also reading
/// first.
pub fn negotiate_version_as_server<S: Read + Write>(stream: &mut S) -> WireResult<i32> {
    write_i32(stream, PROTOCOL_VERSION)?;
    let peer_version = read_i32(stream)?;
    Ok(peer_version.min(PROTOCOL_VERSION))
}
