//! The trailing statistics frame (spec.md §4.I step 8, §6).

use std::io::{Read, Write};

use protocol::codec::{read_i64, write_i64};
use protocol::WireResult;

/// Byte totals exchanged from sender to receiver at the end of a
/// session: total bytes read from the wire, total bytes written to the
/// wire, and the sum of all transferred files' lengths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Total bytes the sender read from its connection.
    pub total_read: u64,
    /// Total bytes the sender wrote to its connection.
    pub total_written: u64,
    /// Sum of the lengths of every file the sender processed.
    pub total_size: u64,
}

/// Writes the statistics frame as three little-endian `int64` fields.
pub fn write_stats<W: Write>(writer: &mut W, stats: Stats) -> WireResult<()> {
    write_i64(writer, stats.total_read as i64)?;
    write_i64(writer, stats.total_written as i64)?;
    write_i64(writer, stats.total_size as i64)?;
    Ok(())
}

/// Reads a statistics frame written by [`write_stats`].
pub fn read_stats<R: Read>(reader: &mut R) -> WireResult<Stats> {
    Ok(Stats {
        total_read: read_i64(reader)?.max(0) as u64,
        total_written: read_i64(reader)?.max(0) as u64,
        total_size: read_i64(reader)?.max(0) as u64,
    })
}
