//! Wire encoding for the sum header and per-block signature stream.
//!
//! # Upstream Reference
//!
//! `rsync.h`'s `struct sum_struct`/`struct sum_buf` and the read/write
//! pair in `generator.c:generate_and_send_sums` /
//! `sender.c:receive_sums`, as reflected in
//! `original_source/rsyncreceiver/generator.go` and
//! `original_source/rsyncsender/sender.go`.

use std::io::{Read, Write};

use checksums::{block_strong_sum, RollingChecksum};
use protocol::codec::{read_bytes, read_i32, write_i32};

use crate::block_size::SumHead;
use crate::error::SignatureResult;

/// A single block's signature: its index, file offset, rolling sum, and
/// (possibly truncated) strong sum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SumBuf {
    /// Position of this block within the file's block sequence.
    pub index: u32,
    /// Byte offset of this block within the file.
    pub offset: u64,
    /// Length of this block in bytes.
    pub len: u32,
    /// Rolling ("short") checksum.
    pub sum1: u32,
    /// Strong checksum, truncated to the header's `checksum_length`.
    pub sum2: Vec<u8>,
}

/// Writes a [`SumHead`] as four little-endian `int32` fields.
pub fn write_sum_head<W: Write>(writer: &mut W, head: &SumHead) -> SignatureResult<()> {
    write_i32(writer, head.checksum_count as i32)?;
    write_i32(writer, head.block_length as i32)?;
    write_i32(writer, head.checksum_length as i32)?;
    write_i32(writer, head.remainder_length as i32)?;
    Ok(())
}

/// Reads a [`SumHead`] written by [`write_sum_head`].
pub fn read_sum_head<R: Read>(reader: &mut R) -> SignatureResult<SumHead> {
    let checksum_count = read_i32(reader)?.max(0) as u32;
    let block_length = read_i32(reader)?.max(0) as u32;
    let checksum_length = read_i32(reader)?.max(0) as u32;
    let remainder_length = read_i32(reader)?.max(0) as u32;
    Ok(SumHead {
        checksum_count,
        block_length,
        checksum_length,
        remainder_length,
    })
}

/// Computes and writes the full signature stream for a local file: the
/// sum header followed by `count` `(sum1, sum2)` pairs.
///
/// This is the wire half of spec.md §4.F step 6 ("emit the entry index,
/// then sum header... then for each block..."); the caller supplies the
/// already-written entry index and owns the local file handle.
pub fn write_signature_stream<W: Write, F: Read>(
    writer: &mut W,
    head: &SumHead,
    mut local_file: F,
    seed: i32,
) -> SignatureResult<()> {
    write_sum_head(writer, head)?;
    let mut buf = vec![0u8; head.block_length.max(1) as usize];
    for index in 0..head.checksum_count {
        let len = head.block_len_at(index) as usize;
        let block = &mut buf[..len];
        read_exact_block(&mut local_file, block)?;
        let sum1 = RollingChecksum::new(block).value();
        let sum2 = block_strong_sum(seed, block, head.checksum_length as usize);
        write_i32(writer, sum1 as i32)?;
        writer.write_all(&sum2).map_err(protocol::WireError::from)?;
    }
    Ok(())
}

/// Reads a full signature stream (header plus all block entries) as
/// written by [`write_signature_stream`].
pub fn read_signature_stream<R: Read>(reader: &mut R) -> SignatureResult<(SumHead, Vec<SumBuf>)> {
    let head = read_sum_head(reader)?;
    let mut sums = Vec::with_capacity(head.checksum_count as usize);
    let mut offset = 0u64;
    for index in 0..head.checksum_count {
        let sum1 = read_i32(reader)? as u32;
        let sum2 = read_bytes(reader, head.checksum_length as usize)?;
        let len = head.block_len_at(index);
        sums.push(SumBuf {
            index,
            offset,
            len,
            sum1,
            sum2,
        });
        offset += u64::from(len);
    }
    Ok((head, sums))
}

fn read_exact_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> SignatureResult<()> {
    reader.read_exact(buf).map_err(protocol::WireError::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn sum_head_round_trips() {
        let head = SumHead {
            checksum_count: 3,
            block_length: 712,
            checksum_length: 16,
            remainder_length: 9,
        };
        let mut buf = Vec::new();
        write_sum_head(&mut buf, &head).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_sum_head(&mut cursor).unwrap(), head);
    }

    #[test]
    fn signature_stream_round_trips() {
        let data = vec![0x42u8; 2048];
        let head = SumHead::plan(data.len() as u64, 16);
        let mut wire = Vec::new();
        write_signature_stream(&mut wire, &head, Cursor::new(data.clone()), 7).unwrap();

        let mut cursor = Cursor::new(wire);
        let (decoded_head, sums) = read_signature_stream(&mut cursor).unwrap();
        assert_eq!(decoded_head, head);
        assert_eq!(sums.len(), head.checksum_count as usize);
        for sum in &sums {
            let block = &data[sum.offset as usize..sum.offset as usize + sum.len as usize];
            assert_eq!(sum.sum1, RollingChecksum::new(block).value());
            assert_eq!(sum.sum2, block_strong_sum(7, block, 16));
        }
    }
}
