//! Sender-role loop: answers block-signature requests with
//! literal/reference token streams.
//!
//! # Upstream Reference
//!
//! `sender.c:send_files`, summarized in spec.md §4.H. Mirrors each
//! request's file index back onto the response stream before that
//! file's tokens, and forwards the generator's `-1` phase markers, so
//! the concurrent receiver task (spec.md §4.G) can read its own
//! response stream without needing to share state with the generator
//! directly (see `SPEC_FULL.md` §11 for why this core treats the index
//! echo as required rather than optional).

use std::io::{Read, Write};

use checksums::WholeFileHasher;
use flist::SenderEntry;
use matching::TagTable;
use protocol::codec::{read_i32, write_i32};
use signature::read_signature_stream;

use crate::error::{SessionError, SessionResult};
use crate::sink::FilesystemSink;

/// Chunk size used to split long literal runs into wire tokens,
/// matching the multiplex framer's default buffer size.
pub const LITERAL_CHUNK_LEN: usize = 32 * 1024;

/// Runs the sender's main loop: reads requests from `reader`, writes
/// token streams to `writer`.
pub fn run_sender<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    entries: &[SenderEntry],
    sink: &mut dyn FilesystemSink,
    seed: i32,
) -> SessionResult<()> {
    let mut phase = 0u8;
    loop {
        let idx = read_i32(reader)?;
        if idx == -1 {
            write_i32(writer, -1)?;
            if phase == 0 {
                phase = 1;
                continue;
            }
            break;
        }

        let (head, sums) = read_signature_stream(reader)?;
        write_i32(writer, idx)?;

        let entry = entries.get(idx as usize).ok_or_else(|| {
            SessionError::protocol_violation(format!("requested file index {idx} out of range"))
        })?;

        match sink.read(&entry.path) {
            Err(err) => {
                // Logged and swallowed at this protocol version
                // (spec.md §4.H, §7): the request is dropped, no tokens
                // are emitted for this file, and the session continues.
                let open_failed = SessionError::OpenFailed {
                    name: String::from_utf8_lossy(&entry.path).into_owned(),
                    source: err.0,
                };
                #[cfg(feature = "tracing")]
                tracing::debug!(error = %open_failed, "source open failed, skipping");
                #[cfg(not(feature = "tracing"))]
                let _ = open_failed;
            }
            Ok((_meta, mut source)) => {
                if head.checksum_count == 0 {
                    stream_whole_file(writer, source.as_mut(), seed)?;
                } else {
                    let mut data = Vec::new();
                    source
                        .read_to_end(&mut data)
                        .map_err(|err| SessionError::Wire(protocol::WireError::from(err)))?;
                    let table = TagTable::build(&sums);
                    let matches = matching::scan(
                        &data,
                        &sums,
                        &table,
                        head.block_length,
                        seed,
                        head.checksum_length as usize,
                    );
                    emit_matches(writer, &data, &matches)?;
                    write_i32(writer, 0)?;
                    let mut hasher = WholeFileHasher::new(seed);
                    hasher.update(&data);
                    let digest = hasher.finalize();
                    writer
                        .write_all(&digest[..head.checksum_length as usize])
                        .map_err(protocol::WireError::from)?;
                }
            }
        }
    }
    Ok(())
}

fn stream_whole_file<W: Write>(
    writer: &mut W,
    source: &mut (impl Read + ?Sized),
    seed: i32,
) -> SessionResult<()> {
    let mut hasher = WholeFileHasher::new(seed);
    let mut buf = vec![0u8; LITERAL_CHUNK_LEN];
    loop {
        let n = source
            .read(&mut buf)
            .map_err(|err| SessionError::Wire(protocol::WireError::from(err)))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        write_i32(writer, n as i32)?;
        writer.write_all(&buf[..n]).map_err(protocol::WireError::from)?;
    }
    write_i32(writer, 0)?;
    let digest = hasher.finalize();
    writer.write_all(&digest).map_err(protocol::WireError::from)?;
    Ok(())
}

fn emit_matches<W: Write>(
    writer: &mut W,
    data: &[u8],
    matches: &[matching::Match],
) -> SessionResult<()> {
    for m in matches {
        match m {
            matching::Match::Literal(range) => {
                for chunk in data[range.clone()].chunks(LITERAL_CHUNK_LEN) {
                    write_i32(writer, chunk.len() as i32)?;
                    writer.write_all(chunk).map_err(protocol::WireError::from)?;
                }
            }
            matching::Match::Reference { index, .. } => {
                write_i32(writer, -((*index as i32) + 1))?;
            }
        }
    }
    Ok(())
}
