//! Receiver-side generator: walks the file list and requests block
//! signatures for the entries that need a delta.
//!
//! # Upstream Reference
//!
//! `generator.c:generate_files`, summarized in spec.md §4.F.

use std::io::Write;

use flist::FileEntry;
use protocol::codec::write_i32;

use crate::error::{SessionError, SessionResult};
use crate::sink::FilesystemSink;

/// Skip-decision policy, external to the core's own size/mtime quick
/// check (spec.md §4.F step 5).
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneratorOptions {
    /// Entries are only listed, never requested (no wire traffic).
    pub list_only: bool,
    /// Never skip; always request a full signature exchange.
    pub always_checksum: bool,
    /// Skip whenever the local size matches, ignoring mtime.
    pub size_only: bool,
    /// Drop mtime from the quick check; equivalent to `size_only` for
    /// this core's skip decision (see `DESIGN.md`).
    pub ignore_times: bool,
}

fn should_skip(local: crate::sink::LocalMetadata, entry: &FileEntry, options: GeneratorOptions) -> bool {
    if options.always_checksum {
        return false;
    }
    if options.size_only || options.ignore_times {
        return local.length == entry.length;
    }
    local.length == entry.length && local.mtime == entry.mtime
}

/// Runs the generator over `entries` (already sorted and index-aligned
/// with the receiver's view), writing requests to `writer`.
///
/// `listing` receives one line per entry when `options.list_only` is
/// set; `None` silently discards listing output (list-only mode with no
/// interest in the names, e.g. under test).
pub fn run_generator<W: Write>(
    writer: &mut W,
    entries: &[FileEntry],
    sink: &mut dyn FilesystemSink,
    seed: i32,
    options: GeneratorOptions,
    mut listing: Option<&mut dyn Write>,
) -> SessionResult<()> {
    for (index, entry) in entries.iter().enumerate() {
        if options.list_only {
            if let Some(out) = listing.as_deref_mut() {
                let _ = writeln!(out, "{}", String::from_utf8_lossy(&entry.name));
            }
            continue;
        }
        if sink.skip(entry) {
            continue;
        }
        if !entry.is_regular_file() {
            continue;
        }

        match sink.read(&entry.name) {
            Err(err) => {
                // No local copy to diff against: logged and swallowed
                // (spec.md §4.H, §7), then the request falls back to a
                // zero-block header so the sender streams the whole file.
                let open_failed = SessionError::OpenFailed {
                    name: String::from_utf8_lossy(&entry.name).into_owned(),
                    source: err.0,
                };
                #[cfg(feature = "tracing")]
                tracing::debug!(error = %open_failed, "local open failed, requesting whole file");
                #[cfg(not(feature = "tracing"))]
                let _ = open_failed;

                write_i32(writer, index as i32)?;
                let zero_head = signature::SumHead {
                    checksum_count: 0,
                    block_length: 0,
                    checksum_length: checksums::DEFAULT_CHECKSUM_LEN as u32,
                    remainder_length: 0,
                };
                signature::write_sum_head(writer, &zero_head)?;
            }
            Ok((local, mut reader)) => {
                if should_skip(local, entry, options) {
                    continue;
                }
                write_i32(writer, index as i32)?;
                let head = signature::SumHead::plan(
                    local.length,
                    checksums::DEFAULT_CHECKSUM_LEN as u32,
                );
                signature::write_signature_stream(writer, &head, reader.as_mut(), seed)?;
            }
        }
    }

    write_i32(writer, -1)?;
    write_i32(writer, -1)?;
    Ok(())
}
