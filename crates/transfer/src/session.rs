//! Session orchestrator: negotiates the connection, exchanges the file
//! list, and drives either the receiver role (generator + receiver) or
//! the sender role to completion.
//!
//! # Upstream Reference
//!
//! `main.c:client_run`, summarized in spec.md §4.I. The documented
//! state machine (`INIT -> NEGOTIATED -> SEEDED -> MUXED -> FILELIST ->
//! PHASE0 <-> PHASE1 -> STATS -> GOODBYE`) is not reified as an enum
//! here; each step below either succeeds and the session moves on, or
//! fails and the whole session aborts, which is the same thing an
//! explicit state machine would enforce.

use std::io::{Read, Write};
use std::sync::Mutex;

use flist::{
    decode_file_list, encode_file_list, read_id_list, write_id_list, CodecOptions, FileEntry,
    IdEntry, SenderEntry,
};
use protocol::codec::{read_i32, write_i32};
use protocol::multiplex::{Demultiplexer, MultiplexWriter, NullSink};
use protocol::negotiation::{negotiate_version, negotiate_version_as_server};

use crate::error::SessionResult;
use crate::generator::{run_generator, GeneratorOptions};
use crate::receiver::run_receiver;
use crate::sender::run_sender;
use crate::sink::{FilesystemSink, LocalMetadata, SeekRead, SinkError};
use crate::stats::{read_stats, write_stats, Stats};

/// Resolves numeric ids to and from the local name database. An
/// external collaborator per spec.md §1; the core only carries ids and
/// names across the wire.
pub trait LocalIdResolver {
    /// Looks up the name a local uid/gid resolves to, for the sender
    /// role's outgoing id map.
    fn name_for(&mut self, id: u32) -> Option<Vec<u8>>;
    /// Maps a peer-reported name back to a local id, for the receiver
    /// role's incoming id map. Unresolved names are dropped silently;
    /// the corresponding files simply keep their sink-assigned owner.
    fn id_for(&mut self, name: &[u8]) -> Option<u32>;
}

/// A [`LocalIdResolver`] that never resolves anything, for sessions
/// that don't preserve uid/gid.
#[derive(Debug, Default)]
pub struct NullIdResolver;

impl LocalIdResolver for NullIdResolver {
    fn name_for(&mut self, _id: u32) -> Option<Vec<u8>> {
        None
    }
    fn id_for(&mut self, _name: &[u8]) -> Option<u32> {
        None
    }
}

/// Policy inputs for a session, independent of which role is run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    /// Generator skip policy (receiver role only).
    pub generator: GeneratorOptions,
    /// Which optional file-list fields are exchanged.
    pub codec: CodecOptions,
    /// Delete mode: read/write the exclusion/filter-rule list before
    /// the file list. The core never evaluates the rules it reads.
    pub delete: bool,
}

/// Outcome of a completed session.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionState {
    /// Protocol version both sides agreed to use.
    pub version: i32,
    /// Session checksum seed used for every MD4 in this session.
    pub seed: i32,
    /// IO-error flag reported by the sender after the id maps. Not
    /// interpreted further by this core; see spec.md §10.
    pub peer_io_errors: i32,
    /// Final statistics frame.
    pub stats: Stats,
}

/// Joins a separate reader and writer into one `Read + Write` value, for
/// the single combined-stream calls the protocol layer expects (just
/// the version handshake, here).
struct Duplex<'a, R, W> {
    reader: &'a mut R,
    writer: &'a mut W,
}

impl<R: Read, W> Read for Duplex<'_, R, W> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<R, W: Write> Write for Duplex<'_, R, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

fn read_filter_rules<R: Read>(reader: &mut R) -> SessionResult<Vec<Vec<u8>>> {
    let mut rules = Vec::new();
    loop {
        let len = read_i32(reader)?;
        if len <= 0 {
            break;
        }
        rules.push(protocol::codec::read_bytes(reader, len as usize)?);
    }
    Ok(rules)
}

fn write_filter_rules<W: Write>(writer: &mut W, rules: &[Vec<u8>]) -> SessionResult<()> {
    for rule in rules {
        write_i32(writer, rule.len() as i32)?;
        writer.write_all(rule).map_err(protocol::WireError::from)?;
    }
    write_i32(writer, 0)?;
    Ok(())
}

fn collect_id_map(
    ids: impl Iterator<Item = u32>,
    resolver: &mut dyn LocalIdResolver,
) -> Vec<IdEntry> {
    let mut seen = std::collections::HashSet::new();
    let mut entries = Vec::new();
    for id in ids {
        if id != 0 && seen.insert(id) {
            if let Some(name) = resolver.name_for(id) {
                entries.push(IdEntry { id, name });
            }
        }
    }
    entries
}

/// Adapts a `Mutex`-guarded sink so both the generator and receiver
/// tasks can hold their own handle to it (spec.md §6 external
/// collaborator, shared across the two concurrent tasks per §5's
/// resource model — the wire connection is split between the tasks,
/// but the filesystem is not).
struct SharedSink<'a, 'b> {
    inner: &'a Mutex<&'b mut (dyn FilesystemSink + Send)>,
}

impl FilesystemSink for SharedSink<'_, '_> {
    fn put(&mut self, entry: &FileEntry) -> Result<Box<dyn Write + Send>, SinkError> {
        self.inner.lock().unwrap().put(entry)
    }

    fn read(&mut self, path: &[u8]) -> Result<(LocalMetadata, Box<dyn SeekRead + Send>), SinkError> {
        self.inner.lock().unwrap().read(path)
    }

    fn skip(&mut self, entry: &FileEntry) -> bool {
        self.inner.lock().unwrap().skip(entry)
    }

    fn remove(&mut self, entries: &[FileEntry]) -> Result<(), SinkError> {
        self.inner.lock().unwrap().remove(entries)
    }

    fn list(&mut self, path: &[u8]) -> Result<Vec<SenderEntry>, SinkError> {
        self.inner.lock().unwrap().list(path)
    }
}

/// Which of the two concurrent receiver-role tasks finished first, used
/// to attribute the first observed error when one cancels the other.
#[derive(Debug, Clone, Copy)]
enum Role {
    Generator,
    Receiver,
}

/// Runs a complete session in the receiver role: negotiates, drives the
/// seed exchange, exchanges the file list and id maps, then runs the
/// generator and receiver concurrently (spec.md §5) before exchanging
/// the closing statistics and goodbye tokens.
///
/// `cancel` is invoked at most once, from the calling thread, if either
/// the generator or the receiver fails before the other has finished;
/// it must make the other task's blocked read return promptly (for a
/// real connection, shutting down the read half of the peer socket), so
/// the group can report the first error instead of hanging. Callers
/// whose reader never blocks indefinitely (an in-memory buffer in a
/// test, say) may pass a no-op.
#[allow(clippy::too_many_arguments)]
pub fn run_receiver_session<R: Read + Send, W: Write + Send>(
    reader: &mut R,
    writer: &mut W,
    seed: i32,
    sink: &mut (dyn FilesystemSink + Send),
    resolver: &mut dyn LocalIdResolver,
    options: SessionOptions,
    cancel: &dyn Fn(),
) -> SessionResult<(SessionState, Vec<FileEntry>)> {
    let version = {
        let mut duplex = Duplex {
            reader: &mut *reader,
            writer: &mut *writer,
        };
        negotiate_version(&mut duplex)?
    };

    write_i32(writer, seed)?;

    if options.delete {
        write_filter_rules(writer, &[])?;
    }

    let entries = decode_file_list(reader, options.codec)?;

    let uid_map = read_id_list(reader)?;
    let gid_map = read_id_list(reader)?;
    apply_id_map(&uid_map, resolver);
    apply_id_map(&gid_map, resolver);
    let peer_io_errors = read_i32(reader)?;

    let sink_mutex = Mutex::new(sink);

    // Everything from here on arrives through the sender's multiplex
    // writer (spec.md §4.I step 4): the generator/receiver exchange,
    // then the closing statistics and goodbye token all ride the same
    // demultiplexed stream, so `demux` stays in scope for the rest of
    // the session rather than being dropped after the exchange.
    let mut demux = Demultiplexer::new(&mut *reader, NullSink);
    let entries_ref = &entries;
    let sink_mutex_ref = &sink_mutex;

    let (generator_result, receiver_result, mut demux, cancelled_role) =
        std::thread::scope(move |scope| {
            let mut gen_sink = SharedSink { inner: sink_mutex_ref };
            let gen_entries = entries_ref;
            let (done_tx, done_rx) = std::sync::mpsc::channel::<(Role, bool)>();

            let gen_done = done_tx.clone();
            let gen_handle = scope.spawn(move || {
                let result =
                    run_generator(writer, gen_entries, &mut gen_sink, seed, options.generator, None);
                let _ = gen_done.send((Role::Generator, result.is_ok()));
                result
            });

            let mut recv_sink = SharedSink { inner: sink_mutex_ref };
            let recv_entries = entries_ref;
            let recv_handle = scope.spawn(move || {
                let result = run_receiver(&mut demux, recv_entries, &mut recv_sink, seed);
                let _ = done_tx.send((Role::Receiver, result.is_ok()));
                (result, demux)
            });

            // The loser, if any, is stuck waiting on its counterpart's
            // half of the protocol; `cancel` has to make that read
            // return so the second `recv` below cannot hang forever.
            let (first_role, first_ok) = done_rx
                .recv()
                .expect("a role reports completion before its sender is dropped");
            if !first_ok {
                cancel();
            }
            let _ = done_rx.recv();

            let generator_result = gen_handle.join().expect("generator thread panicked");
            let (receiver_result, demux) = recv_handle.join().expect("receiver thread panicked");
            let cancelled_role = if first_ok { None } else { Some(first_role) };
            (generator_result, receiver_result, demux, cancelled_role)
        });

    if let Some(role) = cancelled_role {
        let first_error = match role {
            Role::Generator => generator_result.unwrap_err(),
            Role::Receiver => receiver_result.unwrap_err(),
        };
        return Err(crate::error::SessionError::Cancelled(first_error.to_string()));
    }

    generator_result?;
    receiver_result?;

    let stats = read_stats(&mut demux)?;
    let goodbye = read_i32(&mut demux)?;
    if goodbye != -1 {
        return Err(crate::error::SessionError::protocol_violation(format!(
            "expected goodbye token -1, got {goodbye}"
        )));
    }

    Ok((
        SessionState {
            version,
            seed,
            peer_io_errors,
            stats,
        },
        entries,
    ))
}

fn apply_id_map(map: &[IdEntry], resolver: &mut dyn LocalIdResolver) {
    for entry in map {
        let _ = resolver.id_for(&entry.name);
    }
}

/// Runs a complete session in the sender role: negotiates, reads the
/// seed and optional filter rules, sends the file list and id maps,
/// then answers signature requests until both phase markers have been
/// seen, and finally reports statistics.
pub fn run_sender_session<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    source_entries: &[SenderEntry],
    sink: &mut dyn FilesystemSink,
    resolver: &mut dyn LocalIdResolver,
    options: SessionOptions,
) -> SessionResult<SessionState> {
    let version = {
        let mut duplex = Duplex {
            reader: &mut *reader,
            writer: &mut *writer,
        };
        negotiate_version_as_server(&mut duplex)?
    };

    let seed = read_i32(reader)?;

    if options.delete {
        let _ = read_filter_rules(reader)?;
    }

    let file_entries: Vec<FileEntry> = source_entries.iter().map(|s| s.entry.clone()).collect();
    encode_file_list(writer, options.codec, &file_entries)?;

    let uids = collect_id_map(file_entries.iter().filter_map(|e| e.uid), resolver);
    let gids = collect_id_map(file_entries.iter().filter_map(|e| e.gid), resolver);
    write_id_list(writer, &uids)?;
    write_id_list(writer, &gids)?;
    write_i32(writer, 0)?;

    let mut mux = MultiplexWriter::new(writer);
    run_sender(reader, &mut mux, source_entries, sink, seed)?;

    let stats = Stats {
        total_size: file_entries.iter().map(|e| e.length).sum(),
        ..Stats::default()
    };
    write_stats(&mut mux, stats)?;
    write_i32(&mut mux, -1)?;
    mux.flush().map_err(protocol::WireError::from)?;

    Ok(SessionState {
        version,
        seed,
        peer_io_errors: 0,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flist::WPath;
    use std::collections::HashMap;
    use std::io::Cursor;

    struct MemSink {
        files: HashMap<Vec<u8>, Vec<u8>>,
    }

    struct RecordingWriter {
        name: Vec<u8>,
        buf: Vec<u8>,
    }

    impl Write for RecordingWriter {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.buf.extend_from_slice(data);
            Ok(data.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl FilesystemSink for MemSink {
        fn put(&mut self, entry: &FileEntry) -> Result<Box<dyn Write + Send>, SinkError> {
            Ok(Box::new(RecordingWriter {
                name: entry.name.clone(),
                buf: Vec::new(),
            }))
        }

        fn read(
            &mut self,
            path: &[u8],
        ) -> Result<(LocalMetadata, Box<dyn SeekRead + Send>), SinkError> {
            match self.files.get(path) {
                Some(data) => Ok((
                    LocalMetadata {
                        length: data.len() as u64,
                        mtime: 0,
                    },
                    Box::new(Cursor::new(data.clone())),
                )),
                None => Err(SinkError(std::io::Error::other("missing"))),
            }
        }

        fn skip(&mut self, _entry: &FileEntry) -> bool {
            false
        }

        fn remove(&mut self, _entries: &[FileEntry]) -> Result<(), SinkError> {
            Ok(())
        }

        fn list(&mut self, _path: &[u8]) -> Result<Vec<SenderEntry>, SinkError> {
            Ok(self
                .files
                .keys()
                .map(|path| SenderEntry {
                    path: path.clone(),
                    wpath: WPath::new(path),
                    entry: FileEntry {
                        name: path.clone(),
                        length: self.files[path].len() as u64,
                        mtime: 0,
                        mode: 0o100_644,
                        uid: None,
                        gid: None,
                        rdev: None,
                        symlink_target: None,
                        checksum: None,
                        top_dir: false,
                    },
                })
                .collect())
        }
    }

    #[test]
    fn mismatched_goodbye_token_is_a_protocol_violation() {
        let entries: Vec<FileEntry> = Vec::new();
        let mut wire = Vec::new();
        write_i32(&mut wire, 27).unwrap(); // peer version
        flist::encode_file_list(&mut wire, CodecOptions::default(), &entries).unwrap();
        write_id_list(&mut wire, &[]).unwrap();
        write_id_list(&mut wire, &[]).unwrap();
        write_i32(&mut wire, 0).unwrap(); // peer io errors

        // Everything from here on is what a real sender would write
        // through its multiplex writer, so it must arrive the same way.
        let mut muxed = MultiplexWriter::new(Vec::new());
        write_i32(&mut muxed, -1).unwrap(); // generator phase0 end
        write_i32(&mut muxed, -1).unwrap(); // generator phase1 end
        write_stats(&mut muxed, Stats::default()).unwrap();
        write_i32(&mut muxed, 7).unwrap(); // wrong goodbye token
        wire.extend_from_slice(&muxed.into_inner().unwrap());

        let mut reader = Cursor::new(wire);
        let mut writer = Vec::new();
        let mut sink = MemSink {
            files: HashMap::new(),
        };
        let mut resolver = NullIdResolver;
        let err = run_receiver_session(
            &mut reader,
            &mut writer,
            42,
            &mut sink,
            &mut resolver,
            SessionOptions::default(),
            &|| {},
        )
        .unwrap_err();
        assert!(matches!(err, crate::error::SessionError::ProtocolViolation(_)));
    }
}
