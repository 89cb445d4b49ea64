//! The filesystem sink collaborator interface (spec.md §6).
//!
//! This core treats the actual filesystem as an external collaborator:
//! listing, reading, writing, and deleting files are all implemented by
//! whatever embeds this crate. The trait here is the seam.

use std::io::{self, Read, Seek, Write};

use flist::{FileEntry, SenderEntry};

/// A readable, seekable local file handle, as returned by
/// [`FilesystemSink::read`]. Block-reference resolution during
/// reconstruction needs random access, and the sender's signature
/// search needs to read its source more than once.
pub trait SeekRead: Read + Seek {}
impl<T: Read + Seek> SeekRead for T {}

/// Metadata the generator and sender need about a local file, without
/// committing to any particular `std::fs::Metadata`-shaped type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalMetadata {
    /// File length in bytes.
    pub length: u64,
    /// Modification time, seconds since the epoch.
    pub mtime: i64,
}

/// Failure reported by a sink operation. Per spec.md §7 this is
/// non-fatal for the session as a whole; the caller logs it and leaves
/// the affected file incomplete.
#[derive(Debug, thiserror::Error)]
#[error("filesystem sink error: {0}")]
pub struct SinkError(#[from] pub io::Error);

/// The abstract backing store both the receiver and sender roles
/// operate against.
///
/// # Upstream Reference
///
/// Mirrors spec.md §6's "Filesystem sink" interface directly; method
/// names match the spec's operation names in lowercase.
pub trait FilesystemSink {
    /// Opens a destination for `entry` and returns a writer the caller
    /// streams reconstructed bytes into; the sink persists them as they
    /// arrive and finalizes on drop/close.
    fn put(&mut self, entry: &FileEntry) -> Result<Box<dyn Write + Send>, SinkError>;

    /// Opens `path` for reading, returning its local metadata and a
    /// seekable reader. Used by the generator to compute local
    /// signatures and by the receiver to resolve block references.
    fn read(&mut self, path: &[u8]) -> Result<(LocalMetadata, Box<dyn SeekRead + Send>), SinkError>;

    /// Policy hook: true if `entry` should be skipped regardless of the
    /// built-in size/mtime quick check (e.g. an exclude filter).
    fn skip(&mut self, entry: &FileEntry) -> bool;

    /// Removes the named entries; called when delete mode is enabled
    /// and no I/O errors were reported for the session.
    fn remove(&mut self, entries: &[FileEntry]) -> Result<(), SinkError>;

    /// Enumerates the sender-side source entries under `path`.
    fn list(&mut self, path: &[u8]) -> Result<Vec<SenderEntry>, SinkError>;
}
