//! File-entry data model: the receiver's view and the sender's view.
//!
//! # Upstream Reference
//!
//! `rsync.h`'s `struct file_struct`, trimmed to the fields spec.md §3
//! calls out for the receiver view, plus the sender-side `WPath`/`flist`
//! sort key used for index correspondence (`flist.c:flist_sort_and_clean`).

/// POSIX file-type mask within `mode`.
pub const S_IFMT: u32 = 0o170_000;
/// Regular file type bits.
pub const S_IFREG: u32 = 0o100_000;
/// Symbolic link type bits.
pub const S_IFLNK: u32 = 0o120_000;
/// Character device type bits.
pub const S_IFCHR: u32 = 0o020_000;
/// Block device type bits.
pub const S_IFBLK: u32 = 0o060_000;
/// Named pipe (FIFO) type bits.
pub const S_IFIFO: u32 = 0o010_000;
/// Unix domain socket type bits.
pub const S_IFSOCK: u32 = 0o140_000;
/// Directory type bits.
pub const S_IFDIR: u32 = 0o040_000;

/// Returns the bits of `mode` identifying the file type.
#[must_use]
pub const fn file_type(mode: u32) -> u32 {
    mode & S_IFMT
}

/// True if `mode` names a regular file.
#[must_use]
pub const fn is_regular(mode: u32) -> bool {
    file_type(mode) == S_IFREG
}

/// True if `mode` names a symbolic link.
#[must_use]
pub const fn is_symlink(mode: u32) -> bool {
    file_type(mode) == S_IFLNK
}

/// True if `mode` names a directory.
#[must_use]
pub const fn is_directory(mode: u32) -> bool {
    file_type(mode) == S_IFDIR
}

/// True if `mode` names a device or special file (block, character,
/// FIFO, or socket) — the set for which `rdev` is meaningful.
#[must_use]
pub const fn is_device_or_special(mode: u32) -> bool {
    matches!(file_type(mode), S_IFCHR | S_IFBLK | S_IFIFO | S_IFSOCK)
}

/// A decoded file-list entry as seen by the receiver role.
///
/// Names are always cleaned, relative paths with no leading slash (see
/// [`crate::path::clean_name`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Cleaned, relative path.
    pub name: Vec<u8>,
    /// File length in bytes.
    pub length: u64,
    /// Modification time, seconds since the epoch (may overflow 2038 on
    /// the wire; stored here as a plain `i64` to absorb that).
    pub mtime: i64,
    /// Combined POSIX type and permission bits.
    pub mode: u32,
    /// Owning user id, present when uid preservation is negotiated.
    pub uid: Option<u32>,
    /// Owning group id, present when gid preservation is negotiated.
    pub gid: Option<u32>,
    /// Device major/minor, present for device and special files when
    /// device preservation is negotiated.
    pub rdev: Option<u32>,
    /// Symlink target, present when `mode` is a symlink and link
    /// preservation is negotiated.
    pub symlink_target: Option<Vec<u8>>,
    /// Whole-file checksum transmitted with the entry, present only
    /// under the always-checksum policy.
    pub checksum: Option<[u8; 16]>,
    /// Whether this entry is the root of the transfer.
    pub top_dir: bool,
}

impl FileEntry {
    /// True if this entry should be deltafied; non-regular entries are
    /// transferred as metadata only (spec.md §4.F step 3).
    #[must_use]
    pub const fn is_regular_file(&self) -> bool {
        is_regular(self.mode)
    }
}

/// The sender-side view of a file-list entry: an abstract filesystem
/// path plus the wire sort key used to establish index correspondence
/// with the receiver's independently-sorted list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderEntry {
    /// Filesystem path the sender will open to read file contents.
    pub path: Vec<u8>,
    /// Sort/transmission key; byte-wise lexicographic order over this
    /// field must agree between sender and receiver (spec.md §3
    /// invariant, Property P7).
    pub wpath: WPath,
    /// The metadata that will be encoded on the wire for this entry.
    pub entry: FileEntry,
}

/// A wire sort key: effectively the cleaned name, wrapped so the sort
/// comparator is explicit and can't silently drift from the name used
/// for encoding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct WPath(pub Vec<u8>);

impl WPath {
    /// Builds a sort key from a cleaned name.
    #[must_use]
    pub fn new(name: &[u8]) -> Self {
        Self(name.to_vec())
    }
}

/// Sorts file entries by [`WPath`] byte-wise lexicographic order, the
/// order both peers must independently reach (spec.md §3, Property P7).
pub fn sort_by_wpath(entries: &mut [SenderEntry]) {
    entries.sort_by(|a, b| a.wpath.cmp(&b.wpath));
}
