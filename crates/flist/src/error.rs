use protocol::WireError;

/// Failures raised while encoding or decoding the file list, id maps, or
/// the trailing IO-error flag.
#[derive(Debug, thiserror::Error)]
pub enum FlistError {
    /// A lower-level wire primitive failed (short read, transport error).
    #[error(transparent)]
    Wire(#[from] WireError),

    /// A cleaned or spliced name is at or past [`crate::path::MAX_NAME_LEN`].
    #[error("file-list entry name exceeds the {len}-byte path limit")]
    PathTooLong {
        /// The offending name's length in bytes.
        len: usize,
    },

    /// `XMIT_SAME_NAME` named a prefix longer than the previous entry's
    /// name, or longer than the newly received name.
    #[error("same-name prefix length {prefix} is inconsistent with the previous entry")]
    InvalidPrefix {
        /// The prefix length claimed on the wire.
        prefix: usize,
    },

    /// The list was not terminated by a zero flag byte, or a zero flag
    /// byte appeared where an entry was expected.
    #[error("file list is missing its terminating zero entry")]
    MissingTerminator,
}

/// Convenience alias used throughout the crate.
pub type FlistResult<T> = Result<T, FlistError>;
