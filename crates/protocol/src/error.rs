use std::io;

/// Failures raised while reading or writing the raw rsync wire primitives.
///
/// `WireEof` and `WireIo` map directly onto the error kinds from the core
/// specification: a short read is always `WireEof`, any other I/O failure
/// (broken pipe, reset connection, ...) is `WireIo`.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The peer closed the connection (or a read returned fewer bytes than
    /// requested) before a complete value could be decoded.
    #[error("unexpected end of stream while reading {what}")]
    WireEof {
        /// What the caller was trying to read when the stream ended.
        what: &'static str,
    },

    /// The underlying transport failed for a reason other than EOF.
    #[error("wire I/O error: {0}")]
    WireIo(#[from] io::Error),
}

impl WireError {
    pub(crate) fn eof(what: &'static str) -> Self {
        Self::WireEof { what }
    }
}

/// Convenience alias used throughout the crate.
pub type WireResult<T> = Result<T, WireError>;
