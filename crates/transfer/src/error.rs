//! Top-level error type for the session orchestrator and its pipeline.
//!
//! # Upstream Reference
//!
//! Consolidates the error kinds enumerated in spec.md §7 into a single
//! `thiserror` enum, following the per-crate error-module convention
//! visible in `core::client::error`.

use flist::FlistError;
use protocol::WireError;
use signature::SignatureError;

/// Errors that can terminate a session or a single file transfer.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A wire primitive failed (short read, transport error). Always
    /// fatal.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The file-list codec rejected the stream.
    #[error(transparent)]
    Flist(#[from] FlistError),

    /// The block-size planner or signature-stream codec rejected the
    /// stream.
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// The peer sent a value the protocol does not allow here (bad
    /// terminator, out-of-range file index, oversized name). Fatal.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A whole-file checksum did not match after reconstruction. Fatal:
    /// the token stream is assumed out of sync.
    #[error("whole-file checksum mismatch for {name}")]
    Corruption {
        /// Name of the file whose checksum failed to verify.
        name: String,
    },

    /// The filesystem sink refused a write. Logged and swallowed: the
    /// session continues but the file is left incomplete.
    #[error("sink rejected write for {name}: {source}")]
    Sink {
        /// Name of the file the sink could not persist.
        name: String,
        /// Underlying I/O failure reported by the sink.
        #[source]
        source: std::io::Error,
    },

    /// The sender or generator could not open a source/local file for a
    /// file-list entry. Logged and swallowed: the request is dropped
    /// rather than aborting the session (spec.md §4.H, §7).
    #[error("failed to open {name}: {source}")]
    OpenFailed {
        /// Name of the file that could not be opened.
        name: String,
        /// Underlying I/O failure reported by the sink.
        #[source]
        source: std::io::Error,
    },

    /// One of the two concurrent roles (generator, receiver) failed;
    /// this carries the first error observed from either side.
    #[error("concurrent task cancelled: {0}")]
    Cancelled(String),
}

impl SessionError {
    /// Builds a [`SessionError::ProtocolViolation`] from a display-able
    /// reason.
    pub fn protocol_violation(reason: impl Into<String>) -> Self {
        Self::ProtocolViolation(reason.into())
    }
}

/// Convenience alias used throughout the crate.
pub type SessionResult<T> = Result<T, SessionError>;
