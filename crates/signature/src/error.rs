//! Error type for the signature-stream wire codec and block planner.
//!
//! # Upstream Reference
//!
//! Follows the small-enum, `#[error(...)]`, `#[from]`-chaining
//! convention used throughout this workspace (see `protocol::error`
//! and `flist::error::FlistError`).

use protocol::WireError;

/// Failures raised while planning a block size or reading/writing a
/// signature stream.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    /// A lower-level wire primitive failed (short read, transport error).
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Convenience alias used throughout the crate.
pub type SignatureResult<T> = Result<T, SignatureError>;
