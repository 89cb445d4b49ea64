//! POSIX-lexical path cleaning for file-list names.
//!
//! # Upstream Reference
//!
//! `util.c:clean_fname`, summarized in spec.md §6 ("a path cleaner
//! equivalent to POSIX lexical normalization") and §4.E ("names must be
//! passed through a canonicalization equivalent to collapsing `.`/`..`/
//! redundant slashes"). This core treats overflow past
//! [`MAX_NAME_LEN`] as fatal rather than silently truncating, per
//! spec.md's PATH_MAX-overflow scenario.

use crate::error::FlistError;

/// Ceiling on a cleaned name's length, matching `PATH_MAX` on the
/// reference platform. Exceeding it after prefix splicing is a protocol
/// violation (spec.md §4.E, §8 scenario 5).
pub const MAX_NAME_LEN: usize = 4096;

/// Collapses `.` segments, redundant slashes, and resolves lexical `..`
/// without touching the filesystem; leading slashes are stripped (names
/// are always relative to the transfer root).
///
/// Returns [`FlistError::PathTooLong`] if the cleaned name is at or past
/// [`MAX_NAME_LEN`] bytes.
pub fn clean_name(raw: &[u8]) -> Result<Vec<u8>, FlistError> {
    let text = String::from_utf8_lossy(raw);
    let mut segments: Vec<&str> = Vec::new();
    for segment in text.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    let cleaned = segments.join("/");
    if cleaned.len() >= MAX_NAME_LEN {
        return Err(FlistError::PathTooLong {
            len: cleaned.len(),
        });
    }
    Ok(cleaned.into_bytes())
}
