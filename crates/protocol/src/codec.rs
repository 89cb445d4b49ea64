//! Byte-ordered wire primitives and byte-counting stream wrappers.
//!
//! # Upstream Reference
//!
//! Mirrors the primitive read/write helpers in rsync's `io.c`
//! (`read_int`, `read_longint`, `write_int`, `write_longint`,
//! `read_buf`/`write_buf`), minus the multiplexing concerns, which live
//! in [`crate::multiplex`].

use std::io::{self, Read, Write};

use crate::error::{WireError, WireResult};

/// Maximum length accepted for a length-prefixed byte string, matching the
/// `PATH_MAX`-derived ceiling used for names and symlink targets elsewhere
/// in the core.
pub const MAX_BYTE_STRING_LEN: usize = 4096;

/// Reads a single unsigned byte.
pub fn read_u8<R: Read>(reader: &mut R) -> WireResult<u8> {
    let mut buf = [0u8; 1];
    read_exact(reader, &mut buf, "u8")?;
    Ok(buf[0])
}

/// Writes a single unsigned byte.
pub fn write_u8<W: Write>(writer: &mut W, value: u8) -> WireResult<()> {
    writer.write_all(&[value]).map_err(WireError::from)
}

/// Reads a little-endian 32-bit signed integer.
pub fn read_i32<R: Read>(reader: &mut R) -> WireResult<i32> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf, "i32")?;
    Ok(i32::from_le_bytes(buf))
}

/// Writes a little-endian 32-bit signed integer.
pub fn write_i32<W: Write>(writer: &mut W, value: i32) -> WireResult<()> {
    writer.write_all(&value.to_le_bytes()).map_err(WireError::from)
}

/// Reads a little-endian 64-bit signed integer.
pub fn read_i64<R: Read>(reader: &mut R) -> WireResult<i64> {
    let mut buf = [0u8; 8];
    read_exact(reader, &mut buf, "i64")?;
    Ok(i64::from_le_bytes(buf))
}

/// Writes a little-endian 64-bit signed integer.
pub fn write_i64<W: Write>(writer: &mut W, value: i64) -> WireResult<()> {
    writer.write_all(&value.to_le_bytes()).map_err(WireError::from)
}

/// Reads `len` raw bytes.
pub fn read_bytes<R: Read>(reader: &mut R, len: usize) -> WireResult<Vec<u8>> {
    let mut buf = vec![0u8; len];
    read_exact(reader, &mut buf, "byte string")?;
    Ok(buf)
}

/// Reads a length-prefixed byte string. `long` selects a 4-byte length
/// prefix; otherwise a single byte is used, matching the `XMIT_LONG_NAME`
/// convention used by the file-list codec.
pub fn read_prefixed_bytes<R: Read>(reader: &mut R, long: bool) -> WireResult<Vec<u8>> {
    let len = if long {
        let raw = read_i32(reader)?;
        usize::try_from(raw).map_err(|_| WireError::eof("prefixed byte string length"))?
    } else {
        usize::from(read_u8(reader)?)
    };
    read_bytes(reader, len)
}

/// Writes a length-prefixed byte string using the same convention as
/// [`read_prefixed_bytes`].
pub fn write_prefixed_bytes<W: Write>(writer: &mut W, data: &[u8], long: bool) -> WireResult<()> {
    if long {
        let len = i32::try_from(data.len()).map_err(|_| {
            WireError::from(io::Error::new(
                io::ErrorKind::InvalidInput,
                "byte string too long for a 4-byte length prefix",
            ))
        })?;
        write_i32(writer, len)?;
    } else {
        let len = u8::try_from(data.len()).map_err(|_| {
            WireError::from(io::Error::new(
                io::ErrorKind::InvalidInput,
                "byte string too long for a 1-byte length prefix",
            ))
        })?;
        write_u8(writer, len)?;
    }
    writer.write_all(data).map_err(WireError::from)
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8], what: &'static str) -> WireResult<()> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Err(WireError::eof(what)),
        Err(err) => Err(WireError::from(err)),
    }
}

/// Wraps a [`Read`] implementation, tracking the cumulative number of bytes
/// observed so the session orchestrator can report the statistics frame at
/// the end of a transfer.
#[derive(Debug)]
pub struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R> CountingReader<R> {
    /// Wraps `inner`, starting the counter at zero.
    pub const fn new(inner: R) -> Self {
        Self { inner, count: 0 }
    }

    /// Total bytes read through this wrapper so far.
    #[must_use]
    pub const fn bytes_read(&self) -> u64 {
        self.count
    }

    /// Unwraps the reader, discarding the counter.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Borrows the underlying reader mutably without affecting the counter.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

/// Wraps a [`Write`] implementation, tracking the cumulative number of
/// bytes written.
#[derive(Debug)]
pub struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W> CountingWriter<W> {
    /// Wraps `inner`, starting the counter at zero.
    pub const fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }

    /// Total bytes written through this wrapper so far.
    #[must_use]
    pub const fn bytes_written(&self) -> u64 {
        self.count
    }

    /// Unwraps the writer, discarding the counter.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Borrows the underlying writer mutably without affecting the counter.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
