//! Out-of-band multiplexed framing for the server-to-client direction.
//!
//! # Upstream Reference
//!
//! Mirrors rsync's `io.c` `mplex_write`/`read_msg_fd` pair: once the
//! session has exchanged the checksum seed, every byte the generator
//! writes downstream is wrapped in a 4-byte header whose top byte is a
//! message tag and whose bottom three bytes are the payload length.
//! Everything but [`MessageCode::Data`] is routed to a [`MessageSink`]
//! instead of being handed back to the caller, which is how error/info
//! text rides the same socket as block data without the reader having to
//! special-case it.

use std::io::{self, Read, Write};

use crate::error::{WireError, WireResult};

/// Offset added to a logical message code before it is placed in the
/// frame header's tag byte, matching upstream's `MPLEX_BASE`.
pub const MPLEX_BASE: u8 = 7;

/// Default buffer size for the multiplex writer, matching spec.md §4.B.
pub const DEFAULT_BUFFER_LEN: usize = 32 * 1024;

/// Largest payload a single frame can carry (three length bytes).
pub const MAX_PAYLOAD_LEN: usize = 0x00FF_FFFF;

/// Logical tag carried by a multiplexed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCode {
    /// Ordinary protocol payload (block signatures, tokens, file list…).
    Data,
    /// Fatal error text, formatted `"<role>: <message>"`.
    Error,
    /// Informational text with no bearing on session outcome.
    Info,
}

impl MessageCode {
    fn to_tag(self) -> u8 {
        let offset = match self {
            Self::Data => 0,
            Self::Error => 1,
            Self::Info => 2,
        };
        MPLEX_BASE + offset
    }

    fn from_tag(tag: u8) -> Option<Self> {
        if tag < MPLEX_BASE {
            return None;
        }
        match tag - MPLEX_BASE {
            0 => Some(Self::Data),
            1 => Some(Self::Error),
            2 => Some(Self::Info),
            _ => None,
        }
    }
}

/// Receives text frames peeled off the multiplexed stream by
/// [`Demultiplexer`]. Implementations typically forward to a logging
/// collaborator; the core itself only classifies and dispatches.
pub trait MessageSink {
    /// Called once per non-data frame, in stream order.
    fn accept(&mut self, code: MessageCode, text: &str);
}

/// A [`MessageSink`] that discards everything; useful for tests and for
/// callers that genuinely do not care about out-of-band text.
#[derive(Debug, Default)]
pub struct NullSink;

impl MessageSink for NullSink {
    fn accept(&mut self, _code: MessageCode, _text: &str) {}
}

fn encode_header(code: MessageCode, len: usize) -> WireResult<[u8; 4]> {
    if len > MAX_PAYLOAD_LEN {
        return Err(WireError::from(io::Error::new(
            io::ErrorKind::InvalidInput,
            "multiplex frame payload exceeds 24-bit length field",
        )));
    }
    let tag = u32::from(code.to_tag());
    let word = (tag << 24) | (len as u32);
    Ok(word.to_le_bytes())
}

fn decode_header(bytes: [u8; 4]) -> WireResult<(MessageCode, usize)> {
    let word = u32::from_le_bytes(bytes);
    let tag = (word >> 24) as u8;
    let len = (word & 0x00FF_FFFF) as usize;
    let code = MessageCode::from_tag(tag).ok_or_else(|| {
        WireError::from(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unknown multiplex tag {tag}"),
        ))
    })?;
    Ok((code, len))
}

/// Buffers writes and flushes them as data-tagged frames of up to
/// [`DEFAULT_BUFFER_LEN`] bytes.
///
/// The buffering exists so a stream of small writes (one token header at
/// a time, say) does not turn into one 4-byte-header frame per write;
/// spec.md §4.B asks that data not be gratuitously split across frame
/// boundaries below 4 KiB.
pub struct MultiplexWriter<W> {
    inner: W,
    buffer: Vec<u8>,
    capacity: usize,
}

impl<W: Write> MultiplexWriter<W> {
    /// Wraps `inner`, using [`DEFAULT_BUFFER_LEN`] as the frame size.
    pub fn new(inner: W) -> Self {
        Self::with_capacity(inner, DEFAULT_BUFFER_LEN)
    }

    /// Wraps `inner` with an explicit frame capacity, mostly useful for
    /// tests that want to force frame boundaries deterministically.
    pub fn with_capacity(inner: W, capacity: usize) -> Self {
        Self {
            inner,
            buffer: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Writes a complete out-of-band message immediately, bypassing the
    /// data buffer (so error text is not held up behind buffered data).
    pub fn send_message(&mut self, code: MessageCode, text: &str) -> WireResult<()> {
        debug_assert!(!matches!(code, MessageCode::Data));
        self.flush_data()?;
        self.write_frame(code, text.as_bytes())
    }

    fn write_frame(&mut self, code: MessageCode, payload: &[u8]) -> WireResult<()> {
        for chunk in payload.chunks(MAX_PAYLOAD_LEN.min(self.capacity.max(1))) {
            let header = encode_header(code, chunk.len())?;
            self.inner.write_all(&header)?;
            self.inner.write_all(chunk)?;
        }
        if payload.is_empty() {
            let header = encode_header(code, 0)?;
            self.inner.write_all(&header)?;
        }
        Ok(())
    }

    fn flush_data(&mut self) -> WireResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let payload = std::mem::take(&mut self.buffer);
        self.write_frame(MessageCode::Data, &payload)?;
        self.buffer = Vec::with_capacity(self.capacity);
        Ok(())
    }

    /// Unwraps the writer after flushing any buffered data.
    pub fn into_inner(mut self) -> WireResult<W> {
        self.flush_data()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for MultiplexWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut written = 0;
        let mut remaining = buf;
        while !remaining.is_empty() {
            let space = self.capacity - self.buffer.len();
            let take = space.min(remaining.len());
            self.buffer.extend_from_slice(&remaining[..take]);
            remaining = &remaining[take..];
            written += take;
            if self.buffer.len() == self.capacity {
                self.flush_data()
                    .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
            }
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_data()
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        self.inner.flush()
    }
}

/// Reads a multiplexed stream, yielding only [`MessageCode::Data`] bytes
/// to the caller and routing everything else to a [`MessageSink`].
pub struct Demultiplexer<R, S> {
    inner: R,
    sink: S,
    pending: Vec<u8>,
    pending_pos: usize,
}

impl<R: Read, S: MessageSink> Demultiplexer<R, S> {
    /// Wraps `inner`, delivering non-data frames to `sink`.
    pub const fn new(inner: R, sink: S) -> Self {
        Self {
            inner,
            sink,
            pending: Vec::new(),
            pending_pos: 0,
        }
    }

    /// Unwraps the demultiplexer, discarding any buffered remainder.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn fill_pending(&mut self) -> io::Result<bool> {
        loop {
            let mut header = [0u8; 4];
            match self.inner.read_exact(&mut header) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(false),
                Err(err) => return Err(err),
            }
            let (code, len) =
                decode_header(header).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            let mut payload = vec![0u8; len];
            self.inner.read_exact(&mut payload)?;
            match code {
                MessageCode::Data => {
                    if payload.is_empty() {
                        continue;
                    }
                    self.pending = payload;
                    self.pending_pos = 0;
                    return Ok(true);
                }
                other => {
                    let text = String::from_utf8_lossy(&payload).into_owned();
                    self.sink.accept(other, &text);
                }
            }
        }
    }
}

impl<R: Read, S: MessageSink> Read for Demultiplexer<R, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending_pos >= self.pending.len() && !self.fill_pending()? {
            return Ok(0);
        }
        let available = &self.pending[self.pending_pos..];
        let take = available.len().min(buf.len());
        buf[..take].copy_from_slice(&available[..take]);
        self.pending_pos += take;
        Ok(take)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[derive(Default)]
    struct RecordingSink {
        messages: Vec<(MessageCode, String)>,
    }

    impl MessageSink for RecordingSink {
        fn accept(&mut self, code: MessageCode, text: &str) {
            self.messages.push((code, text.to_string()));
        }
    }

    #[test]
    fn header_round_trips() {
        let header = encode_header(MessageCode::Error, 42).unwrap();
        let (code, len) = decode_header(header).unwrap();
        assert_eq!(code, MessageCode::Error);
        assert_eq!(len, 42);
    }

    #[test]
    fn writer_flushes_buffered_data_as_one_frame() {
        let mut writer = MultiplexWriter::with_capacity(Vec::new(), 64);
        writer.write_all(b"hello world").unwrap();
        writer.flush().unwrap();
        let bytes = writer.into_inner().unwrap();
        let (code, len) = decode_header(bytes[0..4].try_into().unwrap()).unwrap();
        assert_eq!(code, MessageCode::Data);
        assert_eq!(len, 11);
        assert_eq!(&bytes[4..], b"hello world");
    }

    #[test]
    fn writer_splits_data_across_frames_at_capacity() {
        let mut writer = MultiplexWriter::with_capacity(Vec::new(), 4);
        writer.write_all(b"abcdefgh").unwrap();
        let bytes = writer.into_inner().unwrap();
        // Two frames of 4 bytes each, each with a 4-byte header.
        assert_eq!(bytes.len(), 2 * (4 + 4));
    }

    #[test]
    fn demultiplexer_separates_data_from_out_of_band_text() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&encode_header(MessageCode::Info, 5).unwrap());
        wire.extend_from_slice(b"hello");
        wire.extend_from_slice(&encode_header(MessageCode::Data, 3).unwrap());
        wire.extend_from_slice(b"abc");
        wire.extend_from_slice(&encode_header(MessageCode::Error, 4).unwrap());
        wire.extend_from_slice(b"fail");
        wire.extend_from_slice(&encode_header(MessageCode::Data, 2).unwrap());
        wire.extend_from_slice(b"xy");

        let mut demux = Demultiplexer::new(Cursor::new(wire), RecordingSink::default());
        let mut out = Vec::new();
        demux.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abcxy");
        assert_eq!(
            demux.sink.messages,
            vec![
                (MessageCode::Info, "hello".to_string()),
                (MessageCode::Error, "fail".to_string()),
            ]
        );
    }

    #[test]
    fn demultiplexer_rejects_unknown_tag() {
        let mut wire = Vec::new();
        let bogus_header = (0xFFu32 << 24).to_le_bytes();
        wire.extend_from_slice(&bogus_header);
        let mut demux = Demultiplexer::new(Cursor::new(wire), NullSink);
        let mut out = [0u8; 4];
        let err = demux.read(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
