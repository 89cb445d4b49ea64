//! Bounded producer-consumer pipe used to decouple token decoding from
//! the filesystem sink's write loop.
//!
//! # Upstream Reference
//!
//! spec.md §5: "a producer-consumer pipe decouples the token-decoding
//! task ... from the filesystem sink task .... Back-pressure is
//! mandatory: the sink must block the decoder when its buffer is full,
//! and a closed sink must propagate to the decoder as an early-
//! termination signal (treated as transient; decoding continues but
//! writes are dropped until EOF, to preserve protocol sync)."

use std::io::{self, Read, Write};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

/// Default number of in-flight chunks the pipe holds before the writer
/// blocks, matching the multiplex framer's buffering granularity.
pub const DEFAULT_PIPE_DEPTH: usize = 4;

/// Creates a bounded pipe with `depth` slots of back-pressure.
#[must_use]
pub fn bounded_pipe(depth: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = sync_channel(depth.max(1));
    (
        PipeWriter {
            tx: Some(tx),
            closed: false,
        },
        PipeReader {
            rx,
            buf: Vec::new(),
            pos: 0,
        },
    )
}

/// Write half of the pipe. Blocks when the reader hasn't drained enough
/// in-flight chunks; once the reader is dropped, further writes are
/// silently discarded (the caller keeps decoding to stay in sync with
/// the wire, it just has nowhere left to put the bytes).
pub struct PipeWriter {
    tx: Option<SyncSender<Vec<u8>>>,
    closed: bool,
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed || buf.is_empty() {
            return Ok(buf.len());
        }
        let Some(tx) = &self.tx else {
            return Ok(buf.len());
        };
        if tx.send(buf.to_vec()).is_err() {
            self.closed = true;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl PipeWriter {
    /// True once the reader side has been dropped; further writes are
    /// dropped on the floor rather than blocking or erroring.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closes the pipe explicitly, signalling EOF to the reader.
    pub fn close(&mut self) {
        self.tx = None;
    }
}

/// Read half of the pipe; yields `Ok(0)` once the writer has closed and
/// all buffered chunks are drained.
pub struct PipeReader {
    rx: Receiver<Vec<u8>>,
    buf: Vec<u8>,
    pos: usize,
}

impl Read for PipeReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.buf.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.buf = chunk;
                    self.pos = 0;
                }
                Err(_) => return Ok(0),
            }
        }
        let available = &self.buf[self.pos..];
        let take = available.len().min(out.len());
        out[..take].copy_from_slice(&available[..take]);
        self.pos += take;
        Ok(take)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn writes_are_readable_in_order() {
        let (mut writer, mut reader) = bounded_pipe(DEFAULT_PIPE_DEPTH);
        let handle = thread::spawn(move || {
            writer.write_all(b"hello").unwrap();
            writer.write_all(b" world").unwrap();
            writer.close();
        });
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        handle.join().unwrap();
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn dropping_the_reader_silently_drops_further_writes() {
        let (mut writer, reader) = bounded_pipe(1);
        drop(reader);
        // First write may still land in the channel buffer; keep
        // writing until the closed side is observed.
        for _ in 0..4 {
            writer.write_all(b"x").unwrap();
        }
        assert!(writer.is_closed());
    }

    #[test]
    fn backpressure_blocks_until_drained() {
        let (mut writer, mut reader) = bounded_pipe(1);
        let handle = thread::spawn(move || {
            for i in 0..8u8 {
                writer.write_all(&[i]).unwrap();
            }
            writer.close();
        });
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        handle.join().unwrap();
        assert_eq!(out, vec![0, 1, 2, 3, 4, 5, 6, 7]);
    }
}
