use std::io::Read;

use bytes::{Buf, BytesMut};

use crate::codec::{Frame, FrameConfig};
use crate::error::{retry_interrupted, FrameError, Result};
use crate::reader::ReadFrame;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads newline-delimited payloads and presents each line as a [`Frame`].
///
/// This is the degraded inbound mode for hosts that write one JSON document
/// per line instead of framing. There is no checksum on the wire, so the
/// frames it yields are trusted as-is. Blank lines are skipped, a trailing
/// `\r` is stripped, and an unterminated final line is delivered at EOF.
pub struct LineReader<T> {
    inner: T,
    buf: BytesMut,
    scanned: usize,
    eof: bool,
    config: FrameConfig,
}

impl<T: Read> LineReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::new(),
            scanned: 0,
            eof: false,
            config,
        }
    }

    /// Read the next non-empty line (blocking).
    pub fn read_line_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.take_line()? {
                return Ok(frame);
            }

            if self.eof {
                if self.buf.is_empty() {
                    return Err(FrameError::ConnectionClosed);
                }
                let rest = self.buf.split().freeze();
                self.scanned = 0;
                if let Some(frame) = trimmed(rest) {
                    return Ok(frame);
                }
                continue;
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            match retry_interrupted(|| self.inner.read(&mut chunk))? {
                0 => self.eof = true,
                n => self.buf.extend_from_slice(&chunk[..n]),
            }
        }
    }

    fn take_line(&mut self) -> Result<Option<Frame>> {
        while let Some(offset) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + offset;
            let line = self.buf.split_to(end).freeze();
            self.buf.advance(1);
            self.scanned = 0;
            self.config.check_payload(line.len())?;
            if let Some(frame) = trimmed(line) {
                return Ok(Some(frame));
            }
        }

        self.scanned = self.buf.len();
        self.config.check_payload(self.buf.len())?;
        Ok(None)
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read> ReadFrame for LineReader<T> {
    fn read_frame(&mut self) -> Result<Frame> {
        self.read_line_frame()
    }
}

fn trimmed(mut line: bytes::Bytes) -> Option<Frame> {
    if line.last() == Some(&b'\r') {
        line.truncate(line.len() - 1);
    }
    if line.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    Some(Frame::new(line))
}
