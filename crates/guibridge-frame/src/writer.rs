use std::io::Write;

use bytes::BytesMut;

use crate::codec::{encode_frame, Frame, FrameConfig};
use crate::error::{retry_interrupted, FrameError, Result};

const SCRATCH_CAPACITY: usize = 8 * 1024;

/// Frame sink over any blocking `Write` stream.
///
/// Each frame is encoded into one scratch buffer and handed to the stream in
/// full before `send` returns, then the stream is flushed. Callers that share
/// a writer serialize on it, which keeps frames from interleaving.
pub struct FrameWriter<T> {
    inner: T,
    scratch: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            scratch: BytesMut::with_capacity(SCRATCH_CAPACITY),
            config,
        }
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(&frame.payload)
    }

    /// Frame `payload`, write it out and flush.
    ///
    /// Oversized payloads are refused before any byte is written.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.config.check_payload(payload.len())?;

        self.scratch.clear();
        encode_frame(payload, &mut self.scratch)?;
        write_fully(&mut self.inner, &self.scratch)?;
        self.flush()
    }

    pub fn flush(&mut self) -> Result<()> {
        retry_interrupted(|| self.inner.flush())
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

/// A stream that accepts zero bytes is treated as closed.
fn write_fully<W: Write>(out: &mut W, mut bytes: &[u8]) -> Result<()> {
    while !bytes.is_empty() {
        let written = retry_interrupted(|| out.write(bytes))?;
        if written == 0 {
            return Err(FrameError::ConnectionClosed);
        }
        bytes = &bytes[written..];
    }
    Ok(())
}
