use std::io::Read;

use bytes::BytesMut;

use crate::codec::{decode_frame, Frame, FrameConfig};
use crate::error::{retry_interrupted, FrameError, Result};

const CHUNK: usize = 8 * 1024;

/// A source of complete inbound frames.
///
/// Implemented by [`FrameReader`] and [`crate::LineReader`] so the dispatcher
/// does not care which framing the host speaks.
pub trait ReadFrame {
    /// Block until one whole frame is available.
    ///
    /// `Err(FrameError::ConnectionClosed)` means the stream is exhausted.
    fn read_frame(&mut self) -> Result<Frame>;
}

/// Reassembles length-prefixed frames from a byte stream that may deliver
/// them in arbitrary pieces.
pub struct FrameReader<T> {
    inner: T,
    pending: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            pending: BytesMut::with_capacity(CHUNK),
            config,
        }
    }

    /// Next frame off the stream.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached, and
    /// `Err(FrameError::Corrupt { .. })` when a frame fails its checksum. The
    /// corrupt frame has already been consumed, so calling again resumes at
    /// the next declared frame boundary.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.pending, self.config.max_payload_size)? {
                return Ok(frame);
            }

            let mut chunk = [0u8; CHUNK];
            let read = retry_interrupted(|| self.inner.read(&mut chunk))?;

            if read == 0 {
                if !self.pending.is_empty() {
                    tracing::debug!(buffered = self.pending.len(), "stream closed mid-frame");
                }
                return Err(FrameError::ConnectionClosed);
            }

            self.pending.extend_from_slice(&chunk[..read]);
        }
    }

    /// Bytes received but not yet decoded into a frame.
    pub fn buffered(&self) -> usize {
        self.pending.len()
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

impl<T: Read> ReadFrame for FrameReader<T> {
    fn read_frame(&mut self) -> Result<Frame> {
        FrameReader::read_frame(self)
    }
}

impl<R: ReadFrame + ?Sized> ReadFrame for Box<R> {
    fn read_frame(&mut self) -> Result<Frame> {
        (**self).read_frame()
    }
}
