/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The trailing checksum does not match the payload.
    #[error("frame corrupt (checksum 0x{expected:08x}, computed 0x{actual:08x})")]
    Corrupt { expected: u32, actual: u32 },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream was closed before a complete frame was received.
    #[error("stream closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Run a blocking stream operation, retrying on `Interrupted`.
pub(crate) fn retry_interrupted<R>(mut op: impl FnMut() -> std::io::Result<R>) -> Result<R> {
    loop {
        match op() {
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            other => return other.map_err(FrameError::Io),
        }
    }
}
