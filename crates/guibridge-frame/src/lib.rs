//! Length-prefixed, checksummed message framing for the guibridge protocol.
//!
//! Every message on the wire is framed as:
//! - A 4-byte big-endian payload length
//! - The payload itself (one JSON document)
//! - A 4-byte big-endian CRC-32 of the payload
//!
//! The codec is symmetric: the worker writes Responses and Events with it and
//! reads Commands with it. A newline-delimited [`LineReader`] is provided for
//! hosts that cannot frame their output.

pub mod codec;
pub mod error;
pub mod line;
pub mod reader;
pub mod writer;

pub use codec::{
    checksum, decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
    TRAILER_SIZE,
};
pub use error::{FrameError, Result};
pub use line::LineReader;
pub use reader::{FrameReader, ReadFrame};
pub use writer::FrameWriter;
