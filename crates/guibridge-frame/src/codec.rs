use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: payload length (4, big-endian).
pub const HEADER_SIZE: usize = 4;

/// Frame trailer: CRC-32 of the payload (4, big-endian).
pub const TRAILER_SIZE: usize = 4;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// One framed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// CRC-32 of the payload, as carried in the trailer.
    pub fn checksum(&self) -> u32 {
        checksum(&self.payload)
    }

    /// The total wire size of this frame (header + payload + trailer).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len() + TRAILER_SIZE
    }
}

/// IEEE CRC-32 of `payload`.
pub fn checksum(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬─────────────────┬──────────────┐
/// │ Length       │ Payload         │ CRC-32       │
/// │ (4B BE)      │ (Length bytes)  │ (4B BE)      │
/// └──────────────┴─────────────────┴──────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len() + TRAILER_SIZE);
    dst.put_u32(payload.len() as u32);
    dst.put_slice(payload);
    dst.put_u32(checksum(payload));
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. A frame whose
/// checksum does not match is consumed as well and reported as
/// [`FrameError::Corrupt`]; bytes after it are left untouched.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let payload_len = (&src[..HEADER_SIZE]).get_u32() as usize;

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len + TRAILER_SIZE;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();
    let expected = src.get_u32();
    let actual = checksum(&payload);

    if expected != actual {
        return Err(FrameError::Corrupt { expected, actual });
    }

    Ok(Some(Frame { payload }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
}

impl FrameConfig {
    /// `PayloadTooLarge` if `len` exceeds the configured maximum.
    pub fn check_payload(&self, len: usize) -> Result<()> {
        if len > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: len,
                max: self.max_payload_size,
            });
        }
        Ok(())
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_frame(payload, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let payload = br#"{"id":"1","type":"createWindow"}"#;
        let mut buf = encoded(payload);

        assert_eq!(buf.len(), HEADER_SIZE + payload.len() + TRAILER_SIZE);

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();

        assert_eq!(frame.payload.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_roundtrip_across_payload_lengths() {
        for len in 0..=300usize {
            let payload: Vec<u8> = (0..len).map(|i| (i * 31 + 7) as u8).collect();
            let mut buf = encoded(&payload);
            assert_eq!(buf.len(), HEADER_SIZE + len + TRAILER_SIZE);

            let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
            assert_eq!(frame.payload.as_ref(), payload.as_slice(), "length {len}");
            assert!(buf.is_empty(), "length {len} left bytes behind");
        }
    }

    #[test]
    fn test_wire_layout_is_big_endian() {
        let buf = encoded(b"abc");
        assert_eq!(&buf[..4], &[0, 0, 0, 3]);
        assert_eq!(&buf[4..7], b"abc");
        assert_eq!(&buf[7..], &checksum(b"abc").to_be_bytes());
    }

    #[test]
    fn test_known_crc32_value() {
        // Standard IEEE check value.
        assert_eq!(checksum(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x00, 0x00, 0x00][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = encoded(b"hello");
        buf.truncate(HEADER_SIZE + 2);

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_missing_trailer() {
        let mut buf = encoded(b"hello");
        buf.truncate(HEADER_SIZE + 5 + 3);

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u32(1024 * 1024 * 32); // 32 MiB

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_checksum_mismatch_is_corrupt() {
        let mut buf = encoded(b"payload");
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::Corrupt { .. })));
    }

    #[test]
    fn test_every_single_bit_flip_is_detected() {
        let payload = br#"{"type":"callback","data":{"callbackId":"cb-1"}}"#;
        let clean = encoded(payload);

        for byte in HEADER_SIZE..clean.len() {
            for bit in 0..8 {
                let mut buf = clean.clone();
                buf[byte] ^= 1 << bit;
                let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
                assert!(
                    matches!(result, Err(FrameError::Corrupt { .. })),
                    "flip of bit {bit} in byte {byte} was not detected"
                );
            }
        }
    }

    #[test]
    fn test_corrupt_frame_consumes_only_itself() {
        let mut buf = encoded(b"first");
        buf[HEADER_SIZE] ^= 0x01;
        buf.extend_from_slice(&encoded(b"second"));

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::Corrupt { .. })));

        let next = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(next.payload.as_ref(), b"second");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_multiple_frames() {
        let mut buf = encoded(b"first");
        encode_frame(b"second", &mut buf).unwrap();

        let f1 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(f1.payload.as_ref(), b"first");

        let f2 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(f2.payload.as_ref(), b"second");

        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_payload() {
        let mut buf = encoded(b"");
        assert_eq!(buf.len(), HEADER_SIZE + TRAILER_SIZE);

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert!(frame.is_empty());
        assert_eq!(frame.checksum(), 0);
    }

    #[test]
    fn test_frame_wire_size() {
        let frame = Frame::new(Bytes::from_static(b"test"));
        assert_eq!(frame.len(), 4);
        assert_eq!(frame.wire_size(), HEADER_SIZE + 4 + TRAILER_SIZE);
    }
}
