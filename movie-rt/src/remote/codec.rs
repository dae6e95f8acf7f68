//! Length-prefixed frame codec.
//!
//! Each frame is a `u32` big-endian length followed by exactly that many
//! bytes of UTF-8 JSON (one envelope). Oversize frames and mid-frame EOF
//! are connection-fatal; the pool reconnects with backoff.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

// Layer 3: Internal module imports
use super::envelope::WireEnvelope;
use crate::error::RuntimeError;

/// Default maximum frame size: 16 MiB.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Codec for `u32-BE length | JSON envelope` frames.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_bytes: usize,
}

impl FrameCodec {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self { max_frame_bytes }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl Decoder for FrameCodec {
    type Item = WireEnvelope;
    type Error = RuntimeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<WireEnvelope>, RuntimeError> {
        if src.len() < 4 {
            return Ok(None);
        }
        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if length > self.max_frame_bytes {
            return Err(RuntimeError::FrameTooLarge {
                size: length,
                max: self.max_frame_bytes,
            });
        }
        if src.len() < 4 + length {
            src.reserve(4 + length - src.len());
            return Ok(None);
        }
        src.advance(4);
        let frame = src.split_to(length);
        serde_json::from_slice(&frame)
            .map(Some)
            .map_err(|e| RuntimeError::ProtocolViolation(format!("invalid envelope JSON: {e}")))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<WireEnvelope>, RuntimeError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(RuntimeError::TruncatedFrame),
        }
    }
}

impl Encoder<WireEnvelope> for FrameCodec {
    type Error = RuntimeError;

    fn encode(&mut self, envelope: WireEnvelope, dst: &mut BytesMut) -> Result<(), RuntimeError> {
        let body = serde_json::to_vec(&envelope)
            .map_err(|e| RuntimeError::ProtocolViolation(format!("unencodable envelope: {e}")))?;
        if body.len() > self.max_frame_bytes {
            return Err(RuntimeError::FrameTooLarge {
                size: body.len(),
                max: self.max_frame_bytes,
            });
        }
        dst.reserve(4 + body.len());
        dst.put_u32(body.len() as u32);
        dst.extend_from_slice(&body);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> WireEnvelope {
        WireEnvelope::user(
            "/user/echo".to_string(),
            "EchoRequest",
            serde_json::json!({ "msg": "hi" }),
            None,
        )
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        let env = sample();

        codec.encode(env.clone(), &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, env);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_length_prefix_is_big_endian() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(sample(), &mut buf).unwrap();

        let length = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert_eq!(length, buf.len() - 4);
    }

    #[test]
    fn test_partial_frame_waits_for_more() {
        let mut codec = FrameCodec::default();
        let mut full = BytesMut::new();
        codec.encode(sample(), &mut full).unwrap();

        let mut partial = BytesMut::from(&full[..full.len() - 3]);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&full[full.len() - 3..]);
        assert!(codec.decode(&mut partial).unwrap().is_some());
    }

    #[test]
    fn test_oversize_frame_fails() {
        let mut codec = FrameCodec::new(64);
        let mut buf = BytesMut::new();
        buf.put_u32(1024);
        buf.extend_from_slice(&[0u8; 16]);

        assert!(matches!(
            codec.decode(&mut buf),
            Err(RuntimeError::FrameTooLarge { size: 1024, max: 64 })
        ));
    }

    #[test]
    fn test_encode_oversize_fails() {
        let mut codec = FrameCodec::new(8);
        let mut buf = BytesMut::new();
        assert!(matches!(
            codec.encode(sample(), &mut buf),
            Err(RuntimeError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_eof_mid_frame_is_truncated() {
        let mut codec = FrameCodec::default();
        let mut full = BytesMut::new();
        codec.encode(sample(), &mut full).unwrap();

        let mut partial = BytesMut::from(&full[..6]);
        assert!(matches!(
            codec.decode_eof(&mut partial),
            Err(RuntimeError::TruncatedFrame)
        ));
    }

    #[test]
    fn test_eof_clean_is_none() {
        let mut codec = FrameCodec::default();
        let mut empty = BytesMut::new();
        assert!(codec.decode_eof(&mut empty).unwrap().is_none());
    }

    #[test]
    fn test_garbage_json_is_protocol_violation() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        let body = b"not json at all";
        buf.put_u32(body.len() as u32);
        buf.extend_from_slice(body);

        assert!(matches!(
            codec.decode(&mut buf),
            Err(RuntimeError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_multiple_frames_in_one_buffer() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(sample(), &mut buf).unwrap();
        codec.encode(WireEnvelope::heartbeat(), &mut buf).unwrap();

        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.message_type, "EchoRequest");
        assert_eq!(second.message_type, "heartbeat");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }
}
