//! Connect streaming envelopes
//!
//! Every message on a streaming call is framed as a flags byte, a big-endian
//! u32 length and the payload. The last frame of a response stream has the
//! end-stream flag set and carries `{"error": {...}}` or `{}`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use error_types::connect::ConnectError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const FLAG_COMPRESSED: u8 = 0b0000_0001;
pub const FLAG_END_STREAM: u8 = 0b0000_0010;

const HEADER_LEN: usize = 5;

/// Largest frame accepted by `FrameDecoder::default()`
pub const DEFAULT_MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub flags: u8,
    pub payload: Bytes,
}

impl Frame {
    pub fn message(payload: impl Into<Bytes>) -> Self {
        Self {
            flags: 0,
            payload: payload.into(),
        }
    }

    pub fn end_stream(end: &EndStream) -> Self {
        Self {
            flags: FLAG_END_STREAM,
            // Option of a plain struct; serialization cannot fail.
            payload: Bytes::from(serde_json::to_vec(end).unwrap_or_else(|_| b"{}".to_vec())),
        }
    }

    pub fn is_end_stream(&self) -> bool {
        self.flags & FLAG_END_STREAM != 0
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_u8(self.flags);
        buf.put_u32(self.payload.len() as u32);
        buf.put_slice(&self.payload);
        buf.freeze()
    }
}

/// Payload of the end-stream frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndStream {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ConnectError>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("compressed frames are not supported")]
    Compressed,

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: usize, max: usize },

    #[error("stream ended inside a frame ({buffered} bytes buffered)")]
    Truncated { buffered: usize },
}

/// Incremental decoder for a chunked frame stream
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    max_frame_len: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl FrameDecoder {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_frame_len,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete frame, or `None` until more bytes arrive
    pub fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }
        let flags = self.buf[0];
        let len = u32::from_be_bytes([self.buf[1], self.buf[2], self.buf[3], self.buf[4]]) as usize;
        if flags & FLAG_COMPRESSED != 0 {
            return Err(FrameError::Compressed);
        }
        if len > self.max_frame_len {
            return Err(FrameError::TooLarge {
                len,
                max: self.max_frame_len,
            });
        }
        if self.buf.len() < HEADER_LEN + len {
            return Ok(None);
        }

        self.buf.advance(HEADER_LEN);
        let payload = self.buf.split_to(len).freeze();
        Ok(Some(Frame { flags, payload }))
    }

    /// Check that nothing is left half-read
    pub fn finish(&self) -> Result<(), FrameError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(FrameError::Truncated {
                buffered: self.buf.len(),
            })
        }
    }
}

/// Decode a fully buffered body into frames
pub fn decode_all(body: &[u8]) -> Result<Vec<Frame>, FrameError> {
    let mut decoder = FrameDecoder::default();
    decoder.push(body);
    let mut frames = Vec::new();
    while let Some(frame) = decoder.next_frame()? {
        frames.push(frame);
    }
    decoder.finish()?;
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use error_types::Code;

    #[test]
    fn test_frame_layout() {
        let bytes = Frame::message(&b"{\"a\":1}"[..]).encode();
        assert_eq!(&bytes[..5], &[0, 0, 0, 0, 7]);
        assert_eq!(&bytes[5..], b"{\"a\":1}");
    }

    #[test]
    fn test_end_stream_payloads() {
        let ok = Frame::end_stream(&EndStream::default());
        assert!(ok.is_end_stream());
        assert_eq!(&ok.payload[..], b"{}");

        let failed = Frame::end_stream(&EndStream {
            error: Some(ConnectError::new(Code::NotFound, "gone")),
        });
        let json: serde_json::Value = serde_json::from_slice(&failed.payload).unwrap();
        assert_eq!(json, serde_json::json!({"error": {"code": "not_found", "message": "gone"}}));
    }

    #[test]
    fn test_decoder_handles_split_chunks() {
        let mut wire = Frame::message(&b"first"[..]).encode().to_vec();
        wire.extend_from_slice(&Frame::end_stream(&EndStream::default()).encode());

        let mut decoder = FrameDecoder::default();
        let mut frames = Vec::new();
        for chunk in wire.chunks(3) {
            decoder.push(chunk);
            while let Some(frame) = decoder.next_frame().unwrap() {
                frames.push(frame);
            }
        }

        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[0].payload[..], b"first");
        assert!(frames[1].is_end_stream());
        assert!(decoder.finish().is_ok());
    }

    #[test]
    fn test_decoder_rejects_bad_frames() {
        let mut decoder = FrameDecoder::new(4);
        decoder.push(&[0, 0, 0, 0, 9]);
        assert_eq!(
            decoder.next_frame(),
            Err(FrameError::TooLarge { len: 9, max: 4 })
        );

        let mut decoder = FrameDecoder::default();
        decoder.push(&[FLAG_COMPRESSED, 0, 0, 0, 1, 0]);
        assert_eq!(decoder.next_frame(), Err(FrameError::Compressed));

        assert_eq!(
            decode_all(&[0, 0, 0, 0, 3, b'a']),
            Err(FrameError::Truncated { buffered: 6 })
        );
    }
}
