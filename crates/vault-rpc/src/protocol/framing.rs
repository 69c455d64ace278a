//! Message framing for the wire protocol.
//!
//! Every message travels as a 4-byte big-endian length followed by exactly
//! that many bytes of JSON:
//!
//! ```text
//! ┌──────────────┬──────────────────────┐
//! │ Length (L)   │ Payload              │
//! │ u32 BE       │ L bytes of JSON      │
//! └──────────────┴──────────────────────┘
//! ```

use crate::error::{Error, ProtocolError};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Maximum frame payload size (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Size of the length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Codec for encoding/decoding length-prefixed frames.
///
/// The decoder only ever yields whole frames: a partially received frame
/// stays in the read buffer and is never handed out.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a new frame codec.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    /// Create a codec with custom max frame size.
    #[must_use]
    pub const fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// The largest payload this codec accepts.
    #[must_use]
    pub const fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Reject payloads larger than the configured maximum.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FrameTooLarge`] if `len` exceeds the maximum.
    pub const fn check_len(&self, len: usize) -> Result<(), ProtocolError> {
        if len > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }
        Ok(())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if buf.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        // Parse header without consuming
        let mut header = &buf[..LENGTH_PREFIX_SIZE];
        let payload_len = header.get_u32() as usize;

        // Oversized frames fail before anything else is consumed
        self.check_len(payload_len)?;

        let frame_len = LENGTH_PREFIX_SIZE + payload_len;
        if buf.len() < frame_len {
            buf.reserve(frame_len - buf.len());
            return Ok(None);
        }

        buf.advance(LENGTH_PREFIX_SIZE);
        Ok(Some(buf.split_to(payload_len).freeze()))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None => Err(ProtocolError::TruncatedFrame {
                buffered: buf.len(),
            }
            .into()),
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, payload: Bytes, buf: &mut BytesMut) -> Result<(), Self::Error> {
        let payload_len = payload.len();
        self.check_len(payload_len)?;

        buf.reserve(LENGTH_PREFIX_SIZE + payload_len);

        #[allow(clippy::cast_possible_truncation)]
        buf.put_u32(payload_len as u32);
        buf.put(payload);

        Ok(())
    }
}
