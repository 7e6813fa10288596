//! Length-prefixed framing for JSON-RPC messages.
//!
//! Frame format:
//! ```text
//! +----------------+------------------+
//! |  4 bytes       |  N bytes         |
//! |  (length BE)   |  (JSON payload)  |
//! +----------------+------------------+
//! ```

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol::Message;

/// Default upper bound on a single frame (16 MB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const LENGTH_PREFIX_SIZE: usize = 4;

/// Codec for length-prefixed JSON-RPC messages.
#[derive(Debug)]
pub struct MessageCodec {
    max_frame_len: usize,
    pending_len: Option<usize>,
}

impl MessageCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    /// Codec that rejects frames larger than `max_frame_len` bytes in either direction.
    #[must_use]
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            max_frame_len: max_frame_len.min(u32::MAX as usize),
            pending_len: None,
        }
    }

    #[must_use]
    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let frame_len = match self.pending_len {
            Some(len) => len,
            None => {
                if src.len() < LENGTH_PREFIX_SIZE {
                    return Ok(None);
                }
                let len = src.get_u32() as usize;
                if len > self.max_frame_len {
                    return Err(CodecError::FrameTooLarge {
                        len,
                        max: self.max_frame_len,
                    });
                }
                self.pending_len = Some(len);
                len
            }
        };

        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let payload = src.split_to(frame_len);
        self.pending_len = None;

        let text = std::str::from_utf8(&payload)?;
        Ok(Some(serde_json::from_str(text)?))
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = CodecError;

    // Frame length is bounded by max_frame_len, which never exceeds u32::MAX
    #[allow(clippy::cast_possible_truncation)]
    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(&item)?;

        if payload.len() > self.max_frame_len {
            return Err(CodecError::FrameTooLarge {
                len: payload.len(),
                max: self.max_frame_len,
            });
        }

        dst.reserve(LENGTH_PREFIX_SIZE + payload.len());
        dst.put_u32(payload.len() as u32);
        dst.put_slice(&payload);
        Ok(())
    }
}

/// Errors that can occur while framing messages
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Frame too large: {len} bytes (max: {max})")]
    FrameTooLarge { len: usize, max: usize },
}
