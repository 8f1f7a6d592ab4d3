//! Newline-delimited JSON framing

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::messages::Frame;

/// Maximum frame size (16 MB)
const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Protocol codec error
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame is not a JSON object")]
    NotAnObject,

    #[error("Frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

/// Codec for [`Frame`] values, one JSON object per line
///
/// The same codec is used on both ends; the protocol is symmetric at the
/// framing level.
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Bytes already scanned for a newline in the current buffer
    next_index: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let newline = src[self.next_index..].iter().position(|b| *b == b'\n');

            let Some(offset) = newline else {
                if src.len() > MAX_FRAME_SIZE {
                    return Err(CodecError::FrameTooLarge {
                        size: src.len(),
                        max: MAX_FRAME_SIZE,
                    });
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let line_end = self.next_index + offset;
            self.next_index = 0;

            if line_end > MAX_FRAME_SIZE {
                return Err(CodecError::FrameTooLarge {
                    size: line_end,
                    max: MAX_FRAME_SIZE,
                });
            }

            let line = src.split_to(line_end + 1);
            let line = trim_line(&line[..line_end]);

            // Blank lines are keep-alive noise
            if line.is_empty() {
                continue;
            }

            return decode_frame(line).map(Some);
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }

        self.next_index = 0;
        let rest = buf.split();
        let line = trim_line(&rest);
        if line.is_empty() {
            return Ok(None);
        }
        decode_frame(line).map(Some)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item, dst)
    }
}

impl Encoder<&Frame> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: &Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(item, dst)
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && line[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    let mut start = 0;
    while start < end && line[start].is_ascii_whitespace() {
        start += 1;
    }
    &line[start..end]
}

/// Decode one line into a frame; the line must hold a JSON object
fn decode_frame(line: &[u8]) -> Result<Frame, CodecError> {
    let text = std::str::from_utf8(line).map_err(|_| CodecError::InvalidUtf8)?;
    let value: serde_json::Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(CodecError::NotAnObject);
    }
    Ok(serde_json::from_value(value)?)
}

/// Encode a frame as compact JSON followed by a newline
fn encode_frame(item: &Frame, dst: &mut BytesMut) -> Result<(), CodecError> {
    let data = serde_json::to_vec(item)?;

    if data.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge {
            size: data.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    dst.reserve(data.len() + 1);
    dst.put_slice(&data);
    dst.put_u8(b'\n');
    Ok(())
}
