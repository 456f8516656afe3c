// Length-prefixed framing for the media channel
//
// Every frame starts with a 32 byte header carrying the payload length as a
// string of binary digits, one digit per byte, most significant bit first and
// right-aligned. Each header byte stores the numeric value 0 or 1 (not the
// ASCII digit). Unused leading bytes stay zero.
//
//   +-----------------------------------+------------------+
//   | 32 bytes, one bit per byte (MSB)  | payload          |
//   +-----------------------------------+------------------+

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::FramingError;

/// Size of the bit-per-byte length header
pub const HEADER_LEN: usize = 32;

/// Default upper bound on a decoded payload
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Write the length header for a payload of `len` bytes into `header`
///
/// Lengths needing more than 32 binary digits keep only their low 32 bits.
pub fn encode_length(len: usize, header: &mut [u8; HEADER_LEN]) {
    header.fill(0);
    let bits = (len as u64) & u64::from(u32::MAX);
    for (i, slot) in header.iter_mut().rev().enumerate() {
        *slot = ((bits >> i) & 1) as u8;
    }
}

/// Prepend the length header to `payload`
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut header = [0u8; HEADER_LEN];
    encode_length(payload.len(), &mut header);

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(payload);
    frame
}

/// Reconstruct the payload length from a header
pub fn decode_length(header: &[u8]) -> Result<usize, FramingError> {
    if header.len() < HEADER_LEN {
        return Err(FramingError::ShortHeader {
            expected: HEADER_LEN,
            actual: header.len(),
        });
    }

    let mut len: u64 = 0;
    for (index, &value) in header[..HEADER_LEN].iter().enumerate() {
        if value > 1 {
            return Err(FramingError::InvalidHeaderByte { index, value });
        }
        len = (len << 1) | u64::from(value);
    }

    Ok(len as usize)
}

/// Split one frame off the front of `bytes`, returning the payload and the rest
pub fn decode_frame(bytes: &[u8]) -> Result<(&[u8], &[u8]), FramingError> {
    let len = decode_length(bytes)?;
    let body = &bytes[HEADER_LEN..];
    if body.len() < len {
        return Err(FramingError::Truncated {
            declared: len,
            available: body.len(),
        });
    }
    Ok(body.split_at(len))
}

/// Streaming codec for peers reading or writing the media channel
#[derive(Debug, Clone)]
pub struct BitLengthCodec {
    max_frame_len: usize,
}

impl BitLengthCodec {
    pub fn new() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}

impl Default for BitLengthCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for BitLengthCodec {
    type Item = Bytes;
    type Error = FramingError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        // Size is checked before reserving anything for the payload.
        let len = decode_length(&src[..HEADER_LEN])?;
        if len > self.max_frame_len {
            return Err(FramingError::FrameTooLarge {
                length: len,
                max: self.max_frame_len,
            });
        }

        if src.len() < HEADER_LEN + len {
            src.reserve(HEADER_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        Ok(Some(src.split_to(len).freeze()))
    }
}

impl Encoder<Bytes> for BitLengthCodec {
    type Error = FramingError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_frame_len {
            return Err(FramingError::FrameTooLarge {
                length: item.len(),
                max: self.max_frame_len,
            });
        }

        let mut header = [0u8; HEADER_LEN];
        encode_length(item.len(), &mut header);
        dst.reserve(HEADER_LEN + item.len());
        dst.put_slice(&header);
        dst.put_slice(&item);
        Ok(())
    }
}
