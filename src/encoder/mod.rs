//! Real-time PCM to AAC encoding
//!
//! - [`media_codec`]: the buffer-exchange codec interface and its events
//! - [`streaming`]: [`StreamingEncoder`], which drives a codec from a worker
//!   thread and hands frames to async consumers
//! - [`loopback`]: pass-through codec used when no AAC encoder is built in
//! - `fdk` (feature `fdk`): software AAC-LC via fdk-aac

#[cfg(feature = "fdk")]
pub mod fdk;
pub mod loopback;
pub mod media_codec;
pub mod streaming;

pub use loopback::LoopbackCodec;
pub use media_codec::{BufferFlags, BufferInfo, CodecEvent, CodecKind, MediaCodec};
pub use streaming::{EncoderHandle, EncoderStats, FrameStream, StreamingEncoder};

use crate::codec::framing;

/// One ADTS-wrapped AAC access unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    /// 7-byte ADTS header followed by the access unit
    pub payload: Vec<u8>,
    /// Presentation time in microseconds since capture start
    pub presentation_time_us: u64,
}

impl EncodedFrame {
    /// Payload with the length header, ready for the media channel
    pub fn wire_bytes(&self) -> Vec<u8> {
        framing::encode_frame(&self.payload)
    }
}

/// Presentation timestamp derived from the PCM bytes consumed so far
///
/// `now_us = 1_000_000 * (total_bytes / 2) / sample_rate`. The divisor counts
/// 16-bit samples rather than interleaved frames, so with stereo input the
/// clock runs at twice the real rate. Clients depend on these timestamps, so
/// the accounting is kept as is.
#[derive(Debug, Clone)]
pub struct PresentationClock {
    sample_rate: u64,
    total_bytes: u64,
    now_us: u64,
}

impl PresentationClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: u64::from(sample_rate.max(1)),
            total_bytes: 0,
            now_us: 0,
        }
    }

    pub fn now_us(&self) -> u64 {
        self.now_us
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn advance(&mut self, bytes_read: usize) -> u64 {
        self.total_bytes += bytes_read as u64;
        self.now_us = 1_000_000 * (self.total_bytes / 2) / self.sample_rate;
        self.now_us
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_frame;

    #[test]
    fn test_clock_starts_at_zero() {
        let clock = PresentationClock::new(44100);
        assert_eq!(clock.now_us(), 0);
    }

    #[test]
    fn test_clock_counts_16_bit_samples() {
        let mut clock = PresentationClock::new(44100);
        // 88200 bytes = 44100 samples = one second regardless of channels
        assert_eq!(clock.advance(88_200), 1_000_000);
        assert_eq!(clock.advance(88_200), 2_000_000);
        assert_eq!(clock.total_bytes(), 176_400);
    }

    #[test]
    fn test_clock_is_non_decreasing_for_odd_reads() {
        let mut clock = PresentationClock::new(44100);
        let mut last = 0;
        for n in [1usize, 3, 7, 4095, 1, 2048] {
            let now = clock.advance(n);
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_wire_bytes_round_trip() {
        let frame = EncodedFrame {
            payload: vec![0xFF, 0xF1, 1, 2, 3, 4, 5, 6, 7],
            presentation_time_us: 0,
        };
        let wire = frame.wire_bytes();
        let (payload, rest) = decode_frame(&wire).unwrap();
        assert_eq!(payload, frame.payload.as_slice());
        assert!(rest.is_empty());
    }
}
