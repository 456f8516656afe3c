use serde::{Deserialize, Serialize};

use crate::error::CaptureError;

/// Sampling rates representable in an ADTS header, indexed by their
/// sampling-frequency index
pub const ADTS_SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Compressed output codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AudioCodec {
    /// AAC Low Complexity profile
    AacLc,
}

impl AudioCodec {
    /// MPEG-4 audio object type
    pub fn audio_object_type(self) -> u8 {
        match self {
            AudioCodec::AacLc => 2,
        }
    }
}

/// Capture and encoding format, fixed for the lifetime of a service
///
/// Fields are private so a value can only come from [`AudioFormatSpec::new`]
/// or [`Default`], both of which yield a validated format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormatSpec {
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
    codec: AudioCodec,
    bitrate: u32,
}

impl Default for AudioFormatSpec {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            bits_per_sample: 16,
            codec: AudioCodec::AacLc,
            bitrate: 196_000,
        }
    }
}

impl AudioFormatSpec {
    pub fn new(
        sample_rate: u32,
        channels: u16,
        bits_per_sample: u16,
        codec: AudioCodec,
        bitrate: u32,
    ) -> Result<Self, CaptureError> {
        if bits_per_sample != 16 {
            return Err(CaptureError::UnsupportedFormat(format!(
                "{}-bit PCM (only 16-bit is captured)",
                bits_per_sample
            )));
        }
        if !(1..=2).contains(&channels) {
            return Err(CaptureError::UnsupportedFormat(format!(
                "{} channels",
                channels
            )));
        }
        if !ADTS_SAMPLE_RATES.contains(&sample_rate) {
            return Err(CaptureError::UnsupportedFormat(format!(
                "{} Hz sample rate",
                sample_rate
            )));
        }
        if bitrate == 0 {
            return Err(CaptureError::UnsupportedFormat("zero bitrate".to_string()));
        }

        Ok(Self {
            sample_rate,
            channels,
            bits_per_sample,
            codec,
            bitrate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    pub fn codec(&self) -> AudioCodec {
        self.codec
    }

    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    /// Bytes occupied by one interleaved sample frame (all channels)
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }

    /// Bytes of PCM produced per second of capture
    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.bytes_per_frame()
    }

    /// ADTS sampling-frequency index of the sample rate
    pub fn sampling_frequency_index(&self) -> u8 {
        ADTS_SAMPLE_RATES
            .iter()
            .position(|&rate| rate == self.sample_rate)
            .unwrap_or(4) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_format() {
        let format = AudioFormatSpec::default();
        assert_eq!(format.sample_rate(), 44100);
        assert_eq!(format.channels(), 2);
        assert_eq!(format.bits_per_sample(), 16);
        assert_eq!(format.codec(), AudioCodec::AacLc);
        assert_eq!(format.bitrate(), 196_000);
        assert_eq!(format.bytes_per_frame(), 4);
        assert_eq!(format.bytes_per_second(), 176_400);
        assert_eq!(format.sampling_frequency_index(), 4);
    }

    #[test]
    fn test_rejects_unsupported_formats() {
        assert!(AudioFormatSpec::new(44100, 2, 24, AudioCodec::AacLc, 196_000).is_err());
        assert!(AudioFormatSpec::new(44100, 6, 16, AudioCodec::AacLc, 196_000).is_err());
        assert!(AudioFormatSpec::new(44000, 2, 16, AudioCodec::AacLc, 196_000).is_err());
        assert!(AudioFormatSpec::new(44100, 2, 16, AudioCodec::AacLc, 0).is_err());
    }

    #[test]
    fn test_custom_mono_format() {
        let format = AudioFormatSpec::new(48000, 1, 16, AudioCodec::AacLc, 64_000).unwrap();
        assert_eq!(format.bytes_per_frame(), 2);
        assert_eq!(format.sampling_frequency_index(), 3);
    }
}
