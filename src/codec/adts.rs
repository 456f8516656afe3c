// ADTS transport header for raw AAC access units
//
// Layout of the 7 byte header (no CRC):
//   syncword(12) id(1) layer(2) protection_absent(1)
//   profile(2) sf_index(4) private(1) channel_config(3)
//   original(1) home(1) copyright_id(1) copyright_start(1)
//   frame_length(13) buffer_fullness(11) raw_blocks(2)

use crate::audio::AudioFormatSpec;
use crate::error::CodecError;

pub const ADTS_HEADER_LEN: usize = 7;

/// Largest frame length the 13-bit field can carry
pub const MAX_ADTS_FRAME_LEN: usize = (1 << 13) - 1;

/// Precomputed header fields for one audio format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    profile: u8,
    sampling_frequency_index: u8,
    channel_config: u8,
}

impl AdtsHeader {
    pub fn new(format: &AudioFormatSpec) -> Self {
        Self {
            profile: format.codec().audio_object_type() - 1,
            sampling_frequency_index: format.sampling_frequency_index(),
            channel_config: format.channels() as u8,
        }
    }

    /// Fill `out` with the header for a frame of `frame_len` bytes,
    /// header included
    ///
    /// Fails if the length does not fit the 13-bit field.
    pub fn write(
        &self,
        out: &mut [u8; ADTS_HEADER_LEN],
        frame_len: usize,
    ) -> Result<(), CodecError> {
        if frame_len > MAX_ADTS_FRAME_LEN {
            return Err(CodecError::FrameTooLarge {
                length: frame_len,
                max: MAX_ADTS_FRAME_LEN,
            });
        }
        let len = frame_len;

        out[0] = 0xFF;
        out[1] = 0xF1;
        out[2] = (self.profile << 6)
            | (self.sampling_frequency_index << 2)
            | (self.channel_config >> 2);
        out[3] = ((self.channel_config & 0x3) << 6) | (len >> 11) as u8;
        out[4] = ((len & 0x7FF) >> 3) as u8;
        out[5] = (((len & 0x7) << 5) as u8) | 0x1F;
        out[6] = 0xFC;
        Ok(())
    }

    /// Build a complete ADTS frame around one access unit
    pub fn wrap(&self, access_unit: &[u8]) -> Result<Vec<u8>, CodecError> {
        let frame_len = ADTS_HEADER_LEN + access_unit.len();
        let mut header = [0u8; ADTS_HEADER_LEN];
        self.write(&mut header, frame_len)?;

        let mut frame = Vec::with_capacity(frame_len);
        frame.extend_from_slice(&header);
        frame.extend_from_slice(access_unit);
        Ok(frame)
    }
}

/// Frame length recorded in an ADTS header
pub fn frame_length(header: &[u8]) -> Option<usize> {
    if header.len() < ADTS_HEADER_LEN || header[0] != 0xFF || header[1] & 0xF0 != 0xF0 {
        return None;
    }
    Some(
        ((header[3] as usize & 0x3) << 11)
            | ((header[4] as usize) << 3)
            | ((header[5] as usize) >> 5),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_for_default_format() {
        let adts = AdtsHeader::new(&AudioFormatSpec::default());
        let frame = adts.wrap(&[0u8; 100]).unwrap();

        assert_eq!(frame.len(), 107);
        // AAC-LC, 44.1kHz (index 4), stereo
        assert_eq!(&frame[..3], &[0xFF, 0xF1, 0x50]);
        assert_eq!(frame[3] >> 6, 2);
        assert_eq!(frame[6], 0xFC);
        assert_eq!(frame_length(&frame), Some(107));
    }

    #[test]
    fn test_frame_length_spans_byte_boundaries() {
        let adts = AdtsHeader::new(&AudioFormatSpec::default());
        let mut header = [0u8; ADTS_HEADER_LEN];
        adts.write(&mut header, 0x1ABC).unwrap();
        assert_eq!(frame_length(&header), Some(0x1ABC));
    }

    #[test]
    fn test_largest_access_unit_fits() {
        let adts = AdtsHeader::new(&AudioFormatSpec::default());
        let frame = adts
            .wrap(&vec![0u8; MAX_ADTS_FRAME_LEN - ADTS_HEADER_LEN])
            .unwrap();
        assert_eq!(frame_length(&frame), Some(MAX_ADTS_FRAME_LEN));
    }

    #[test]
    fn test_oversized_access_unit_is_rejected() {
        let adts = AdtsHeader::new(&AudioFormatSpec::default());
        match adts.wrap(&[0u8; 9000]) {
            Err(CodecError::FrameTooLarge { length, max }) => {
                assert_eq!(length, 9007);
                assert_eq!(max, MAX_ADTS_FRAME_LEN);
            }
            other => panic!("expected FrameTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_frame_length_rejects_missing_sync() {
        assert_eq!(frame_length(&[0u8; 7]), None);
        assert_eq!(frame_length(&[0xFF, 0xF1]), None);
    }
}
