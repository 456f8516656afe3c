// Software AAC-LC encoder backed by fdk-aac
//
// Wraps the synchronous encoder in the buffer-exchange protocol: a single
// input buffer is offered, each queued buffer is encoded immediately and the
// resulting access units are offered as output buffers.

use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use fdk_aac::enc::{AudioObjectType, BitRate, ChannelMode, Encoder, EncoderParams, Transport};
use tracing::debug;

use super::media_codec::{BufferFlags, BufferInfo, CodecEvent, MediaCodec};
use crate::audio::AudioFormatSpec;
use crate::error::CodecError;

/// Samples per channel in one AAC-LC access unit
const AAC_FRAME_SAMPLES: usize = 1024;

/// Upper bound on silent frames fed while flushing at end of stream
const MAX_FLUSH_FRAMES: usize = 8;

pub struct FdkAacCodec {
    encoder: Option<Encoder>,
    input_capacity: usize,
    input_free: bool,
    outputs: VecDeque<CodecEvent>,
    next_output: usize,
    output_buffer: Vec<u8>,
    config: Vec<u8>,
    channels: usize,
    delay: usize,
    samples_in: usize,
    units_out: usize,
    started: bool,
}

impl FdkAacCodec {
    pub fn new() -> Self {
        Self {
            encoder: None,
            input_capacity: 0,
            input_free: false,
            outputs: VecDeque::new(),
            next_output: 0,
            output_buffer: vec![0u8; 8192],
            config: Vec::new(),
            channels: 1,
            delay: 0,
            samples_in: 0,
            units_out: 0,
            started: false,
        }
    }

    /// Run interleaved samples through the encoder, collecting access units
    fn encode_samples(
        &mut self,
        index: usize,
        samples: &[i16],
    ) -> Result<Vec<Vec<u8>>, CodecError> {
        let encoder = self
            .encoder
            .as_ref()
            .ok_or_else(|| CodecError::Internal("codec not configured".to_string()))?;

        let mut access_units = Vec::new();
        let mut offset = 0;
        while offset < samples.len() {
            let info = encoder
                .encode(&samples[offset..], &mut self.output_buffer)
                .map_err(|e| CodecError::Buffer {
                    index,
                    reason: format!("{:?}", e),
                })?;
            if info.output_size > 0 {
                access_units.push(self.output_buffer[..info.output_size].to_vec());
            }
            if info.input_consumed == 0 {
                break;
            }
            offset += info.input_consumed;
        }

        self.samples_in += samples.len() / self.channels;
        self.units_out += access_units.len();
        Ok(access_units)
    }

    /// Feed silence until every real sample has come out of the encoder
    ///
    /// The encoder holds back `delay` samples plus any partial frame.
    fn flush(&mut self, index: usize) -> Result<Vec<Vec<u8>>, CodecError> {
        let fed = self.samples_in;
        let target = fed + self.delay;
        let silence = vec![0i16; AAC_FRAME_SAMPLES * self.channels];
        let mut access_units = Vec::new();

        for _ in 0..MAX_FLUSH_FRAMES {
            if self.units_out * AAC_FRAME_SAMPLES >= target {
                break;
            }
            access_units.extend(self.encode_samples(index, &silence)?);
        }
        // Padding is not input
        self.samples_in = fed;

        debug!("fdk-aac flushed {} access units", access_units.len());
        Ok(access_units)
    }

    fn push_output(&mut self, info: BufferInfo, data: Vec<u8>) {
        let index = self.next_output;
        self.next_output += 1;
        self.outputs
            .push_back(CodecEvent::OutputAvailable { index, info, data });
    }
}

impl Default for FdkAacCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaCodec for FdkAacCodec {
    fn name(&self) -> &str {
        "fdk-aac"
    }

    fn configure(&mut self, format: &AudioFormatSpec) -> Result<(), CodecError> {
        let channels = match format.channels() {
            1 => ChannelMode::Mono,
            2 => ChannelMode::Stereo,
            n => return Err(CodecError::Configure(format!("{} channels", n))),
        };

        let encoder = Encoder::new(EncoderParams {
            bit_rate: BitRate::Cbr(format.bitrate()),
            sample_rate: format.sample_rate(),
            transport: Transport::Raw,
            channels,
            audio_object_type: AudioObjectType::Mpeg4LowComplexity,
        })
        .map_err(|e| CodecError::Configure(format!("{:?}", e)))?;

        let info = encoder
            .info()
            .map_err(|e| CodecError::Configure(format!("{:?}", e)))?;
        self.config = info.confBuf[..info.confSize as usize].to_vec();
        self.delay = info.nDelay as usize;
        self.channels = format.channels() as usize;
        self.samples_in = 0;
        self.units_out = 0;

        self.input_capacity = AAC_FRAME_SAMPLES * format.bytes_per_frame();
        self.output_buffer = vec![0u8; 768 * format.channels() as usize * 2];
        self.encoder = Some(encoder);
        Ok(())
    }

    fn start(&mut self) -> Result<(), CodecError> {
        if self.encoder.is_none() {
            return Err(CodecError::Configure("start before configure".to_string()));
        }
        self.started = true;
        self.input_free = true;
        let config = self.config.clone();
        self.push_output(
            BufferInfo {
                size: config.len(),
                presentation_time_us: 0,
                flags: BufferFlags::CODEC_CONFIG,
            },
            config,
        );
        Ok(())
    }

    fn poll_event(&mut self, timeout: Duration) -> Option<CodecEvent> {
        if !self.started {
            thread::sleep(timeout);
            return None;
        }
        if let Some(event) = self.outputs.pop_front() {
            return Some(event);
        }
        if self.input_free {
            self.input_free = false;
            return Some(CodecEvent::InputAvailable {
                index: 0,
                capacity: self.input_capacity,
            });
        }
        thread::sleep(timeout);
        None
    }

    fn queue_input(
        &mut self,
        index: usize,
        data: &[u8],
        presentation_time_us: u64,
        flags: BufferFlags,
    ) -> Result<(), CodecError> {
        let samples: Vec<i16> = data
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        let mut access_units = self.encode_samples(index, &samples)?;
        if flags.end_of_stream {
            access_units.extend(self.flush(index)?);
        }

        debug!(
            "fdk-aac encoded {} samples into {} access units",
            samples.len(),
            access_units.len()
        );

        for unit in access_units {
            self.push_output(
                BufferInfo {
                    size: unit.len(),
                    presentation_time_us,
                    flags: BufferFlags::NONE,
                },
                unit,
            );
        }
        if flags.end_of_stream {
            self.push_output(
                BufferInfo {
                    size: 0,
                    presentation_time_us,
                    flags: BufferFlags::END_OF_STREAM,
                },
                Vec::new(),
            );
        }

        self.input_free = true;
        Ok(())
    }

    fn release_output(&mut self, _index: usize) -> Result<(), CodecError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CodecError> {
        self.started = false;
        self.outputs.clear();
        self.encoder = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(codec: &mut FdkAacCodec) -> (usize, bool) {
        let mut units = 0;
        let mut end = false;
        while let Some(event) = codec.poll_event(Duration::from_millis(1)) {
            match event {
                CodecEvent::OutputAvailable { info, .. } => {
                    if info.flags.end_of_stream {
                        end = true;
                    } else if !info.flags.codec_config {
                        units += 1;
                    }
                }
                CodecEvent::InputAvailable { .. } => break,
                CodecEvent::Error(e) => panic!("codec error: {}", e),
            }
        }
        (units, end)
    }

    #[test]
    fn test_end_of_stream_flushes_buffered_samples() {
        let mut codec = FdkAacCodec::new();
        codec.configure(&AudioFormatSpec::default()).unwrap();
        codec.start().unwrap();
        let (_, end) = drain(&mut codec);
        assert!(!end);

        // 3000 stereo frames, not a multiple of the AAC frame size
        let pcm = vec![0u8; 3000 * 4];
        codec.queue_input(0, &pcm, 0, BufferFlags::NONE).unwrap();
        let (early, _) = drain(&mut codec);

        codec
            .queue_input(0, &[], 68_027, BufferFlags::END_OF_STREAM)
            .unwrap();
        let (late, end) = drain(&mut codec);

        assert!(end);
        let expected = (3000 + codec.delay).div_ceil(AAC_FRAME_SAMPLES);
        assert!(early + late >= expected);
        assert!(late > 0);
    }
}
