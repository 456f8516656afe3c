use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use super::media_codec::{BufferFlags, BufferInfo, CodecEvent, MediaCodec};
use crate::audio::AudioFormatSpec;
use crate::error::CodecError;

const DEFAULT_INPUT_CAPACITY: usize = 4096;
const DEFAULT_INPUT_BUFFERS: usize = 4;

/// Codec emitting each queued input buffer unchanged as one access unit
///
/// Follows the buffer-exchange protocol of a platform codec: a configuration
/// buffer first, then one output per queued input, carrying the input's
/// timestamp. Used where no AAC encoder is available and in tests.
pub struct LoopbackCodec {
    capacity: usize,
    free_inputs: VecDeque<usize>,
    outputs: VecDeque<CodecEvent>,
    outstanding_outputs: usize,
    next_output: usize,
    queued: usize,
    fail_after: Option<usize>,
    configured: bool,
    started: bool,
    failed: bool,
}

impl LoopbackCodec {
    pub fn new() -> Self {
        Self::with_buffers(DEFAULT_INPUT_BUFFERS, DEFAULT_INPUT_CAPACITY)
    }

    pub fn with_buffers(count: usize, capacity: usize) -> Self {
        Self {
            capacity,
            free_inputs: (0..count).collect(),
            outputs: VecDeque::new(),
            outstanding_outputs: 0,
            next_output: 0,
            queued: 0,
            fail_after: None,
            configured: false,
            started: false,
            failed: false,
        }
    }

    /// Raise a codec error once `inputs` buffers have been queued
    pub fn fail_after(mut self, inputs: usize) -> Self {
        self.fail_after = Some(inputs);
        self
    }

    fn push_output(&mut self, info: BufferInfo, data: Vec<u8>) {
        let index = self.next_output;
        self.next_output += 1;
        self.outstanding_outputs += 1;
        self.outputs
            .push_back(CodecEvent::OutputAvailable { index, info, data });
    }
}

impl Default for LoopbackCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaCodec for LoopbackCodec {
    fn name(&self) -> &str {
        "loopback"
    }

    fn configure(&mut self, format: &AudioFormatSpec) -> Result<(), CodecError> {
        if self.capacity < format.bytes_per_frame() {
            return Err(CodecError::Configure(format!(
                "input capacity {} is smaller than one sample frame",
                self.capacity
            )));
        }
        self.configured = true;
        Ok(())
    }

    fn start(&mut self) -> Result<(), CodecError> {
        if !self.configured {
            return Err(CodecError::Configure("start before configure".to_string()));
        }
        self.started = true;
        self.push_output(
            BufferInfo {
                size: 2,
                presentation_time_us: 0,
                flags: BufferFlags::CODEC_CONFIG,
            },
            vec![0x12, 0x10],
        );
        Ok(())
    }

    fn poll_event(&mut self, timeout: Duration) -> Option<CodecEvent> {
        if !self.started || self.failed {
            thread::sleep(timeout);
            return None;
        }

        if let Some(event) = self.outputs.pop_front() {
            return Some(event);
        }

        if self.fail_after.is_some_and(|limit| self.queued >= limit) {
            self.failed = true;
            return Some(CodecEvent::Error(CodecError::Internal(
                "injected codec failure".to_string(),
            )));
        }

        match self.free_inputs.pop_front() {
            Some(index) => Some(CodecEvent::InputAvailable {
                index,
                capacity: self.capacity,
            }),
            None => {
                thread::sleep(timeout);
                None
            }
        }
    }

    fn queue_input(
        &mut self,
        index: usize,
        data: &[u8],
        presentation_time_us: u64,
        flags: BufferFlags,
    ) -> Result<(), CodecError> {
        if data.len() > self.capacity {
            return Err(CodecError::Buffer {
                index,
                reason: format!("{} bytes exceed capacity {}", data.len(), self.capacity),
            });
        }

        self.queued += 1;
        self.push_output(
            BufferInfo {
                size: data.len(),
                presentation_time_us,
                flags,
            },
            data.to_vec(),
        );
        self.free_inputs.push_back(index);
        Ok(())
    }

    fn release_output(&mut self, index: usize) -> Result<(), CodecError> {
        if self.outstanding_outputs == 0 {
            return Err(CodecError::Buffer {
                index,
                reason: "no output buffer outstanding".to_string(),
            });
        }
        self.outstanding_outputs -= 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CodecError> {
        self.started = false;
        self.outputs.clear();
        Ok(())
    }
}
