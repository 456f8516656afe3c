// Platform media codec abstraction
//
// Hardware and OS codecs hand buffers back and forth instead of taking
// samples in and returning packets: the codec offers an empty input buffer,
// the client fills and queues it, and later the codec offers a filled output
// buffer which the client must release. `MediaCodec` models that exchange as
// a stream of events polled from a single worker thread.

use std::time::Duration;

use crate::audio::AudioFormatSpec;
use crate::error::CodecError;

/// Flags attached to a codec buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferFlags {
    /// Buffer carries codec configuration (AudioSpecificConfig), not media
    pub codec_config: bool,
    /// Last buffer of the stream
    pub end_of_stream: bool,
}

impl BufferFlags {
    pub const NONE: BufferFlags = BufferFlags {
        codec_config: false,
        end_of_stream: false,
    };

    pub const CODEC_CONFIG: BufferFlags = BufferFlags {
        codec_config: true,
        end_of_stream: false,
    };

    pub const END_OF_STREAM: BufferFlags = BufferFlags {
        codec_config: false,
        end_of_stream: true,
    };
}

/// Metadata of a filled output buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    pub size: usize,
    pub presentation_time_us: u64,
    pub flags: BufferFlags,
}

/// Event raised by the codec
#[derive(Debug, Clone)]
pub enum CodecEvent {
    /// An empty input buffer of `capacity` bytes can be filled and queued
    InputAvailable { index: usize, capacity: usize },
    /// A filled output buffer must be consumed and released
    OutputAvailable {
        index: usize,
        info: BufferInfo,
        data: Vec<u8>,
    },
    /// The codec failed; no further events follow
    Error(CodecError),
}

/// Buffer-exchange encoder
pub trait MediaCodec: Send {
    fn name(&self) -> &str;

    fn configure(&mut self, format: &AudioFormatSpec) -> Result<(), CodecError>;

    fn start(&mut self) -> Result<(), CodecError>;

    /// Wait up to `timeout` for the next event
    fn poll_event(&mut self, timeout: Duration) -> Option<CodecEvent>;

    /// Submit `data` in the input buffer `index`
    fn queue_input(
        &mut self,
        index: usize,
        data: &[u8],
        presentation_time_us: u64,
        flags: BufferFlags,
    ) -> Result<(), CodecError>;

    /// Hand the output buffer `index` back to the codec
    fn release_output(&mut self, index: usize) -> Result<(), CodecError>;

    fn stop(&mut self) -> Result<(), CodecError>;
}

/// Codec implementation selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    /// Passes PCM through as access units
    Loopback,
    /// fdk-aac software AAC-LC encoder
    #[cfg(feature = "fdk")]
    FdkAac,
}

impl CodecKind {
    /// Best codec compiled into this build
    pub fn preferred() -> Self {
        #[cfg(feature = "fdk")]
        {
            CodecKind::FdkAac
        }

        #[cfg(not(feature = "fdk"))]
        {
            CodecKind::Loopback
        }
    }

    /// Whether the output is real AAC
    ///
    /// Loopback output carries raw PCM behind ADTS headers, which an AAC
    /// decoder cannot play.
    pub fn produces_aac(self) -> bool {
        match self {
            CodecKind::Loopback => false,
            #[cfg(feature = "fdk")]
            CodecKind::FdkAac => true,
        }
    }

    pub fn create(self) -> Box<dyn MediaCodec> {
        match self {
            CodecKind::Loopback => Box::new(super::loopback::LoopbackCodec::new()),
            #[cfg(feature = "fdk")]
            CodecKind::FdkAac => Box::new(super::fdk::FdkAacCodec::new()),
        }
    }
}
