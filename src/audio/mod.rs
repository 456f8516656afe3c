pub mod backend;
pub mod file;
pub mod format;
pub mod silence;
pub mod source;

pub use backend::{CaptureBackend, CaptureBackendFactory, CaptureGrant, CaptureSource};
pub use file::{AudioFile, WavFileCapture};
pub use format::{AudioCodec, AudioFormatSpec};
pub use silence::SilenceCapture;
pub use source::{pcm_channel, ChannelPcmSource, PcmSender, PcmSource};
