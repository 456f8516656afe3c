pub mod audio;
pub mod codec;
pub mod config;
pub mod encoder;
pub mod error;
pub mod manager;
pub mod session;
pub mod transport;

pub use audio::{
    AudioFile, AudioFormatSpec, CaptureBackend, CaptureBackendFactory, CaptureGrant,
    CaptureSource, PcmSource, SilenceCapture, WavFileCapture,
};
pub use codec::{AdtsHeader, BitLengthCodec};
pub use config::Config;
pub use encoder::{CodecKind, EncodedFrame, MediaCodec, StreamingEncoder};
pub use error::{ServiceError, TransportError};
pub use manager::{AppListService, ManagerService};
pub use session::{
    ControllerHandle, LogNotifier, SessionConfig, SessionController, SessionState, SessionStats,
    StartRequest,
};
pub use transport::{Endpoint, SocketNamespace};
