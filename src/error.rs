// Error types for the capture, encoding and transport layers
//
// Each component reports its own error type; `ServiceError` aggregates them
// at the session boundary where every failure is turned into a stop.

use std::io;
use thiserror::Error;

/// Failures of the length-prefix framing codec
#[derive(Error, Debug)]
pub enum FramingError {
    #[error("frame header must be {expected} bytes, got {actual}")]
    ShortHeader { expected: usize, actual: usize },

    #[error("frame header byte {index} holds {value}, expected 0 or 1")]
    InvalidHeaderByte { index: usize, value: u8 },

    #[error("frame of {length} bytes exceeds the {max} byte limit")]
    FrameTooLarge { length: usize, max: usize },

    #[error("frame declares {declared} payload bytes but only {available} are present")]
    Truncated { declared: usize, available: usize },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Failures of the PCM capture path
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture grant is missing")]
    MissingGrant,

    #[error("capture device error: {0}")]
    Device(String),

    #[error("audio format not supported: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors reported by a platform media codec
#[derive(Error, Debug, Clone)]
pub enum CodecError {
    #[error("codec configuration failed: {0}")]
    Configure(String),

    #[error("codec rejected buffer {index}: {reason}")]
    Buffer { index: usize, reason: String },

    #[error("codec failure: {0}")]
    Internal(String),

    #[error("access unit of {length} bytes does not fit an ADTS frame (max {max})")]
    FrameTooLarge { length: usize, max: usize },
}

/// Errors surfaced by the streaming encoder to its consumer
#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("encoder worker could not be started: {0}")]
    Spawn(io::Error),

    #[error("encoder worker panicked: {0}")]
    WorkerPanicked(String),
}

/// Local socket transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("endpoint {name} is already bound")]
    AddrInUse { name: String },

    #[error("failed to bind endpoint {name}: {source}")]
    Bind { name: String, source: io::Error },

    #[error("accept failed: {0}")]
    Accept(io::Error),

    #[error("connection refused by {name}")]
    Refused { name: String },

    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Top-level service error
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("encoder error: {0}")]
    Encoder(#[from] EncoderError),

    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("privileged context unavailable: {0}")]
    Context(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ServiceError {
    /// Fatal startup errors abort the service without retry
    pub fn is_fatal_startup(&self) -> bool {
        matches!(
            self,
            Self::Transport(TransportError::AddrInUse { .. })
                | Self::Transport(TransportError::Bind { .. })
                | Self::Capture(CaptureError::MissingGrant)
                | Self::Context(_)
                | Self::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
