use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;

use super::file::WavFileCapture;
use super::format::AudioFormatSpec;
use super::silence::SilenceCapture;
use super::source::PcmSource;
use crate::error::CaptureError;

/// Authorization to capture system audio for one session
///
/// The token is issued by the platform capture broker and is opaque to this
/// crate; it is handed to the capture backend unchanged.
#[derive(Clone, PartialEq, Eq)]
pub struct CaptureGrant(Vec<u8>);

impl CaptureGrant {
    pub fn new(token: impl Into<Vec<u8>>) -> Self {
        Self(token.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for CaptureGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureGrant")
            .field("len", &self.0.len())
            .finish_non_exhaustive()
    }
}

/// System audio capture backend
///
/// Platform-specific implementations:
/// - Android: playback capture bound to a media projection grant
/// - Silence: zeroed PCM paced in real time (testing, dry runs)
/// - File: a WAV file in the session format
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Start capturing with the given grant
    ///
    /// Returns the PCM source the encoder reads from
    async fn start(
        &mut self,
        grant: CaptureGrant,
        format: AudioFormatSpec,
    ) -> Result<Box<dyn PcmSource>, CaptureError>;

    /// Release the capture handle and close the source
    async fn stop(&mut self) -> Result<(), CaptureError>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Capture input selection
#[derive(Debug, Clone)]
pub enum CaptureSource {
    /// Real-time silence
    Silence,
    /// WAV file input
    File(PathBuf),
}

/// Capture backend factory
pub struct CaptureBackendFactory;

impl CaptureBackendFactory {
    pub fn create(source: CaptureSource) -> Box<dyn CaptureBackend> {
        match source {
            CaptureSource::Silence => Box::new(SilenceCapture::new()),
            CaptureSource::File(path) => Box::new(WavFileCapture::new(path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_debug_hides_token() {
        let grant = CaptureGrant::new(b"secret-projection".to_vec());
        let rendered = format!("{:?}", grant);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("len"));
    }

    #[test]
    fn test_factory_names() {
        assert_eq!(CaptureBackendFactory::create(CaptureSource::Silence).name(), "silence");
        let file = CaptureBackendFactory::create(CaptureSource::File(PathBuf::from("x.wav")));
        assert_eq!(file.name(), "wav-file");
        assert!(!file.is_capturing());
    }
}
