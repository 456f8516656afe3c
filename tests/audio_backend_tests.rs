// Unit tests for capture backend abstractions
//
// These tests verify the format type, the capture factory and the silence
// backend through the public interface.

use anyhow::Result;
use sonic_audio_bridge::audio::{
    AudioCodec, AudioFormatSpec, CaptureBackend, CaptureBackendFactory, CaptureGrant,
    CaptureSource, SilenceCapture,
};
use sonic_audio_bridge::error::CaptureError;
use std::time::Duration;

#[test]
fn test_audio_format_default() {
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
fn test_audio_format_rejects_unsupported_values() {
    assert!(matches!(
        AudioFormatSpec::new(44100, 2, 24, AudioCodec::AacLc, 128_000),
        Err(CaptureError::UnsupportedFormat(_))
    ));
    assert!(AudioFormatSpec::new(44100, 6, 16, AudioCodec::AacLc, 128_000).is_err());
    assert!(AudioFormatSpec::new(44000, 2, 16, AudioCodec::AacLc, 128_000).is_err());
    assert!(AudioFormatSpec::new(44100, 2, 16, AudioCodec::AacLc, 0).is_err());
}

#[test]
fn test_audio_format_mono_48k() -> Result<()> {
    let format = AudioFormatSpec::new(48000, 1, 16, AudioCodec::AacLc, 64_000)?;

    assert_eq!(format.bytes_per_frame(), 2);
    assert_eq!(format.sampling_frequency_index(), 3);

    Ok(())
}

#[test]
fn test_capture_factory() {
    let silence = CaptureBackendFactory::create(CaptureSource::Silence);
    assert_eq!(silence.name(), "silence");
    assert!(!silence.is_capturing());

    let file = CaptureBackendFactory::create(CaptureSource::File("capture.wav".into()));
    assert_eq!(file.name(), "wav-file");
}

#[test]
fn test_capture_grant_bytes() {
    let grant = CaptureGrant::new("token");
    assert_eq!(grant.as_bytes(), b"token");
}

#[tokio::test]
async fn test_silence_stop_closes_source() -> Result<()> {
    let mut capture = SilenceCapture::new();
    let mut source = capture
        .start(CaptureGrant::new("grant"), AudioFormatSpec::default())
        .await?;

    capture.stop().await?;
    assert!(!capture.is_capturing());

    // Whatever was buffered drains, then the source reports end of input
    let drained = tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; 4096];
        loop {
            match source.read(&mut buf) {
                Ok(0) => return true,
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
    });
    assert!(tokio::time::timeout(Duration::from_secs(2), drained).await??);

    // Stopping twice is harmless
    capture.stop().await?;

    Ok(())
}
