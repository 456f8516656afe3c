// Integration tests for WAV file capture
//
// These tests write small WAV files with hound and verify that they load,
// are checked against the capture format, and replay as PCM.

use anyhow::Result;
use hound::{SampleFormat, WavSpec, WavWriter};
use sonic_audio_bridge::audio::{
    AudioCodec, AudioFile, AudioFormatSpec, CaptureBackend, CaptureGrant, WavFileCapture,
};
use sonic_audio_bridge::error::CaptureError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_wav(dir: &Path, name: &str, sample_rate: u32, channels: u16, frames: usize) -> PathBuf {
    let path = dir.join(name);
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(&path, spec).unwrap();
    for i in 0..frames * channels as usize {
        writer.write_sample((i % 1000) as i16).unwrap();
    }
    writer.finalize().unwrap();
    path
}

fn read_all(source: &mut dyn sonic_audio_bridge::PcmSource) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = source.read(&mut buf)?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&buf[..n]);
    }
}

#[test]
fn test_audio_file_open() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_wav(dir.path(), "tone.wav", 44100, 2, 4410);

    let audio = AudioFile::open(&path)?;

    assert_eq!(audio.sample_rate, 44100);
    assert_eq!(audio.channels, 2);
    assert_eq!(audio.samples.len(), 8820);
    assert!((audio.duration_seconds - 0.1).abs() < 0.001);
    assert!(audio.path.contains("tone.wav"));

    Ok(())
}

#[test]
fn test_audio_file_pcm_bytes_are_little_endian() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_wav(dir.path(), "short.wav", 44100, 1, 3);

    let audio = AudioFile::open(&path)?;
    assert_eq!(audio.pcm_bytes(), vec![0, 0, 1, 0, 2, 0]);

    Ok(())
}

#[test]
fn test_audio_file_nonexistent() {
    let path = PathBuf::from("/nonexistent/path/to/audio.wav");
    let result = AudioFile::open(&path);

    assert!(result.is_err(), "Opening nonexistent file should fail");
}

#[test]
fn test_audio_file_rejects_float_samples() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("float.wav");
    let spec = WavSpec {
        channels: 1,
        sample_rate: 44100,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(&path, spec)?;
    writer.write_sample(0.5f32)?;
    writer.finalize()?;

    assert!(AudioFile::open(&path).is_err());

    Ok(())
}

#[test]
fn test_audio_file_format_match() -> Result<()> {
    let dir = TempDir::new()?;
    let stereo = AudioFile::open(write_wav(dir.path(), "s.wav", 44100, 2, 10))?;
    let mono_48k = AudioFile::open(write_wav(dir.path(), "m.wav", 48000, 1, 10))?;

    let format = AudioFormatSpec::default();
    assert!(stereo.matches(&format));
    assert!(!mono_48k.matches(&format));

    let mono_format = AudioFormatSpec::new(48000, 1, 16, AudioCodec::AacLc, 64_000)?;
    assert!(mono_48k.matches(&mono_format));

    Ok(())
}

#[tokio::test]
async fn test_wav_capture_replays_whole_file() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_wav(dir.path(), "replay.wav", 44100, 2, 2205);

    let mut capture = WavFileCapture::new(&path).unpaced();
    assert_eq!(capture.name(), "wav-file");

    let mut source = capture
        .start(CaptureGrant::new("grant"), AudioFormatSpec::default())
        .await?;
    assert!(capture.is_capturing());

    let pcm = tokio::task::spawn_blocking(move || read_all(source.as_mut())).await??;
    assert_eq!(pcm.len(), 2205 * 4);
    assert_eq!(&pcm[..4], &[0, 0, 1, 0]);

    capture.stop().await?;
    assert!(!capture.is_capturing());

    Ok(())
}

#[tokio::test]
async fn test_wav_capture_rejects_format_mismatch() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_wav(dir.path(), "mono.wav", 22050, 1, 100);

    let mut capture = WavFileCapture::new(&path);
    let result = capture
        .start(CaptureGrant::new("grant"), AudioFormatSpec::default())
        .await;

    assert!(matches!(result, Err(CaptureError::UnsupportedFormat(_))));
    assert!(!capture.is_capturing());

    Ok(())
}
