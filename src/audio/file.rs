use anyhow::{Context, Result};
use async_trait::async_trait;
use hound::{SampleFormat, WavReader};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use super::backend::{CaptureBackend, CaptureGrant};
use super::format::AudioFormatSpec;
use super::source::{pcm_channel, Feeder, PcmSource};
use crate::error::CaptureError;

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .context("Failed to open WAV file")?;

        let spec = reader.spec();
        if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
            anyhow::bail!(
                "Expected 16-bit integer PCM, got {}-bit {:?}",
                spec.bits_per_sample,
                spec.sample_format
            );
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds = samples.len() as f64 /
            (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Check the file against the capture format (no resampling is done)
    pub fn matches(&self, format: &AudioFormatSpec) -> bool {
        self.sample_rate == format.sample_rate() && self.channels == format.channels()
    }

    /// Interleaved little-endian PCM bytes
    pub fn pcm_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

const TICK: Duration = Duration::from_millis(20);

/// Capture backend replaying a WAV file in real time
///
/// The source closes at the end of the file, which ends the session.
pub struct WavFileCapture {
    path: PathBuf,
    pace: bool,
    feeder: Option<Feeder>,
}

impl WavFileCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pace: true,
            feeder: None,
        }
    }

    pub fn unpaced(mut self) -> Self {
        self.pace = false;
        self
    }
}

#[async_trait]
impl CaptureBackend for WavFileCapture {
    async fn start(
        &mut self,
        _grant: CaptureGrant,
        format: AudioFormatSpec,
    ) -> Result<Box<dyn PcmSource>, CaptureError> {
        if self.feeder.is_some() {
            return Err(CaptureError::Device("already capturing".to_string()));
        }

        let path = self.path.clone();
        let audio = tokio::task::spawn_blocking(move || AudioFile::open(path))
            .await
            .map_err(|e| CaptureError::Device(format!("WAV loader panicked: {}", e)))?
            .map_err(|e| CaptureError::Device(format!("{:#}", e)))?;

        if !audio.matches(&format) {
            return Err(CaptureError::UnsupportedFormat(format!(
                "{} is {}Hz/{}ch, capture format is {}Hz/{}ch",
                audio.path,
                audio.sample_rate,
                audio.channels,
                format.sample_rate(),
                format.channels()
            )));
        }

        let pcm = audio.pcm_bytes();
        let bytes_per_tick = format.bytes_per_second() * TICK.as_millis() as usize / 1000;
        let mut offset = 0;

        let (tx, source) = pcm_channel(64);
        let feeder = Feeder::spawn("wav-capture", tx, TICK, self.pace, move || {
            if offset >= pcm.len() {
                return None;
            }
            let end = (offset + bytes_per_tick).min(pcm.len());
            let chunk = pcm[offset..end].to_vec();
            offset = end;
            Some(chunk)
        })?;

        info!("WAV capture started: {}", self.path.display());
        self.feeder = Some(feeder);
        Ok(Box::new(source))
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        if let Some(mut feeder) = self.feeder.take() {
            feeder.stop();
            info!("WAV capture stopped");
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.feeder.is_some()
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}
