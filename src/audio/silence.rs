use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::backend::{CaptureBackend, CaptureGrant};
use super::format::AudioFormatSpec;
use super::source::{pcm_channel, Feeder, PcmSource};
use crate::error::CaptureError;

const TICK: Duration = Duration::from_millis(20);

/// Capture backend producing zeroed PCM in real time
pub struct SilenceCapture {
    limit: Option<Duration>,
    pace: bool,
    feeder: Option<Feeder>,
}

impl SilenceCapture {
    pub fn new() -> Self {
        Self {
            limit: None,
            pace: true,
            feeder: None,
        }
    }

    /// Close the source after `limit` of audio has been produced
    pub fn with_limit(mut self, limit: Duration) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Produce audio as fast as the reader consumes it
    pub fn unpaced(mut self) -> Self {
        self.pace = false;
        self
    }
}

impl Default for SilenceCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureBackend for SilenceCapture {
    async fn start(
        &mut self,
        _grant: CaptureGrant,
        format: AudioFormatSpec,
    ) -> Result<Box<dyn PcmSource>, CaptureError> {
        if self.feeder.is_some() {
            return Err(CaptureError::Device("already capturing".to_string()));
        }

        let bytes_per_tick = format.bytes_per_second() * TICK.as_millis() as usize / 1000;
        let mut remaining = self.limit.map(|limit| {
            let frames = limit.as_micros() * format.sample_rate() as u128 / 1_000_000;
            frames as usize * format.bytes_per_frame()
        });

        info!(
            "Starting silence capture ({}Hz, {} channels)",
            format.sample_rate(),
            format.channels()
        );

        let (tx, source) = pcm_channel(64);
        let feeder = Feeder::spawn("silence-capture", tx, TICK, self.pace, move || {
            let len = match remaining {
                Some(0) => return None,
                Some(ref mut left) => {
                    let len = bytes_per_tick.min(*left);
                    *left -= len;
                    len
                }
                None => bytes_per_tick,
            };
            Some(vec![0u8; len])
        })?;

        self.feeder = Some(feeder);
        Ok(Box::new(source))
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        if let Some(mut feeder) = self.feeder.take() {
            feeder.stop();
            info!("Silence capture stopped");
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.feeder.is_some()
    }

    fn name(&self) -> &str {
        "silence"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limited_silence_produces_exact_byte_count() {
        let mut capture = SilenceCapture::new()
            .with_limit(Duration::from_millis(100))
            .unpaced();
        let format = AudioFormatSpec::default();
        let mut source = capture
            .start(CaptureGrant::new(b"grant".to_vec()), format)
            .await
            .unwrap();
        assert!(capture.is_capturing());

        let total = tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; 4096];
            let mut total = 0;
            loop {
                let n = source.read(&mut buf).unwrap();
                if n == 0 {
                    break total;
                }
                assert!(buf[..n].iter().all(|&b| b == 0));
                total += n;
            }
        })
        .await
        .unwrap();

        // 4410 frames * 4 bytes
        assert_eq!(total, 17_640);
        capture.stop().await.unwrap();
        assert!(!capture.is_capturing());
    }

    #[tokio::test]
    async fn test_double_start_is_rejected() {
        let mut capture = SilenceCapture::new();
        let format = AudioFormatSpec::default();
        let _source = capture
            .start(CaptureGrant::new(b"grant".to_vec()), format)
            .await
            .unwrap();
        assert!(capture
            .start(CaptureGrant::new(b"grant".to_vec()), format)
            .await
            .is_err());
        capture.stop().await.unwrap();
    }
}
