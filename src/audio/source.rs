use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::CaptureError;

/// Blocking reader of fixed-format PCM bytes
///
/// `read` blocks until at least one byte is available or the source is
/// closed. `Ok(0)` means the source is closed and will not produce more data.
pub trait PcmSource: Send {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError>;
}

type PcmChunk = Result<Vec<u8>, CaptureError>;

/// Create a connected sender / source pair
pub fn pcm_channel(capacity: usize) -> (PcmSender, ChannelPcmSource) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        PcmSender { tx },
        ChannelPcmSource {
            rx,
            pending: Vec::new(),
            offset: 0,
        },
    )
}

/// Producer side of a [`ChannelPcmSource`]
///
/// Dropping every sender closes the source.
#[derive(Clone)]
pub struct PcmSender {
    tx: mpsc::Sender<PcmChunk>,
}

impl PcmSender {
    pub async fn send(&self, pcm: Vec<u8>) -> bool {
        self.tx.send(Ok(pcm)).await.is_ok()
    }

    /// Send from a thread outside the async runtime
    pub fn blocking_send(&self, pcm: Vec<u8>) -> bool {
        self.tx.blocking_send(Ok(pcm)).is_ok()
    }

    /// Report a device failure to the reader
    pub fn blocking_fail(&self, err: CaptureError) -> bool {
        self.tx.blocking_send(Err(err)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// PCM source fed through a channel by a capture thread
pub struct ChannelPcmSource {
    rx: mpsc::Receiver<PcmChunk>,
    pending: Vec<u8>,
    offset: usize,
}

impl PcmSource for ChannelPcmSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.offset >= self.pending.len() {
            match self.rx.blocking_recv() {
                Some(Ok(chunk)) => {
                    self.pending = chunk;
                    self.offset = 0;
                }
                Some(Err(e)) => return Err(e),
                None => return Ok(0),
            }
        }

        let available = &self.pending[self.offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.offset += n;
        Ok(n)
    }
}

/// Background thread pushing generated PCM into a channel
///
/// `next_chunk` is called once per tick and returns `None` when the input is
/// exhausted, which closes the source. With `pace` set, chunks are released
/// no faster than real time.
pub(crate) struct Feeder {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Feeder {
    pub(crate) fn spawn<F>(
        name: &str,
        sender: PcmSender,
        tick: Duration,
        pace: bool,
        mut next_chunk: F,
    ) -> Result<Self, CaptureError>
    where
        F: FnMut() -> Option<Vec<u8>> + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let started = Instant::now();
                let mut ticks: u32 = 0;

                while !stop_flag.load(Ordering::SeqCst) {
                    if pace {
                        let due = started + tick * ticks;
                        let now = Instant::now();
                        if due > now {
                            thread::sleep(due - now);
                        }
                    }

                    let Some(chunk) = next_chunk() else {
                        debug!("Capture input exhausted");
                        break;
                    };
                    if !sender.blocking_send(chunk) {
                        debug!("Capture reader dropped");
                        break;
                    }
                    ticks = ticks.saturating_add(1);
                }
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Ask the thread to finish; the source closes once it exits
    pub(crate) fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // A thread blocked on a full channel only exits once the reader is
        // gone, so it is detached rather than joined.
        if let Some(handle) = self.handle.take() {
            if handle.is_finished() {
                if handle.join().is_err() {
                    warn!("Capture thread panicked");
                }
            }
        }
    }
}

impl Drop for Feeder {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_source_splits_chunks_across_reads() {
        let (tx, mut source) = pcm_channel(4);
        assert!(tx.blocking_send(vec![1, 2, 3, 4, 5]));
        drop(tx);

        let mut buf = [0u8; 3];
        assert_eq!(source.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(source.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
        assert_eq!(source.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_channel_source_skips_empty_chunks() {
        let (tx, mut source) = pcm_channel(4);
        assert!(tx.blocking_send(Vec::new()));
        assert!(tx.blocking_send(vec![9]));

        let mut buf = [0u8; 8];
        assert_eq!(source.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 9);
    }

    #[test]
    fn test_channel_source_surfaces_device_error() {
        let (tx, mut source) = pcm_channel(4);
        assert!(tx.blocking_fail(CaptureError::Device("unplugged".to_string())));

        let mut buf = [0u8; 8];
        assert!(matches!(source.read(&mut buf), Err(CaptureError::Device(_))));
    }

    #[test]
    fn test_feeder_closes_source_when_exhausted() {
        let (tx, mut source) = pcm_channel(4);
        let mut remaining = 3;
        let _feeder = Feeder::spawn("test-feeder", tx, Duration::from_millis(1), false, move || {
            if remaining == 0 {
                return None;
            }
            remaining -= 1;
            Some(vec![0u8; 10])
        })
        .unwrap();

        let mut total = 0;
        let mut buf = [0u8; 16];
        loop {
            let n = source.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            total += n;
        }
        assert_eq!(total, 30);
    }
}
