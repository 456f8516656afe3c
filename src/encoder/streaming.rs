use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::media_codec::{BufferFlags, CodecEvent, MediaCodec};
use super::{EncodedFrame, PresentationClock};
use crate::audio::{AudioFormatSpec, PcmSource};
use crate::codec::AdtsHeader;
use crate::error::EncoderError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Counters shared between the encoder worker and its owner
#[derive(Debug, Default)]
pub struct EncoderStats {
    frames: AtomicU64,
    frame_bytes: AtomicU64,
    pcm_bytes: AtomicU64,
    config_buffers: AtomicU64,
}

impl EncoderStats {
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn frame_bytes(&self) -> u64 {
        self.frame_bytes.load(Ordering::Relaxed)
    }

    pub fn pcm_bytes(&self) -> u64 {
        self.pcm_bytes.load(Ordering::Relaxed)
    }

    pub fn config_buffers(&self) -> u64 {
        self.config_buffers.load(Ordering::Relaxed)
    }
}

type FrameResult = Result<EncodedFrame, EncoderError>;

/// Receiving end of the encoder's frame sequence
pub struct FrameStream {
    rx: mpsc::Receiver<FrameResult>,
}

impl FrameStream {
    /// Next frame in emission order
    ///
    /// `None` once the worker has finished; an `Err` is always the last item.
    pub async fn next_frame(&mut self) -> Option<FrameResult> {
        self.rx.recv().await
    }
}

/// Control side of a running encoder
pub struct EncoderHandle {
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<EncoderStats>,
}

impl EncoderHandle {
    /// Stop scheduling new buffers; the buffer in flight is finished
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn stats(&self) -> Arc<EncoderStats> {
        Arc::clone(&self.stats)
    }

    /// Cancel and wait for the worker to exit
    ///
    /// A worker still blocked on its PCM source after the timeout is left
    /// detached; it exits as soon as the source closes.
    pub async fn stop(mut self) {
        self.cancel();
        let Some(worker) = self.worker.take() else {
            return;
        };

        let join = tokio::task::spawn_blocking(move || worker.join());
        match tokio::time::timeout(JOIN_TIMEOUT, join).await {
            Ok(Ok(Ok(()))) => debug!("Encoder worker joined"),
            Ok(Ok(Err(_))) => error!("Encoder worker panicked"),
            Ok(Err(e)) => error!("Encoder join task failed: {}", e),
            Err(_) => warn!("Encoder worker still blocked after {:?}", JOIN_TIMEOUT),
        }
    }
}

impl Drop for EncoderHandle {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

/// PCM to AAC encoder driven by a buffer-exchange codec on a worker thread
pub struct StreamingEncoder {
    frames: FrameStream,
    handle: EncoderHandle,
}

impl StreamingEncoder {
    /// Configure and start `codec`, then pull PCM from `source` on a
    /// dedicated thread
    pub fn start(
        format: AudioFormatSpec,
        mut codec: Box<dyn MediaCodec>,
        source: Box<dyn PcmSource>,
        depth: usize,
    ) -> Result<Self, EncoderError> {
        codec.configure(&format)?;
        codec.start()?;

        info!(
            "Encoder started: {} ({}Hz, {} channels, {} bps)",
            codec.name(),
            format.sample_rate(),
            format.channels(),
            format.bitrate()
        );

        let (tx, rx) = mpsc::channel(depth.max(1));
        let cancel = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(EncoderStats::default());
        let panic_tx = tx.clone();

        let worker = Worker {
            codec,
            source,
            adts: AdtsHeader::new(&format),
            clock: PresentationClock::new(format.sample_rate()),
            tx,
            cancel: Arc::clone(&cancel),
            stats: Arc::clone(&stats),
            input_closed: false,
            last_pts: 0,
            read_buf: Vec::new(),
        };

        let worker = thread::Builder::new()
            .name("audio-encoder".to_string())
            .spawn(move || {
                // A panic must not look like a clean end of stream
                let run = AssertUnwindSafe(move || worker.run());
                if let Err(payload) = panic::catch_unwind(run) {
                    let reason = panic_message(payload.as_ref());
                    error!("Encoder worker panicked: {}", reason);
                    let _ = panic_tx.blocking_send(Err(EncoderError::WorkerPanicked(reason)));
                }
            })
            .map_err(EncoderError::Spawn)?;

        Ok(Self {
            frames: FrameStream { rx },
            handle: EncoderHandle {
                cancel,
                worker: Some(worker),
                stats,
            },
        })
    }

    pub async fn next_frame(&mut self) -> Option<FrameResult> {
        self.frames.next_frame().await
    }

    pub fn stats(&self) -> Arc<EncoderStats> {
        self.handle.stats()
    }

    /// Separate the frame sequence from the stop control
    pub fn into_parts(self) -> (FrameStream, EncoderHandle) {
        (self.frames, self.handle)
    }

    pub async fn stop(self) {
        let (frames, handle) = self.into_parts();
        drop(frames);
        handle.stop().await;
    }
}

enum Step {
    Continue,
    Finished,
}

struct Worker {
    codec: Box<dyn MediaCodec>,
    source: Box<dyn PcmSource>,
    adts: AdtsHeader,
    clock: PresentationClock,
    tx: mpsc::Sender<FrameResult>,
    cancel: Arc<AtomicBool>,
    stats: Arc<EncoderStats>,
    input_closed: bool,
    last_pts: u64,
    read_buf: Vec<u8>,
}

impl Worker {
    fn run(mut self) {
        debug!("Encoder worker running");

        while !self.cancel.load(Ordering::SeqCst) {
            let Some(event) = self.codec.poll_event(POLL_INTERVAL) else {
                continue;
            };

            let step = match event {
                CodecEvent::InputAvailable { index, capacity } => self.on_input(index, capacity),
                CodecEvent::OutputAvailable { index, info, data } => {
                    self.on_output(index, info, data)
                }
                CodecEvent::Error(e) => {
                    error!("Codec error: {}", e);
                    self.emit(Err(EncoderError::Codec(e)));
                    Ok(Step::Finished)
                }
            };

            match step {
                Ok(Step::Continue) => {}
                Ok(Step::Finished) => break,
                Err(e) => {
                    error!("Encoder failed: {}", e);
                    self.emit(Err(e));
                    break;
                }
            }
        }

        if let Err(e) = self.codec.stop() {
            warn!("Failed to stop codec: {}", e);
        }
        info!(
            "Encoder worker stopped ({} frames, {} PCM bytes)",
            self.stats.frames(),
            self.stats.pcm_bytes()
        );
    }

    fn on_input(&mut self, index: usize, capacity: usize) -> Result<Step, EncoderError> {
        if self.input_closed {
            return Ok(Step::Continue);
        }

        self.read_buf.resize(capacity, 0);
        let read = self.source.read(&mut self.read_buf)?;
        let pts = self.clock.now_us();

        if read == 0 {
            // Closed source: no media this cycle, only the end-of-stream marker
            debug!("PCM source closed, flushing encoder");
            self.input_closed = true;
            self.codec
                .queue_input(index, &[], pts, BufferFlags::END_OF_STREAM)?;
            return Ok(Step::Continue);
        }

        self.codec
            .queue_input(index, &self.read_buf[..read], pts, BufferFlags::NONE)?;
        self.clock.advance(read);
        self.stats
            .pcm_bytes
            .fetch_add(read as u64, Ordering::Relaxed);
        Ok(Step::Continue)
    }

    fn on_output(
        &mut self,
        index: usize,
        info: super::media_codec::BufferInfo,
        data: Vec<u8>,
    ) -> Result<Step, EncoderError> {
        let mut step = Step::Continue;

        if info.flags.codec_config {
            info!("Codec configuration received ({} bytes)", data.len());
            self.stats.config_buffers.fetch_add(1, Ordering::Relaxed);
        } else if !data.is_empty() {
            let payload = match self.adts.wrap(&data) {
                Ok(payload) => payload,
                Err(e) => {
                    let _ = self.codec.release_output(index);
                    return Err(e.into());
                }
            };

            let pts = info.presentation_time_us.max(self.last_pts);
            self.last_pts = pts;

            let frame = EncodedFrame {
                payload,
                presentation_time_us: pts,
            };
            self.stats.frames.fetch_add(1, Ordering::Relaxed);
            self.stats
                .frame_bytes
                .fetch_add(frame.payload.len() as u64, Ordering::Relaxed);

            if !self.emit(Ok(frame)) {
                step = Step::Finished;
            }
        }

        if info.flags.end_of_stream {
            info!("Encoder reached end of stream");
            step = Step::Finished;
        }

        self.codec.release_output(index)?;
        Ok(step)
    }

    fn emit(&self, item: FrameResult) -> bool {
        if self.tx.blocking_send(item).is_err() {
            debug!("Frame consumer gone");
            return false;
        }
        true
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
