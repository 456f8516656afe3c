use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::{ControlTokens, SessionConfig};
use super::control::ControlMessage;
use super::notifier::{ServiceStatus, StatusNotifier};
use super::state::{SessionState, StopReason};
use super::stats::SessionStats;
use crate::audio::{CaptureBackend, CaptureGrant};
use crate::encoder::{EncoderHandle, EncoderStats, FrameStream, MediaCodec, StreamingEncoder};
use crate::error::{CaptureError, EncoderError, ServiceError, TransportError};
use crate::transport::{
    Connection, ConnectionReader, LocalServer, SessionTransport, SharedWriter, CONTROL_CHUNK_LEN,
};

const EVENT_QUEUE_DEPTH: usize = 64;

/// How the host asked the service to start
#[derive(Debug, Clone)]
pub enum StartRequest {
    /// Begin capture; `None` when the host delivered no grant
    Record { grant: Option<CaptureGrant> },
    /// Stop action delivered as the start request
    Stop,
}

impl StartRequest {
    pub fn record(grant: CaptureGrant) -> Self {
        StartRequest::Record { grant: Some(grant) }
    }
}

/// Everything that can change session state, delivered through one queue
pub(crate) enum ControlEvent {
    ClientConnected(Connection),
    AcceptFailed(TransportError),
    ConnectTimeout,
    Command(ControlMessage),
    PeerClosed,
    ReadFailed(io::Error),
    EncoderFailed(EncoderError),
    EncoderFinished,
    WriteFailed(io::Error),
    StopRequested,
}

#[derive(Debug, Default)]
struct MediaCounters {
    frames_sent: AtomicU64,
    bytes_sent: AtomicU64,
    frames_dropped: AtomicU64,
}

/// Cloneable handle for stopping and observing a running session
#[derive(Clone)]
pub struct ControllerHandle {
    events: mpsc::Sender<ControlEvent>,
    state: watch::Receiver<SessionState>,
}

impl ControllerHandle {
    /// Request an orderly stop; false if the session is already gone
    pub async fn stop(&self) -> bool {
        self.events.send(ControlEvent::StopRequested).await.is_ok()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Wait until the session reaches `target` or closes
    pub async fn wait_for(&mut self, target: SessionState) -> SessionState {
        match self
            .state
            .wait_for(|state| *state == target || state.is_terminal())
            .await
        {
            Ok(state) => *state,
            Err(_) => SessionState::Closed,
        }
    }
}

/// Drives one audio session from start request to close
///
/// All state changes happen on the task that calls [`start`](Self::start)
/// and [`run`](Self::run). Socket, timer and encoder tasks only post
/// [`ControlEvent`]s, so a timeout and a connect arriving together are
/// handled in queue order and never both take effect.
pub struct SessionController {
    config: SessionConfig,
    capture: Box<dyn CaptureBackend>,
    codec: Option<Box<dyn MediaCodec>>,
    notifier: Arc<dyn StatusNotifier>,

    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    events_tx: mpsc::Sender<ControlEvent>,
    events_rx: mpsc::Receiver<ControlEvent>,

    transport: Option<SessionTransport>,
    encoder: Option<EncoderHandle>,
    encoder_stats: Option<Arc<EncoderStats>>,
    timer: Option<JoinHandle<()>>,
    capture_active: bool,

    counters: Arc<MediaCounters>,
    started_at: DateTime<Utc>,
    connected_at: Option<DateTime<Utc>>,
    end_reason: Option<StopReason>,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        capture: Box<dyn CaptureBackend>,
        codec: Box<dyn MediaCodec>,
        notifier: Arc<dyn StatusNotifier>,
    ) -> Self {
        info!("Creating audio session: {}", config.session_id);

        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (state_tx, _) = watch::channel(SessionState::Idle);

        Self {
            config,
            capture,
            codec: Some(codec),
            notifier,
            state: SessionState::Idle,
            state_tx,
            events_tx,
            events_rx,
            transport: None,
            encoder: None,
            encoder_stats: None,
            timer: None,
            capture_active: false,
            counters: Arc::new(MediaCounters::default()),
            started_at: Utc::now(),
            connected_at: None,
            end_reason: None,
        }
    }

    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            events: self.events_tx.clone(),
            state: self.state_tx.subscribe(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Handle the start request
    ///
    /// On success the session is `AwaitingConnection`: the endpoint is bound,
    /// capture and encoder are running and the connect timer is armed. A stop
    /// request or a missing grant closes the session without binding
    /// anything. Startup failures release whatever was acquired and close.
    pub async fn start(&mut self, request: StartRequest) -> Result<(), ServiceError> {
        if self.state != SessionState::Idle {
            return Err(ServiceError::Config(format!(
                "session {} already started",
                self.config.session_id
            )));
        }

        let grant = match request {
            StartRequest::Stop => {
                info!("Stop requested before start");
                self.close_unstarted(StopReason::StopRequested);
                return Ok(());
            }
            StartRequest::Record { grant: None } => {
                error!("Failed to capture audio: no capture grant");
                let err = CaptureError::MissingGrant;
                self.close_unstarted(StopReason::Rejected(err.to_string()));
                return Err(err.into());
            }
            StartRequest::Record { grant: Some(grant) } => grant,
        };

        info!("Starting audio session: {}", self.config.session_id);

        let server = match LocalServer::listen(&self.config.endpoint) {
            Ok(server) => server,
            Err(e) => {
                error!("Failed to bind {}: {}", self.config.endpoint, e);
                self.close_unstarted(StopReason::Rejected(e.to_string()));
                return Err(e.into());
            }
        };

        if let Err(e) = self.launch(server, grant).await {
            error!("Failed to start audio session: {}", e);
            self.shutdown(StopReason::Rejected(e.to_string())).await;
            return Err(e);
        }

        self.notifier.show(ServiceStatus::WaitingForConnection);
        self.transition(SessionState::AwaitingConnection);
        Ok(())
    }

    /// Process events until the session closes
    pub async fn run(mut self) -> SessionStats {
        while !self.state.is_terminal() {
            let Some(event) = self.events_rx.recv().await else {
                break;
            };
            self.handle_event(event).await;
        }

        let stats = self.stats();
        info!(
            "Session {} closed after {:.1}s: {} frames, {} bytes sent",
            stats.session_id, stats.duration_secs, stats.frames_sent, stats.bytes_sent
        );
        stats
    }

    /// Get current session statistics
    pub fn stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);

        SessionStats {
            session_id: self.config.session_id.clone(),
            state: self.state,
            started_at: self.started_at,
            connected_at: self.connected_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            frames_sent: self.counters.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.counters.bytes_sent.load(Ordering::Relaxed),
            frames_dropped: self.counters.frames_dropped.load(Ordering::Relaxed),
            pcm_bytes: self
                .encoder_stats
                .as_ref()
                .map(|stats| stats.pcm_bytes())
                .unwrap_or(0),
            end_reason: self.end_reason.clone(),
        }
    }

    async fn launch(&mut self, server: LocalServer, grant: CaptureGrant) -> Result<(), ServiceError> {
        let format = self.config.format;

        let source = self.capture.start(grant, format).await?;
        self.capture_active = true;
        info!("Capture started via {}", self.capture.name());

        let codec = self
            .codec
            .take()
            .ok_or_else(|| ServiceError::Config("codec already consumed".to_string()))?;
        let encoder =
            StreamingEncoder::start(format, codec, source, self.config.frame_queue_depth)?;
        let (frames, handle) = encoder.into_parts();
        self.encoder_stats = Some(handle.stats());
        self.encoder = Some(handle);

        let mut transport = SessionTransport::new(self.config.endpoint.clone());
        transport.track(tokio::spawn(pump_frames(
            frames,
            transport.writer(),
            self.events_tx.clone(),
            Arc::clone(&self.counters),
        )));
        transport.track(tokio::spawn(accept_client(server, self.events_tx.clone())));
        self.transport = Some(transport);

        self.arm_timer();
        Ok(())
    }

    fn arm_timer(&mut self) {
        let events = self.events_tx.clone();
        let timeout = self.config.connect_timeout;

        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events.send(ControlEvent::ConnectTimeout).await;
        }));
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    async fn handle_event(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::ClientConnected(connection) => self.on_client_connected(connection).await,
            ControlEvent::ConnectTimeout => {
                // An aborted timer may already have queued its event
                if self.state == SessionState::AwaitingConnection && self.timer.take().is_some() {
                    info!(
                        "No client connected within {:?}",
                        self.config.connect_timeout
                    );
                    self.shutdown(StopReason::ConnectTimeout).await;
                } else {
                    debug!("Stale connect timeout ignored");
                }
            }
            ControlEvent::Command(message) => match message {
                ControlMessage::Stop => {
                    info!("Stop token received");
                    self.shutdown(StopReason::StopToken).await;
                }
                ControlMessage::Unknown(token) => warn!("Unknown control token: {:?}", token),
                other => info!("Ignoring {:?} on the audio channel", other),
            },
            ControlEvent::PeerClosed => {
                info!("Client disconnected");
                self.shutdown(StopReason::PeerClosed).await;
            }
            ControlEvent::ReadFailed(e) => {
                warn!("Control read failed: {}", e);
                self.shutdown(StopReason::ReadFailed(e.to_string())).await;
            }
            ControlEvent::EncoderFailed(e) => {
                error!("Encoder failed: {}", e);
                self.shutdown(StopReason::EncoderError(e.to_string())).await;
            }
            ControlEvent::EncoderFinished => {
                info!("Audio source ended");
                self.shutdown(StopReason::EncoderFinished).await;
            }
            ControlEvent::WriteFailed(e) => {
                warn!("Failed to write frame: {}", e);
                self.shutdown(StopReason::WriteFailed(e.to_string())).await;
            }
            ControlEvent::AcceptFailed(e) => {
                error!("Accept failed: {}", e);
                self.shutdown(StopReason::AcceptFailed(e.to_string())).await;
            }
            ControlEvent::StopRequested => {
                info!("Stop requested");
                self.shutdown(StopReason::StopRequested).await;
            }
        }
    }

    async fn on_client_connected(&mut self, connection: Connection) {
        if self.state != SessionState::AwaitingConnection {
            debug!("Dropping connection that arrived in state {}", self.state);
            return;
        }

        self.cancel_timer();

        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        let (reader, writer) = connection.into_split();
        transport.writer().attach(writer).await;
        transport.track(tokio::spawn(read_control(
            reader,
            self.config.tokens.clone(),
            self.events_tx.clone(),
        )));

        self.connected_at = Some(Utc::now());
        self.notifier.show(ServiceStatus::Forwarding);
        self.transition(SessionState::Streaming);
    }

    /// Close a session that never acquired any resources
    fn close_unstarted(&mut self, reason: StopReason) {
        self.end_reason = Some(reason);
        self.notifier.clear();
        self.transition(SessionState::Closed);
    }

    /// Release everything in order; later stop causes are no-ops
    async fn shutdown(&mut self, reason: StopReason) {
        if self.state.is_shutting_down() {
            return;
        }

        info!("Stopping session {}: {:?}", self.config.session_id, reason);
        self.end_reason = Some(reason);
        self.transition(SessionState::Stopping);

        self.cancel_timer();

        if let Some(encoder) = &self.encoder {
            encoder.cancel();
        }

        // Stopping capture closes the PCM source, which unblocks the encoder
        if self.capture_active {
            self.capture_active = false;
            if let Err(e) = self.capture.stop().await {
                warn!("Failed to release capture: {}", e);
            }
        }

        if let Some(transport) = self.transport.as_mut() {
            transport.close().await;
        }

        if let Some(encoder) = self.encoder.take() {
            encoder.stop().await;
        }

        self.notifier.clear();
        self.transition(SessionState::Closed);
    }

    fn transition(&mut self, next: SessionState) {
        if !self.state.can_transition_to(next) {
            warn!("Ignoring transition {} -> {}", self.state, next);
            return;
        }

        debug!(
            "Session {}: {} -> {}",
            self.config.session_id, self.state, next
        );
        self.state = next;
        self.state_tx.send_replace(next);
    }
}

async fn accept_client(server: LocalServer, events: mpsc::Sender<ControlEvent>) {
    let event = match server.accept().await {
        Ok(connection) => ControlEvent::ClientConnected(connection),
        Err(e) => ControlEvent::AcceptFailed(e),
    };
    let _ = events.send(event).await;
}

/// Forward encoded frames to the client in emission order
///
/// Frames produced before a client attaches are discarded.
async fn pump_frames(
    mut frames: FrameStream,
    writer: SharedWriter,
    events: mpsc::Sender<ControlEvent>,
    counters: Arc<MediaCounters>,
) {
    while let Some(item) = frames.next_frame().await {
        let frame = match item {
            Ok(frame) => frame,
            Err(e) => {
                let _ = events.send(ControlEvent::EncoderFailed(e)).await;
                return;
            }
        };

        let bytes = frame.wire_bytes();
        match writer.write(&bytes).await {
            Ok(true) => {
                counters.frames_sent.fetch_add(1, Ordering::Relaxed);
                counters
                    .bytes_sent
                    .fetch_add(bytes.len() as u64, Ordering::Relaxed);
            }
            Ok(false) => {
                counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                let _ = events.send(ControlEvent::WriteFailed(e)).await;
                return;
            }
        }
    }

    let _ = events.send(ControlEvent::EncoderFinished).await;
}

async fn read_control(
    mut reader: ConnectionReader,
    tokens: ControlTokens,
    events: mpsc::Sender<ControlEvent>,
) {
    let mut buf = [0u8; CONTROL_CHUNK_LEN];
    loop {
        let event = match reader.read_chunk(&mut buf).await {
            Ok(0) => ControlEvent::PeerClosed,
            Ok(n) => {
                let message = tokens.parse(&buf[..n]);
                debug!("Control message: {:?}", message);
                ControlEvent::Command(message)
            }
            Err(e) => ControlEvent::ReadFailed(e),
        };

        let last = matches!(
            event,
            ControlEvent::PeerClosed | ControlEvent::ReadFailed(_)
        );
        if events.send(event).await.is_err() || last {
            return;
        }
    }
}
