use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a capture session
///
/// ```text
/// Idle ──start──> AwaitingConnection ──client──> Streaming
///   │                    │                          │
///   │ (rejected)         │ (timeout, failure)       │ (stop token, failure)
///   v                    v                          v
/// Closed <──────────── Stopping <────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Constructed, not started
    Idle,
    /// Capture and encoder running, endpoint bound, connect timer armed
    AwaitingConnection,
    /// Client connected, frames forwarded, timer cancelled
    Streaming,
    /// Teardown in progress
    Stopping,
    /// Terminal; the controller is not reused
    Closed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, AwaitingConnection)
                | (Idle, Stopping)
                | (Idle, Closed)
                | (AwaitingConnection, Streaming)
                | (AwaitingConnection, Stopping)
                | (Streaming, Stopping)
                | (Stopping, Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::Closed
    }

    /// Stopping or already closed
    pub fn is_shutting_down(self) -> bool {
        matches!(self, SessionState::Stopping | SessionState::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingConnection => "awaiting-connection",
            SessionState::Streaming => "streaming",
            SessionState::Stopping => "stopping",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum StopReason {
    /// Client sent the stop token
    StopToken,
    /// Stop requested by the host (stop action or handle)
    StopRequested,
    /// No client connected in time
    ConnectTimeout,
    /// Client closed its end of the connection
    PeerClosed,
    /// PCM source closed and the encoder drained
    EncoderFinished,
    EncoderError(String),
    WriteFailed(String),
    ReadFailed(String),
    AcceptFailed(String),
    /// Start request refused before anything was bound
    Rejected(String),
}

impl StopReason {
    /// Timeouts and requested stops are normal outcomes, not faults
    pub fn is_error(&self) -> bool {
        !matches!(
            self,
            StopReason::StopToken
                | StopReason::StopRequested
                | StopReason::ConnectTimeout
                | StopReason::PeerClosed
                | StopReason::EncoderFinished
        )
    }
}
