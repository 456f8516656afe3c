use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{SessionState, StopReason};

/// Statistics about a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Session identifier
    pub session_id: String,

    /// State when the snapshot was taken
    pub state: SessionState,

    /// When the session was created
    pub started_at: DateTime<Utc>,

    /// When the client connected, if it did
    pub connected_at: Option<DateTime<Utc>>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Frames written to the client
    pub frames_sent: u64,

    /// Bytes written to the client, ADTS headers included
    pub bytes_sent: u64,

    /// Frames encoded before any client was attached
    pub frames_dropped: u64,

    /// PCM bytes consumed by the encoder
    pub pcm_bytes: u64,

    /// Set once the session has begun stopping
    pub end_reason: Option<StopReason>,
}

impl SessionStats {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
