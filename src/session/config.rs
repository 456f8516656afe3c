use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::AudioFormatSpec;
use crate::transport::{Endpoint, SocketNamespace};

/// Endpoint name of the audio service
pub const AUDIO_SERVICE_SOCKET: &str = "sonicaudioservice";

/// Control tokens understood on the command channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlTokens {
    /// Ends the audio session
    pub stop: String,
    /// Requests the installed application listing
    pub app_list: String,
    /// Requests the Wi-Fi network listing
    pub wifi_list: String,
}

impl Default for ControlTokens {
    fn default() -> Self {
        Self {
            stop: "org.cloud.sonic.android.STOP".to_string(),
            app_list: "action_get_all_app_info".to_string(),
            wifi_list: "action_get_all_wifi_info".to_string(),
        }
    }
}

/// Configuration for one capture session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Unique session identifier
    pub session_id: String,

    /// Local endpoint the client connects to
    pub endpoint: Endpoint,

    /// Capture and encoding format
    pub format: AudioFormatSpec,

    /// How long to wait for the client before shutting down
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Control channel tokens
    pub tokens: ControlTokens,

    /// Encoded frames buffered between the encoder and the socket
    pub frame_queue_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("audio-{}", uuid::Uuid::new_v4()),
            endpoint: SocketNamespace::default().endpoint(AUDIO_SERVICE_SOCKET),
            format: AudioFormatSpec::default(),
            connect_timeout: Duration::from_secs(30),
            tokens: ControlTokens::default(),
            frame_queue_depth: 32,
        }
    }
}

impl SessionConfig {
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
