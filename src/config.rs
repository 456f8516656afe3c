use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::{AudioCodec, AudioFormatSpec};
use crate::manager::{APP_LIST_SOCKET, MANAGER_SOCKET};
use crate::session::{ControlTokens, SessionConfig, AUDIO_SERVICE_SOCKET};
use crate::transport::{Endpoint, SocketNamespace};

/// Prefix for environment overrides, e.g. `SONIC__SESSION__CONNECT_TIMEOUT_SECS`
pub const ENV_PREFIX: &str = "SONIC";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub session: SessionSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub namespace: SocketNamespace,
    pub audio_socket: String,
    pub manager_socket: String,
    pub app_list_socket: String,
    /// JSON file with the app and Wi-Fi listings served by the manager
    pub device_listing: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            namespace: SocketNamespace::default(),
            audio_socket: AUDIO_SERVICE_SOCKET.to_string(),
            manager_socket: MANAGER_SOCKET.to_string(),
            app_list_socket: APP_LIST_SOCKET.to_string(),
            device_listing: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub bitrate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        let format = AudioFormatSpec::default();
        Self {
            sample_rate: format.sample_rate(),
            channels: format.channels(),
            bits_per_sample: format.bits_per_sample(),
            bitrate: format.bitrate(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub connect_timeout_secs: u64,
    pub frame_queue_depth: usize,
    pub tokens: ControlTokens,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            frame_queue_depth: 32,
            tokens: ControlTokens::default(),
        }
    }
}

impl Config {
    /// Load defaults, then the optional file, then `SONIC__` environment overrides
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to load config from {:?}", path))?;

        Ok(settings.try_deserialize()?)
    }

    pub fn audio_format(&self) -> Result<AudioFormatSpec> {
        AudioFormatSpec::new(
            self.audio.sample_rate,
            self.audio.channels,
            self.audio.bits_per_sample,
            AudioCodec::AacLc,
            self.audio.bitrate,
        )
        .context("Invalid [audio] settings")
    }

    pub fn session_config(&self) -> Result<SessionConfig> {
        Ok(SessionConfig {
            endpoint: self.audio_endpoint(),
            format: self.audio_format()?,
            connect_timeout: Duration::from_secs(self.session.connect_timeout_secs),
            tokens: self.session.tokens.clone(),
            frame_queue_depth: self.session.frame_queue_depth,
            ..SessionConfig::default()
        })
    }

    pub fn audio_endpoint(&self) -> Endpoint {
        self.service.namespace.endpoint(&self.service.audio_socket)
    }

    pub fn manager_endpoint(&self) -> Endpoint {
        self.service.namespace.endpoint(&self.service.manager_socket)
    }

    pub fn app_list_endpoint(&self) -> Endpoint {
        self.service.namespace.endpoint(&self.service.app_list_socket)
    }
}
