//! Audio session management
//!
//! This module provides the `SessionController` state machine that manages:
//! - The start request and capture grant
//! - The single-client endpoint and its connect timeout
//! - Forwarding encoded frames and reading control tokens
//! - Ordered teardown and session statistics

mod config;
mod control;
mod controller;
mod notifier;
mod state;
mod stats;

pub use config::{ControlTokens, SessionConfig, AUDIO_SERVICE_SOCKET};
pub use control::ControlMessage;
pub use controller::{ControllerHandle, SessionController, StartRequest};
pub use notifier::{LogNotifier, ServiceStatus, StatusNotifier};
pub use state::{SessionState, StopReason};
pub use stats::SessionStats;
