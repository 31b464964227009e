use crate::error::ConnectionError;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Credentials handed out by the vendor SDK during initialization.
///
/// Enough to re-establish a session without a fresh discovery cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub device_uuid: String,
    pub physical_address: String,
}

/// A discovered wearable, as passed down from the scanning UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub name: String,
    pub address: String,
}

impl DeviceHandle {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Initializing,
    Connecting,
    Connected,
    Failed,
}

impl SessionState {
    /// An attempt is outstanding; new connect requests are dropped.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Initializing | Self::Connecting)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayState {
    #[default]
    Closed,
    Opening,
    Ready,
}

/// Which entry point started a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOrigin {
    Manual,
    AutoReconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSnapshot {
    pub text: String,
    /// Unix milliseconds
    pub captured_at: i64,
}

impl TextSnapshot {
    pub fn now(text: impl Into<String>) -> Self {
        let captured_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();
        Self {
            text: text.into(),
            captured_at,
        }
    }

    pub fn empty() -> Self {
        Self {
            text: String::new(),
            captured_at: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextProcessingOptions {
    #[serde(default)]
    pub remove_empty_lines: bool,
    #[serde(default)]
    pub remove_line_breaks: bool,
    #[serde(default)]
    pub remove_first_line: bool,
    #[serde(default = "default_line_count")]
    pub remove_first_line_count: usize,
    #[serde(default)]
    pub remove_last_line: bool,
    #[serde(default = "default_line_count")]
    pub remove_last_line_count: usize,
}

impl Default for TextProcessingOptions {
    fn default() -> Self {
        Self {
            remove_empty_lines: false,
            remove_line_breaks: false,
            remove_first_line: false,
            remove_first_line_count: default_line_count(),
            remove_last_line: false,
            remove_last_line_count: default_line_count(),
        }
    }
}

fn default_line_count() -> usize {
    1
}

/// How the peer-side display went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayClosure {
    /// We asked for it.
    Local,
    /// The peer closed it on its own.
    External,
    /// Arrived while our own open was still settling; ignored.
    Transient,
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    ConnectionStatus(SessionState),
    ConnectionFailed {
        error: ConnectionError,
        origin: AttemptOrigin,
    },
    DisplayStatus(DisplayState),
    /// The peer closed the display while the feature was on; the feature has
    /// been switched off in settings.
    DisplayDisabledByPeer,
    LogMessage(StatusMessage),
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}
