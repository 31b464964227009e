//! Everything that reaches the service event loop.

use crate::domain::models::{DeviceHandle, SessionParams};
use crate::error::ConnectionErrorCode;
use crate::infrastructure::glasses::service::ServiceCommand;
use std::time::Duration;

#[derive(Debug)]
pub enum CoreEvent {
    Command(ServiceCommand),
    Connection(ConnectionEvent),
    Display(DisplayCallback),
}

#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// A vendor callback, tagged with the attempt that registered it.
    Vendor {
        epoch: u64,
        callback: ConnectionCallback,
    },
    /// A grace delay ran out; time to issue the next vendor call.
    GraceElapsed { epoch: u64, step: PendingStep },
    /// No callback within the deadline.
    Timeout { epoch: u64, after: Duration },
}

impl ConnectionEvent {
    pub fn epoch(&self) -> u64 {
        match self {
            Self::Vendor { epoch, .. }
            | Self::GraceElapsed { epoch, .. }
            | Self::Timeout { epoch, .. } => *epoch,
        }
    }
}

#[derive(Debug, Clone)]
pub enum PendingStep {
    Initialize(DeviceHandle),
    Establish(SessionParams),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionCallback {
    Info {
        uuid: Option<String>,
        address: Option<String>,
        account_id: Option<String>,
        display_capable: bool,
    },
    Connected,
    Disconnected,
    Failed(ConnectionErrorCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayCallback {
    Opened,
    OpenFailed(i32),
    Updated,
    Closed,
}
