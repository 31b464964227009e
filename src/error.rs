//! Typed errors for the connection, vendor and persistence seams.
//!
//! Expected vendor failures never escape as panics; they end an attempt and
//! are surfaced to the UI layer as one of these values.

use std::time::Duration;
use thiserror::Error;

/// Failure codes reported by the vendor connectivity callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorCode {
    ParamInvalid,
    LinkConnectFailed,
    SocketConnectFailed,
    Unknown,
}

impl std::fmt::Display for ConnectionErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParamInvalid => write!(f, "invalid session parameters"),
            Self::LinkConnectFailed => write!(f, "link connect failed"),
            Self::SocketConnectFailed => write!(f, "socket connect failed"),
            Self::Unknown => write!(f, "unknown failure"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The vendor reported a failure code.
    #[error("vendor error: {0}")]
    Vendor(ConnectionErrorCode),

    /// No callback arrived before the deadline.
    #[error("no response from device after {0:?}")]
    Timeout(Duration),

    /// The link dropped before or after the session was confirmed.
    #[error("device disconnected")]
    Disconnected,

    /// A vendor call itself faulted.
    #[error("vendor call failed: {0}")]
    Sdk(#[from] SdkError),

    /// Another attempt is already outstanding.
    #[error("a connection attempt is already in progress")]
    AttemptInProgress,
}

impl ConnectionError {
    /// The code handed to the UI layer. Timeouts and faults map to `Unknown`.
    pub fn code(&self) -> ConnectionErrorCode {
        match self {
            Self::Vendor(code) => *code,
            Self::Timeout(_) | Self::Disconnected | Self::Sdk(_) | Self::AttemptInProgress => {
                ConnectionErrorCode::Unknown
            }
        }
    }
}

/// A vendor call that faulted instead of returning a status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SdkError {
    #[error("vendor call `{call}` rejected with status {status}")]
    Rejected { call: &'static str, status: i32 },

    #[error("vendor library fault: {0}")]
    Fault(String),
}

/// The service event loop is no longer running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("glasses service has stopped")]
pub struct ServiceStopped;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store io: {0}")]
    Io(#[from] std::io::Error),

    #[error("session store encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_surface_as_unknown() {
        let e = ConnectionError::Timeout(Duration::from_secs(10));
        assert_eq!(e.code(), ConnectionErrorCode::Unknown);
        assert!(e.to_string().contains("10s"));
    }

    #[test]
    fn vendor_code_passes_through() {
        let e = ConnectionError::Vendor(ConnectionErrorCode::SocketConnectFailed);
        assert_eq!(e.code(), ConnectionErrorCode::SocketConnectFailed);
    }

    #[test]
    fn sdk_fault_converts() {
        let e: ConnectionError = SdkError::Fault("boom".into()).into();
        assert!(matches!(e, ConnectionError::Sdk(_)));
        assert_eq!(e.code(), ConnectionErrorCode::Unknown);
    }
}
