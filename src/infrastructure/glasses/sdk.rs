//! Vendor SDK seam
//!
//! The glasses vendor ships a callback-driven library. Everything the core
//! needs from it is expressed by [`GlassesSdk`]; results come back through the
//! listener objects below, which forward into the service event loop.

use crate::domain::models::DeviceHandle;
use crate::error::{ConnectionErrorCode, SdkError};
use crate::infrastructure::glasses::events::{
    ConnectionCallback, ConnectionEvent, CoreEvent, DisplayCallback,
};
use tokio::sync::mpsc;

/// Calls issued to the vendor library. All of them are fire-and-forget; an
/// `Err` means the call itself faulted, not that the operation failed.
pub trait GlassesSdk: Send + Sync {
    /// Live connected-state query.
    fn is_connected(&self) -> bool;

    fn initialize(&self, device: &DeviceHandle, listener: ConnectionListener)
        -> Result<(), SdkError>;

    fn connect(
        &self,
        uuid: &str,
        address: &str,
        listener: ConnectionListener,
    ) -> Result<(), SdkError>;

    /// Attach a connectivity listener to a session that is already live,
    /// so its loss is still reported.
    fn watch_connection(&self, listener: ConnectionListener);

    fn teardown(&self) -> Result<(), SdkError>;

    fn set_display_listener(&self, listener: DisplayListener);

    fn open_custom_view(&self, layout: &str) -> Result<(), SdkError>;

    fn update_custom_view(&self, patch: &str) -> Result<(), SdkError>;

    fn close_custom_view(&self) -> Result<(), SdkError>;
}

/// Platform probe: does this handle already have an OS-level link?
pub trait LinkProbe: Send + Sync {
    fn has_system_link(&self, device: &DeviceHandle) -> bool;
}

/// Probe for platforms that cannot tell.
pub struct NoSystemLink;

impl LinkProbe for NoSystemLink {
    fn has_system_link(&self, _device: &DeviceHandle) -> bool {
        false
    }
}

/// Connectivity callback handed to `initialize`/`connect`.
///
/// Carries the epoch of the attempt that created it so late callbacks from an
/// abandoned attempt can be told apart.
#[derive(Debug, Clone)]
pub struct ConnectionListener {
    epoch: u64,
    sender: mpsc::UnboundedSender<CoreEvent>,
}

impl ConnectionListener {
    pub fn new(epoch: u64, sender: mpsc::UnboundedSender<CoreEvent>) -> Self {
        Self { epoch, sender }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn on_connection_info(
        &self,
        uuid: Option<String>,
        address: Option<String>,
        account_id: Option<String>,
        display_capable: bool,
    ) {
        self.send(ConnectionCallback::Info {
            uuid,
            address,
            account_id,
            display_capable,
        });
    }

    pub fn on_connected(&self) {
        self.send(ConnectionCallback::Connected);
    }

    pub fn on_disconnected(&self) {
        self.send(ConnectionCallback::Disconnected);
    }

    pub fn on_failed(&self, code: ConnectionErrorCode) {
        self.send(ConnectionCallback::Failed(code));
    }

    fn send(&self, callback: ConnectionCallback) {
        let _ = self
            .sender
            .send(CoreEvent::Connection(ConnectionEvent::Vendor {
                epoch: self.epoch,
                callback,
            }));
    }
}

/// Display listener registered once with the vendor library.
#[derive(Debug, Clone)]
pub struct DisplayListener {
    sender: mpsc::UnboundedSender<CoreEvent>,
}

impl DisplayListener {
    pub fn new(sender: mpsc::UnboundedSender<CoreEvent>) -> Self {
        Self { sender }
    }

    pub fn on_opened(&self) {
        self.send(DisplayCallback::Opened);
    }

    pub fn on_open_failed(&self, code: i32) {
        self.send(DisplayCallback::OpenFailed(code));
    }

    pub fn on_updated(&self) {
        self.send(DisplayCallback::Updated);
    }

    pub fn on_closed(&self) {
        self.send(DisplayCallback::Closed);
    }

    fn send(&self, callback: DisplayCallback) {
        let _ = self.sender.send(CoreEvent::Display(callback));
    }
}
