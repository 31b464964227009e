//! Recording vendor backend for unit tests.

use crate::domain::models::DeviceHandle;
use crate::error::SdkError;
use crate::infrastructure::glasses::events::CoreEvent;
use crate::infrastructure::glasses::layout;
use crate::infrastructure::glasses::sdk::{
    ConnectionListener, DisplayListener, GlassesSdk, LinkProbe,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum SdkCall {
    IsConnected,
    Initialize(String),
    Connect { uuid: String, address: String },
    WatchConnection,
    Teardown,
    OpenCustomView,
    UpdateCustomView(String),
    CloseCustomView,
}

#[derive(Default)]
struct FakeState {
    calls: Vec<SdkCall>,
    connected: bool,
    fail_open: bool,
    fail_update: bool,
    fail_teardown: bool,
    connection_listener: Option<ConnectionListener>,
    display_listener: Option<DisplayListener>,
}

#[derive(Default)]
pub struct FakeSdk {
    state: Mutex<FakeState>,
}

impl FakeSdk {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn calls(&self) -> Vec<SdkCall> {
        self.with(|s| s.calls.clone())
    }

    pub fn count(&self, pred: impl Fn(&SdkCall) -> bool) -> usize {
        self.with(|s| s.calls.iter().filter(|c| pred(c)).count())
    }

    pub fn initialize_calls(&self) -> usize {
        self.count(|c| matches!(c, SdkCall::Initialize(_)))
    }

    pub fn connect_calls(&self) -> usize {
        self.count(|c| matches!(c, SdkCall::Connect { .. }))
    }

    pub fn open_calls(&self) -> usize {
        self.count(|c| matches!(c, SdkCall::OpenCustomView))
    }

    /// Texts carried by every text patch, in call order.
    pub fn pushed_texts(&self) -> Vec<String> {
        self.with(|s| {
            s.calls
                .iter()
                .filter_map(|c| match c {
                    SdkCall::UpdateCustomView(patch) => layout::patched_text(patch),
                    _ => None,
                })
                .collect()
        })
    }

    pub fn update_calls(&self) -> usize {
        self.count(|c| matches!(c, SdkCall::UpdateCustomView(_)))
    }

    pub fn set_connected(&self, connected: bool) {
        self.with(|s| s.connected = connected);
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.with(|s| s.fail_open = fail);
    }

    pub fn set_fail_update(&self, fail: bool) {
        self.with(|s| s.fail_update = fail);
    }

    pub fn set_fail_teardown(&self, fail: bool) {
        self.with(|s| s.fail_teardown = fail);
    }

    /// Listener from the most recent `initialize`/`connect`/`watch_connection`.
    pub fn connection_listener(&self) -> ConnectionListener {
        self.with(|s| s.connection_listener.clone())
            .expect("no connection listener registered")
    }

    pub fn display_listener(&self) -> DisplayListener {
        self.with(|s| s.display_listener.clone())
            .expect("no display listener registered")
    }
}

impl GlassesSdk for FakeSdk {
    fn is_connected(&self) -> bool {
        self.with(|s| {
            s.calls.push(SdkCall::IsConnected);
            s.connected
        })
    }

    fn initialize(
        &self,
        device: &DeviceHandle,
        listener: ConnectionListener,
    ) -> Result<(), SdkError> {
        self.with(|s| {
            s.calls.push(SdkCall::Initialize(device.address.clone()));
            s.connection_listener = Some(listener);
        });
        Ok(())
    }

    fn connect(
        &self,
        uuid: &str,
        address: &str,
        listener: ConnectionListener,
    ) -> Result<(), SdkError> {
        self.with(|s| {
            s.calls.push(SdkCall::Connect {
                uuid: uuid.to_string(),
                address: address.to_string(),
            });
            s.connection_listener = Some(listener);
        });
        Ok(())
    }

    fn watch_connection(&self, listener: ConnectionListener) {
        self.with(|s| {
            s.calls.push(SdkCall::WatchConnection);
            s.connection_listener = Some(listener);
        });
    }

    fn teardown(&self) -> Result<(), SdkError> {
        self.with(|s| {
            s.calls.push(SdkCall::Teardown);
            if s.fail_teardown {
                Err(SdkError::Fault("teardown blew up".into()))
            } else {
                s.connected = false;
                Ok(())
            }
        })
    }

    fn set_display_listener(&self, listener: DisplayListener) {
        self.with(|s| s.display_listener = Some(listener));
    }

    fn open_custom_view(&self, _layout: &str) -> Result<(), SdkError> {
        self.with(|s| {
            s.calls.push(SdkCall::OpenCustomView);
            if s.fail_open {
                Err(SdkError::Rejected {
                    call: "open_custom_view",
                    status: -1,
                })
            } else {
                Ok(())
            }
        })
    }

    fn update_custom_view(&self, patch: &str) -> Result<(), SdkError> {
        self.with(|s| {
            s.calls.push(SdkCall::UpdateCustomView(patch.to_string()));
            if s.fail_update {
                Err(SdkError::Rejected {
                    call: "update_custom_view",
                    status: -1,
                })
            } else {
                Ok(())
            }
        })
    }

    fn close_custom_view(&self) -> Result<(), SdkError> {
        self.with(|s| s.calls.push(SdkCall::CloseCustomView));
        Ok(())
    }
}

pub struct FixedProbe(pub bool);

impl LinkProbe for FixedProbe {
    fn has_system_link(&self, _device: &DeviceHandle) -> bool {
        self.0
    }
}

/// Let virtual time run forward and give spawned timer tasks a chance to post.
pub async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
