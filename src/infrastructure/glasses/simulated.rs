//! Simulated glasses
//!
//! Stand-in for the vendor library so the service can run headless. Callbacks
//! are delivered from spawned tasks after a short latency, like the real SDK's
//! callback thread.

use crate::domain::models::DeviceHandle;
use crate::error::SdkError;
use crate::infrastructure::glasses::layout;
use crate::infrastructure::glasses::sdk::{ConnectionListener, DisplayListener, GlassesSdk};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

#[derive(Default)]
struct SimState {
    connected: bool,
    view_open: bool,
    display_listener: Option<DisplayListener>,
}

pub struct SimulatedSdk {
    runtime: Handle,
    latency: Duration,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedSdk {
    pub fn new(runtime: Handle, latency: Duration) -> Self {
        Self {
            runtime,
            latency,
            state: Arc::new(Mutex::new(SimState::default())),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, SimState>, SdkError> {
        self.state
            .lock()
            .map_err(|_| SdkError::Fault("simulator state poisoned".into()))
    }

    /// Run `f` against the state after the simulated latency.
    fn later(&self, f: impl FnOnce(&mut SimState) + Send + 'static) {
        let state = self.state.clone();
        let latency = self.latency;
        self.runtime.spawn(async move {
            tokio::time::sleep(latency).await;
            if let Ok(mut guard) = state.lock() {
                f(&mut guard);
            }
        });
    }

    fn display_listener(&self) -> Result<DisplayListener, SdkError> {
        self.lock()?
            .display_listener
            .clone()
            .ok_or_else(|| SdkError::Fault("no display listener registered".into()))
    }
}

impl GlassesSdk for SimulatedSdk {
    fn is_connected(&self) -> bool {
        self.lock().map(|s| s.connected).unwrap_or(false)
    }

    fn initialize(
        &self,
        device: &DeviceHandle,
        listener: ConnectionListener,
    ) -> Result<(), SdkError> {
        info!(target: "glasses", "initialize {}", device.address);
        let address = device.address.clone();
        let uuid = format!("sim-{}", address.replace(':', "").to_lowercase());
        self.later(move |_| {
            listener.on_connection_info(
                Some(uuid),
                Some(address),
                Some("simulated-account".into()),
                true,
            );
        });
        Ok(())
    }

    fn connect(
        &self,
        uuid: &str,
        address: &str,
        listener: ConnectionListener,
    ) -> Result<(), SdkError> {
        info!(target: "glasses", "connect {} ({})", address, uuid);
        self.later(move |state| {
            state.connected = true;
            listener.on_connected();
        });
        Ok(())
    }

    fn watch_connection(&self, listener: ConnectionListener) {
        info!(target: "glasses", "watching existing session (epoch {})", listener.epoch());
    }

    fn teardown(&self) -> Result<(), SdkError> {
        let mut state = self.lock()?;
        state.connected = false;
        state.view_open = false;
        Ok(())
    }

    fn set_display_listener(&self, listener: DisplayListener) {
        if let Ok(mut state) = self.lock() {
            state.display_listener = Some(listener);
        }
    }

    fn open_custom_view(&self, _layout: &str) -> Result<(), SdkError> {
        if !self.is_connected() {
            return Err(SdkError::Rejected {
                call: "open_custom_view",
                status: -1,
            });
        }
        let listener = self.display_listener()?;
        self.later(move |state| {
            state.view_open = true;
            listener.on_opened();
        });
        Ok(())
    }

    fn update_custom_view(&self, patch: &str) -> Result<(), SdkError> {
        if !self.lock()?.view_open {
            return Err(SdkError::Rejected {
                call: "update_custom_view",
                status: -2,
            });
        }
        if let Some(text) = layout::patched_text(patch) {
            info!(target: "glasses", "display:\n{}", text);
        }
        let listener = self.display_listener()?;
        self.later(move |_| listener.on_updated());
        Ok(())
    }

    fn close_custom_view(&self) -> Result<(), SdkError> {
        let listener = self.display_listener()?;
        self.later(move |state| {
            if state.view_open {
                state.view_open = false;
                listener.on_closed();
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::glasses::events::{ConnectionCallback, ConnectionEvent, CoreEvent};
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn initialize_reports_session_parameters() {
        let sdk = SimulatedSdk::new(Handle::current(), Duration::from_millis(50));
        let (tx, mut rx) = mpsc::unbounded_channel();
        sdk.initialize(
            &DeviceHandle::new("Sim", "AA:BB"),
            ConnectionListener::new(7, tx),
        )
        .unwrap();

        match rx.recv().await {
            Some(CoreEvent::Connection(ConnectionEvent::Vendor {
                epoch: 7,
                callback: ConnectionCallback::Info { uuid, address, .. },
            })) => {
                assert_eq!(uuid.as_deref(), Some("sim-aabb"));
                assert_eq!(address.as_deref(), Some("AA:BB"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn views_need_a_session() {
        let sdk = SimulatedSdk::new(Handle::current(), Duration::from_millis(50));
        let (tx, _rx) = mpsc::unbounded_channel();
        sdk.set_display_listener(DisplayListener::new(tx));
        assert!(sdk.open_custom_view(&layout::open_layout(16.0)).is_err());
    }
}
