//! Glasses Connection Module
//!
//! Drives the vendor session lifecycle: initialize a discovered device (or
//! reuse persisted session parameters), connect, verify, and notice when the
//! link goes away.
//!
//! ```text
//!  Idle ──► Initializing ──► Connecting ──► Connected
//!   ▲  └──(auto reconnect)──────▲   │            │
//!   │                               ▼            ▼
//!   └────────── disconnect ◄──── Failed ◄────────┘
//! ```
//!
//! Only one attempt is ever outstanding. Every attempt gets a fresh epoch;
//! vendor callbacks and timers carry the epoch they were created under and
//! are dropped when it no longer matches.

use crate::domain::models::{AttemptOrigin, DeviceHandle, SessionParams, SessionState};
use crate::domain::settings::ConnectionTimings;
use crate::error::{ConnectionError, ConnectionErrorCode};
use crate::infrastructure::glasses::events::{
    ConnectionCallback, ConnectionEvent, CoreEvent, PendingStep,
};
use crate::infrastructure::glasses::sdk::{ConnectionListener, GlassesSdk, LinkProbe};
use crate::infrastructure::session_store::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How an attempt (or an established session) ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionOutcome {
    Connected {
        origin: AttemptOrigin,
    },
    Failed {
        error: ConnectionError,
        origin: AttemptOrigin,
    },
    /// An established session dropped.
    Lost,
}

pub struct ConnectionManager {
    sdk: Arc<dyn GlassesSdk>,
    probe: Arc<dyn LinkProbe>,
    store: Arc<dyn SessionStore>,
    timings: ConnectionTimings,
    events: mpsc::UnboundedSender<CoreEvent>,

    state: SessionState,
    params: Option<SessionParams>,
    epoch: u64,
    origin: AttemptOrigin,
    system_linked: bool,
    grace_timer: Option<JoinHandle<()>>,
    timeout_timer: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    pub fn new(
        sdk: Arc<dyn GlassesSdk>,
        probe: Arc<dyn LinkProbe>,
        store: Arc<dyn SessionStore>,
        timings: ConnectionTimings,
        events: mpsc::UnboundedSender<CoreEvent>,
    ) -> Self {
        Self {
            sdk,
            probe,
            store,
            timings,
            events,
            state: SessionState::Idle,
            params: None,
            epoch: 0,
            origin: AttemptOrigin::Manual,
            system_linked: false,
            grace_timer: None,
            timeout_timer: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn params(&self) -> Option<&SessionParams> {
        self.params.as_ref()
    }

    /// Live vendor query; cached state is not trusted.
    pub fn is_connected(&self) -> bool {
        self.sdk.is_connected()
    }

    pub fn has_saved_session(&self) -> bool {
        self.store.has_saved_session()
    }

    /// Start a full discover-side connection to `device`.
    ///
    /// Returns `Ok(Some(_))` when the vendor already reports a live link,
    /// `Ok(None)` once an attempt is under way, and
    /// `Err(AttemptInProgress)` when another attempt is outstanding.
    pub fn connect_device(
        &mut self,
        device: DeviceHandle,
    ) -> Result<Option<ConnectionOutcome>, ConnectionError> {
        if self.state.is_in_flight() {
            warn!(
                "Connect to {} ignored: attempt already in progress ({:?})",
                device.address, self.state
            );
            return Err(ConnectionError::AttemptInProgress);
        }

        // Peer identity is not re-checked here; see DESIGN.md.
        if self.sdk.is_connected() {
            info!("Vendor reports an existing session; treating as connected");
            self.begin_attempt(AttemptOrigin::Manual);
            self.sdk.watch_connection(self.listener());
            self.state = SessionState::Connected;
            return Ok(Some(ConnectionOutcome::Connected {
                origin: AttemptOrigin::Manual,
            }));
        }

        self.teardown_quietly();

        let epoch = self.begin_attempt(AttemptOrigin::Manual);
        self.system_linked = self.probe.has_system_link(&device);
        self.state = SessionState::Initializing;

        let delay = self.timings.grace_delay(self.system_linked);
        info!(
            "Connecting to {} ({}) in {:?}, system linked: {}",
            device.name, device.address, delay, self.system_linked
        );
        self.grace_timer = Some(self.schedule(
            delay,
            ConnectionEvent::GraceElapsed {
                epoch,
                step: PendingStep::Initialize(device),
            },
        ));
        Ok(None)
    }

    /// Reconnect with persisted parameters, skipping discovery.
    ///
    /// Returns whether an attempt was started.
    pub fn auto_reconnect(&mut self) -> Result<bool, ConnectionError> {
        let Some(params) = self.store.load() else {
            debug!("Auto reconnect skipped: no saved session");
            return Ok(false);
        };
        if self.sdk.is_connected() {
            debug!("Auto reconnect skipped: already connected");
            return Ok(false);
        }
        if self.state.is_in_flight() {
            warn!("Auto reconnect ignored: attempt already in progress");
            return Err(ConnectionError::AttemptInProgress);
        }

        self.teardown_quietly();

        let epoch = self.begin_attempt(AttemptOrigin::AutoReconnect);
        self.system_linked = false;
        self.state = SessionState::Connecting;
        self.params = Some(params.clone());

        info!("Auto reconnecting to {}", params.physical_address);
        let delay = self.timings.reconnect_grace_delay();
        self.grace_timer = Some(self.schedule(
            delay,
            ConnectionEvent::GraceElapsed {
                epoch,
                step: PendingStep::Establish(params),
            },
        ));
        Ok(true)
    }

    /// Explicit teardown. Forgets the saved session.
    pub fn disconnect(&mut self) {
        self.cancel_timers();
        self.retire_epoch();
        if let Err(e) = self.sdk.teardown() {
            warn!("Vendor teardown failed during disconnect: {}", e);
        }
        self.params = None;
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear saved session: {}", e);
        }
        self.state = SessionState::Idle;
        info!("Disconnected from glasses");
    }

    /// Feed a connection event from the event loop.
    pub fn handle_event(&mut self, event: ConnectionEvent) -> Option<ConnectionOutcome> {
        if event.epoch() != self.epoch {
            debug!(
                "Discarding stale connection event (epoch {} != {}): {:?}",
                event.epoch(),
                self.epoch,
                event
            );
            return None;
        }

        match event {
            ConnectionEvent::GraceElapsed { step, .. } => {
                self.grace_timer = None;
                if !self.state.is_in_flight() {
                    return None;
                }
                match step {
                    PendingStep::Initialize(device) => self.initialize(device),
                    PendingStep::Establish(params) => self.establish(params),
                }
            }
            ConnectionEvent::Timeout { after, .. } => {
                self.timeout_timer = None;
                if !self.state.is_in_flight() {
                    return None;
                }
                warn!("No response from glasses after {:?}", after);
                Some(self.fail(ConnectionError::Timeout(after)))
            }
            ConnectionEvent::Vendor { callback, .. } => self.on_callback(callback),
        }
    }

    fn initialize(&mut self, device: DeviceHandle) -> Option<ConnectionOutcome> {
        debug!("Initializing vendor session for {}", device.address);
        if let Err(e) = self.sdk.initialize(&device, self.listener()) {
            warn!("Vendor initialize faulted: {}", e);
            return Some(self.fail(e.into()));
        }
        self.arm_timeout();
        None
    }

    /// Shared by manual connect and auto reconnect.
    fn establish(&mut self, params: SessionParams) -> Option<ConnectionOutcome> {
        self.state = SessionState::Connecting;
        debug!(
            "Establishing session uuid={} address={}",
            params.device_uuid, params.physical_address
        );
        let result = self.sdk.connect(
            &params.device_uuid,
            &params.physical_address,
            self.listener(),
        );
        self.params = Some(params);
        if let Err(e) = result {
            warn!("Vendor connect faulted: {}", e);
            return Some(self.fail(e.into()));
        }
        self.arm_timeout();
        None
    }

    fn on_callback(&mut self, callback: ConnectionCallback) -> Option<ConnectionOutcome> {
        let state = self.state;
        match callback {
            ConnectionCallback::Info {
                uuid,
                address,
                account_id,
                display_capable,
            } => {
                if self.state != SessionState::Initializing {
                    debug!("Connection info outside initialization ignored");
                    return None;
                }
                self.cancel_timeout();

                let (uuid, address) = match (uuid, address) {
                    (Some(u), Some(a)) if !u.is_empty() && !a.is_empty() => (u, a),
                    _ => {
                        warn!("Vendor delivered incomplete session parameters");
                        return Some(
                            self.fail(ConnectionError::Vendor(ConnectionErrorCode::ParamInvalid)),
                        );
                    }
                };
                info!(
                    "Session parameters received (account: {}, display: {})",
                    account_id.as_deref().unwrap_or("-"),
                    display_capable
                );

                let params = SessionParams {
                    device_uuid: uuid,
                    physical_address: address,
                };
                if let Err(e) = self.store.save(&params) {
                    warn!("Failed to persist session parameters: {}", e);
                }
                self.establish(params)
            }
            ConnectionCallback::Connected => {
                if self.state != SessionState::Connecting {
                    debug!("Connected callback in state {:?} ignored", self.state);
                    return None;
                }
                self.cancel_timers();
                if !self.sdk.is_connected() {
                    warn!("Vendor confirmed connection but reports not connected");
                }
                self.state = SessionState::Connected;
                info!("Glasses connected");
                Some(ConnectionOutcome::Connected {
                    origin: self.origin,
                })
            }
            ConnectionCallback::Disconnected => match state {
                SessionState::Connected => Some(self.lose()),
                s if s.is_in_flight() => Some(self.fail(ConnectionError::Disconnected)),
                _ => None,
            },
            ConnectionCallback::Failed(code) => match state {
                SessionState::Connected => Some(self.lose()),
                s if s.is_in_flight() => Some(self.fail(ConnectionError::Vendor(code))),
                _ => None,
            },
        }
    }

    fn fail(&mut self, error: ConnectionError) -> ConnectionOutcome {
        self.cancel_timers();
        self.retire_epoch();
        self.params = None;
        self.state = SessionState::Failed;
        warn!("Connection attempt failed: {}", error);
        ConnectionOutcome::Failed {
            error,
            origin: self.origin,
        }
    }

    fn lose(&mut self) -> ConnectionOutcome {
        self.cancel_timers();
        self.retire_epoch();
        self.params = None;
        self.state = SessionState::Failed;
        warn!("Glasses session lost");
        ConnectionOutcome::Lost
    }

    fn teardown_quietly(&self) {
        if let Err(e) = self.sdk.teardown() {
            debug!("Stale-state teardown failed (ignored): {}", e);
        }
    }

    fn begin_attempt(&mut self, origin: AttemptOrigin) -> u64 {
        self.cancel_timers();
        self.retire_epoch();
        self.origin = origin;
        self.epoch
    }

    fn retire_epoch(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
    }

    fn listener(&self) -> ConnectionListener {
        ConnectionListener::new(self.epoch, self.events.clone())
    }

    fn arm_timeout(&mut self) {
        self.cancel_timeout();
        let after = self.timings.timeout(self.system_linked);
        self.timeout_timer = Some(self.schedule(
            after,
            ConnectionEvent::Timeout {
                epoch: self.epoch,
                after,
            },
        ));
    }

    fn cancel_timeout(&mut self) {
        if let Some(timer) = self.timeout_timer.take() {
            timer.abort();
        }
    }

    fn cancel_timers(&mut self) {
        self.cancel_timeout();
        if let Some(timer) = self.grace_timer.take() {
            timer.abort();
        }
    }

    fn schedule(&self, delay: Duration, event: ConnectionEvent) -> JoinHandle<()> {
        let sender = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = sender.send(CoreEvent::Connection(event));
        })
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.cancel_timers();
    }
}
