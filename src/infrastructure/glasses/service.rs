//! Glasses Service Module
//!
//! Coordinates the connection manager and the display synchronizer. Vendor
//! callbacks, timers, UI commands and capture snapshots all land in one event
//! loop, which is the only place session and display state change.

use crate::domain::models::{
    AppEvent, AttemptOrigin, DeviceHandle, DisplayClosure, DisplayState, MessageSeverity,
    SessionState, StatusMessage, TextProcessingOptions, TextSnapshot,
};
use crate::domain::settings::SettingsService;
use crate::error::ServiceStopped;
use crate::infrastructure::glasses::{
    connection::{ConnectionManager, ConnectionOutcome},
    display::DisplaySynchronizer,
    events::{CoreEvent, DisplayCallback},
    sdk::{DisplayListener, GlassesSdk, LinkProbe},
};
use crate::infrastructure::session_store::SessionStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Requests from the UI layer.
#[derive(Debug)]
pub enum ServiceCommand {
    Connect(DeviceHandle),
    AutoReconnect,
    Disconnect,
    EnableDisplay,
    DisableDisplay,
    SetProcessingOptions(TextProcessingOptions),
    SetTextSize(f32),
    Status(oneshot::Sender<ServiceStatus>),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceStatus {
    pub session: SessionState,
    pub connected: bool,
    pub display: DisplayState,
    pub display_enabled: bool,
    pub has_saved_session: bool,
}

impl ServiceStatus {
    pub fn is_display_ready(&self) -> bool {
        self.display == DisplayState::Ready
    }
}

/// Cloneable front door used by the UI layer.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    sender: mpsc::UnboundedSender<CoreEvent>,
}

impl ServiceHandle {
    fn send(&self, command: ServiceCommand) -> Result<(), ServiceStopped> {
        self.sender
            .send(CoreEvent::Command(command))
            .map_err(|_| ServiceStopped)
    }

    pub fn request_connect(&self, device: DeviceHandle) -> Result<(), ServiceStopped> {
        self.send(ServiceCommand::Connect(device))
    }

    pub fn request_auto_reconnect(&self) -> Result<(), ServiceStopped> {
        self.send(ServiceCommand::AutoReconnect)
    }

    pub fn request_disconnect(&self) -> Result<(), ServiceStopped> {
        self.send(ServiceCommand::Disconnect)
    }

    pub fn enable_display(&self) -> Result<(), ServiceStopped> {
        self.send(ServiceCommand::EnableDisplay)
    }

    pub fn disable_display(&self) -> Result<(), ServiceStopped> {
        self.send(ServiceCommand::DisableDisplay)
    }

    pub fn set_processing_options(
        &self,
        options: TextProcessingOptions,
    ) -> Result<(), ServiceStopped> {
        self.send(ServiceCommand::SetProcessingOptions(options))
    }

    pub fn set_text_size(&self, sp: f32) -> Result<(), ServiceStopped> {
        self.send(ServiceCommand::SetTextSize(sp))
    }

    pub fn shutdown(&self) -> Result<(), ServiceStopped> {
        self.send(ServiceCommand::Shutdown)
    }

    pub async fn status(&self) -> Result<ServiceStatus, ServiceStopped> {
        let (reply, response) = oneshot::channel();
        self.send(ServiceCommand::Status(reply))?;
        response.await.map_err(|_| ServiceStopped)
    }

    pub async fn is_connected(&self) -> Result<bool, ServiceStopped> {
        Ok(self.status().await?.connected)
    }

    pub async fn is_display_ready(&self) -> Result<bool, ServiceStopped> {
        Ok(self.status().await?.is_display_ready())
    }

    pub async fn has_saved_session(&self) -> Result<bool, ServiceStopped> {
        Ok(self.status().await?.has_saved_session)
    }
}

pub struct GlassesService {
    connection: ConnectionManager,
    display: DisplaySynchronizer,
    settings: Arc<Mutex<SettingsService>>,
    app_events: mpsc::UnboundedSender<AppEvent>,
    receiver: mpsc::UnboundedReceiver<CoreEvent>,
    snapshots: watch::Receiver<TextSnapshot>,
    latest_text: String,
    display_enabled: bool,
    watchdog_period: Duration,
}

impl GlassesService {
    pub fn new(
        sdk: Arc<dyn GlassesSdk>,
        probe: Arc<dyn LinkProbe>,
        store: Arc<dyn SessionStore>,
        settings: Arc<Mutex<SettingsService>>,
        snapshots: watch::Receiver<TextSnapshot>,
        app_events: mpsc::UnboundedSender<AppEvent>,
    ) -> anyhow::Result<(Self, ServiceHandle)> {
        let (timings, display_settings, options, display_enabled) = {
            let guard = settings
                .lock()
                .map_err(|_| anyhow::anyhow!("Failed to lock settings"))?;
            let s = guard.get();
            (
                s.connection.clone(),
                s.display.clone(),
                s.processing.clone(),
                s.display_enabled,
            )
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        sdk.set_display_listener(DisplayListener::new(sender.clone()));

        let watchdog_period = Duration::from_millis(display_settings.open_confirm_timeout_ms.max(100));
        let connection = ConnectionManager::new(sdk.clone(), probe, store, timings, sender.clone());
        let display = DisplaySynchronizer::new(sdk, display_settings, options, app_events.clone());

        let service = Self {
            connection,
            display,
            settings,
            app_events,
            receiver,
            snapshots,
            latest_text: String::new(),
            display_enabled,
            watchdog_period,
        };
        Ok((service, ServiceHandle { sender }))
    }

    pub async fn run(mut self) {
        info!("Glasses service started");
        let mut watchdog = tokio::time::interval(self.watchdog_period);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut capture_alive = true;

        loop {
            tokio::select! {
                event = self.receiver.recv() => {
                    match event {
                        Some(event) => {
                            if !self.handle_event(event) {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                changed = self.snapshots.changed(), if capture_alive => {
                    if changed.is_err() {
                        debug!("Capture pipeline went away");
                        capture_alive = false;
                        continue;
                    }
                    let snapshot = self.snapshots.borrow_and_update().clone();
                    self.on_snapshot(snapshot);
                }
                _ = watchdog.tick() => self.on_watchdog(),
            }
        }
        info!("Glasses service stopped");
    }

    /// Returns `false` when the loop should stop.
    pub(crate) fn handle_event(&mut self, event: CoreEvent) -> bool {
        match event {
            CoreEvent::Command(command) => return self.handle_command(command),
            CoreEvent::Connection(event) => {
                if let Some(outcome) = self.connection.handle_event(event) {
                    self.on_outcome(outcome);
                }
            }
            CoreEvent::Display(callback) => self.on_display_callback(callback),
        }
        true
    }

    fn handle_command(&mut self, command: ServiceCommand) -> bool {
        match command {
            ServiceCommand::Connect(device) => match self.connection.connect_device(device) {
                Ok(Some(outcome)) => self.on_outcome(outcome),
                Ok(None) => {
                    // a new attempt replaces whatever session the display had
                    self.display.set_session_connected(false);
                    self.emit(AppEvent::ConnectionStatus(SessionState::Initializing));
                }
                Err(e) => self.send_log(&e.to_string(), MessageSeverity::Warning),
            },
            ServiceCommand::AutoReconnect => match self.connection.auto_reconnect() {
                Ok(true) => {
                    self.display.set_session_connected(false);
                    self.emit(AppEvent::ConnectionStatus(SessionState::Connecting));
                }
                Ok(false) => {}
                Err(e) => self.send_log(&e.to_string(), MessageSeverity::Warning),
            },
            ServiceCommand::Disconnect => {
                self.display.release();
                self.connection.disconnect();
                self.emit(AppEvent::ConnectionStatus(SessionState::Idle));
                self.send_log("Disconnected from glasses", MessageSeverity::Info);
            }
            ServiceCommand::EnableDisplay => {
                self.set_display_enabled(true);
                self.push_latest();
            }
            ServiceCommand::DisableDisplay => {
                self.set_display_enabled(false);
                self.display.close();
            }
            ServiceCommand::SetProcessingOptions(options) => {
                self.with_settings(|s| s.update_processing(options.clone()));
                self.display.set_options(options);
            }
            ServiceCommand::SetTextSize(sp) => {
                self.with_settings(|s| s.update_text_size(sp));
                self.display.set_text_size(sp);
            }
            ServiceCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
            ServiceCommand::Shutdown => {
                info!("Shutdown requested");
                return false;
            }
        }
        true
    }

    fn on_outcome(&mut self, outcome: ConnectionOutcome) {
        match outcome {
            ConnectionOutcome::Connected { origin } => {
                self.emit(AppEvent::ConnectionStatus(SessionState::Connected));
                self.send_log("Connected to glasses", MessageSeverity::Success);
                debug!("Session established via {:?}", origin);
                self.display.set_session_connected(true);
                if self.display_enabled {
                    self.display.ensure_open();
                }
            }
            ConnectionOutcome::Failed { error, origin } => {
                self.display.set_session_connected(false);
                self.emit(AppEvent::ConnectionStatus(SessionState::Failed));
                let message = match origin {
                    AttemptOrigin::Manual => format!("Connection failed: {}", error),
                    AttemptOrigin::AutoReconnect => format!("Auto reconnect failed: {}", error),
                };
                self.send_log(&message, MessageSeverity::Error);
                self.emit(AppEvent::ConnectionFailed { error, origin });
            }
            ConnectionOutcome::Lost => {
                self.display.set_session_connected(false);
                self.emit(AppEvent::ConnectionStatus(SessionState::Failed));
                self.send_log("Connection to glasses lost", MessageSeverity::Warning);
            }
        }
    }

    fn on_display_callback(&mut self, callback: DisplayCallback) {
        match callback {
            DisplayCallback::Opened => self.display.on_opened(),
            DisplayCallback::OpenFailed(code) => self.display.on_open_failed(code),
            DisplayCallback::Updated => self.display.on_updated(),
            DisplayCallback::Closed => match self.display.on_closed() {
                Some(DisplayClosure::External) if self.display_enabled => {
                    info!("Peer closed the display; switching the feature off");
                    self.set_display_enabled(false);
                    self.emit(AppEvent::DisplayDisabledByPeer);
                }
                other => debug!("Display closure handled: {:?}", other),
            },
        }
    }

    fn on_snapshot(&mut self, snapshot: TextSnapshot) {
        debug!(
            "Snapshot at {} ({} chars)",
            snapshot.captured_at,
            snapshot.text.chars().count()
        );
        self.latest_text = snapshot.text;
        if self.display_enabled {
            self.display.update_text(&self.latest_text);
        }
    }

    fn on_watchdog(&mut self) {
        if self.display_enabled
            && self.connection.state() == SessionState::Connected
            && !self.display.is_ready()
        {
            self.display.ensure_open();
        }
    }

    fn push_latest(&mut self) {
        if self.latest_text.is_empty() {
            self.display.ensure_open();
        } else {
            let text = self.latest_text.clone();
            self.display.update_text(&text);
        }
    }

    fn status(&self) -> ServiceStatus {
        ServiceStatus {
            session: self.connection.state(),
            connected: self.connection.is_connected(),
            display: self.display.state(),
            display_enabled: self.display_enabled,
            has_saved_session: self.connection.has_saved_session(),
        }
    }

    fn set_display_enabled(&mut self, enabled: bool) {
        self.display_enabled = enabled;
        self.with_settings(|s| s.set_display_enabled(enabled));
    }

    fn with_settings(&self, f: impl FnOnce(&mut SettingsService) -> anyhow::Result<()>) {
        match self.settings.lock() {
            Ok(mut guard) => {
                if let Err(e) = f(&mut guard) {
                    warn!("Failed to save settings: {}", e);
                }
            }
            Err(_) => error!("Settings lock poisoned"),
        }
    }

    fn emit(&self, event: AppEvent) {
        let _ = self.app_events.send(event);
    }

    fn send_log(&self, message: &str, severity: MessageSeverity) {
        self.emit(AppEvent::LogMessage(StatusMessage {
            message: message.to_string(),
            severity,
        }));
    }
}
