//! Display Synchronizer
//!
//! Keeps the custom view on the glasses showing the latest processed text.
//! The view can be closed from the peer side at any time, so the vendor
//! listener callbacks are the only source of truth for `Ready`.
//!
//! Content is last-value-wins: one pending string, flushed when the view is
//! ready and the session is up, never a backlog.

use crate::domain::models::{
    AppEvent, DisplayClosure, DisplayState, TextProcessingOptions,
};
use crate::domain::settings::DisplaySettings;
use crate::domain::text_processing;
use crate::infrastructure::glasses::layout;
use crate::infrastructure::glasses::sdk::GlassesSdk;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

pub struct DisplaySynchronizer {
    sdk: Arc<dyn GlassesSdk>,
    observer: mpsc::UnboundedSender<AppEvent>,
    settings: DisplaySettings,
    options: TextProcessingOptions,

    state: DisplayState,
    session_connected: bool,
    pending: Option<String>,
    last_delivered: Option<String>,
    last_raw: Option<String>,
    open_requested_at: Option<Instant>,
    close_requested: bool,
}

impl DisplaySynchronizer {
    pub fn new(
        sdk: Arc<dyn GlassesSdk>,
        settings: DisplaySettings,
        options: TextProcessingOptions,
        observer: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            sdk,
            observer,
            settings,
            options,
            state: DisplayState::Closed,
            session_connected: false,
            pending: None,
            last_delivered: None,
            last_raw: None,
            open_requested_at: None,
            close_requested: false,
        }
    }

    pub fn state(&self) -> DisplayState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == DisplayState::Ready
    }

    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// Track the session. Losing it drops the view but keeps pending content
    /// for redelivery.
    pub fn set_session_connected(&mut self, connected: bool) {
        self.session_connected = connected;
        if !connected && self.state != DisplayState::Closed {
            debug!("Session gone; display considered closed");
            self.open_requested_at = None;
            self.last_delivered = None;
            self.set_state(DisplayState::Closed);
        }
    }

    pub fn ensure_open(&mut self) {
        if !self.session_connected {
            debug!("Display open deferred: no session");
            return;
        }
        match self.state {
            DisplayState::Closed => self.open(),
            DisplayState::Opening => {
                if self.open_is_stale() {
                    warn!("Display open was never confirmed; reissuing");
                    self.set_state(DisplayState::Closed);
                    self.open();
                }
            }
            DisplayState::Ready => self.flush(),
        }
    }

    pub fn update_text(&mut self, raw: &str) {
        self.last_raw = Some(raw.to_string());
        self.pending = Some(text_processing::process(
            raw,
            self.settings.max_text_length,
            &self.options,
        ));

        if self.state != DisplayState::Ready || !self.session_connected {
            self.ensure_open();
            return;
        }
        self.flush();
    }

    pub fn close(&mut self) {
        self.pending = None;
        self.last_raw = None;
        self.last_delivered = None;
        self.open_requested_at = None;
        self.close_requested = self.session_connected && self.state != DisplayState::Closed;
        self.set_state(DisplayState::Closed);
        if !self.session_connected {
            debug!("No session; nothing to close on the glasses");
            return;
        }
        if let Err(e) = self.sdk.close_custom_view() {
            warn!("Failed to close custom view: {}", e);
        }
    }

    /// Close the view ahead of an explicit session teardown. Pending content
    /// is kept for the next session.
    pub fn release(&mut self) {
        if self.session_connected && self.state != DisplayState::Closed {
            self.close_requested = true;
            if let Err(e) = self.sdk.close_custom_view() {
                warn!("Failed to close custom view before teardown: {}", e);
            }
        }
        self.set_session_connected(false);
    }

    /// New processing options apply to the last raw text right away.
    pub fn set_options(&mut self, options: TextProcessingOptions) {
        self.options = options;
        if let Some(raw) = self.last_raw.clone() {
            self.update_text(&raw);
        }
    }

    pub fn set_text_size(&mut self, sp: f32) {
        self.settings.text_size_sp = sp;
        if self.is_ready() && self.session_connected {
            if let Err(e) = self.sdk.update_custom_view(&layout::text_size_patch(sp)) {
                warn!("Failed to apply text size {}: {}", sp, e);
            }
        }
    }

    pub fn on_opened(&mut self) {
        if self.close_requested {
            debug!("Open confirmation after local close ignored");
            return;
        }
        if self.state != DisplayState::Opening || !self.session_connected {
            debug!(
                "Open confirmation in state {:?} (session: {}) ignored",
                self.state, self.session_connected
            );
            return;
        }
        info!("Display ready");
        self.open_requested_at = None;
        self.set_state(DisplayState::Ready);
        self.flush();
    }

    pub fn on_open_failed(&mut self, code: i32) {
        if self.state != DisplayState::Opening {
            debug!("Open failure {} in state {:?} ignored", code, self.state);
            return;
        }
        warn!("Display open failed with code {}", code);
        self.open_requested_at = None;
        self.set_state(DisplayState::Closed);
    }

    pub fn on_updated(&self) {
        trace!("Display update acknowledged");
    }

    /// Classify a vendor close. `None` means there was nothing open to close.
    pub fn on_closed(&mut self) -> Option<DisplayClosure> {
        if self.close_requested {
            self.close_requested = false;
            self.set_state(DisplayState::Closed);
            return Some(DisplayClosure::Local);
        }
        match self.state {
            DisplayState::Closed => {
                debug!("Close for an already closed display ignored");
                None
            }
            DisplayState::Opening if self.within_open_grace() => {
                debug!("Close while our open is settling; ignoring");
                Some(DisplayClosure::Transient)
            }
            _ => {
                info!("Display closed by the peer");
                self.open_requested_at = None;
                self.last_delivered = None;
                self.set_state(DisplayState::Closed);
                Some(DisplayClosure::External)
            }
        }
    }

    fn open(&mut self) {
        self.close_requested = false;
        self.last_delivered = None;
        let layout = layout::open_layout(self.settings.text_size_sp);
        match self.sdk.open_custom_view(&layout) {
            Ok(()) => {
                debug!("Display open requested");
                self.open_requested_at = Some(Instant::now());
                self.set_state(DisplayState::Opening);
            }
            Err(e) => {
                warn!("Failed to open custom view: {}", e);
                self.open_requested_at = None;
                self.set_state(DisplayState::Closed);
            }
        }
    }

    fn flush(&mut self) {
        let Some(text) = self.pending.as_ref() else {
            return;
        };
        if self.last_delivered.as_ref() == Some(text) {
            trace!("Display already shows the latest text");
            return;
        }
        match self.sdk.update_custom_view(&layout::text_patch(text)) {
            Ok(()) => {
                self.last_delivered = Some(text.clone());
            }
            Err(e) => {
                warn!("Display update failed, will reopen: {}", e);
                self.open_requested_at = None;
                self.set_state(DisplayState::Closed);
            }
        }
    }

    fn open_is_stale(&self) -> bool {
        self.open_requested_at.map_or(true, |at| {
            at.elapsed() >= Duration::from_millis(self.settings.open_confirm_timeout_ms)
        })
    }

    fn within_open_grace(&self) -> bool {
        self.open_requested_at.is_some_and(|at| {
            at.elapsed() < Duration::from_millis(self.settings.external_close_grace_ms)
        })
    }

    fn set_state(&mut self, state: DisplayState) {
        if self.state != state {
            self.state = state;
            let _ = self.observer.send(AppEvent::DisplayStatus(state));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::glasses::testing::{settle, FakeSdk, SdkCall};

    fn synchronizer(
        sdk: &Arc<FakeSdk>,
        options: TextProcessingOptions,
    ) -> (DisplaySynchronizer, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            DisplaySynchronizer::new(sdk.clone(), DisplaySettings::default(), options, tx),
            rx,
        )
    }

    #[tokio::test]
    async fn no_session_means_no_vendor_calls() {
        let sdk = FakeSdk::new();
        let (mut display, _rx) = synchronizer(&sdk, TextProcessingOptions::default());

        display.update_text("  hello  ");
        assert!(sdk.calls().is_empty());
        assert_eq!(display.pending(), Some("hello"));
        assert_eq!(display.state(), DisplayState::Closed);
    }

    #[tokio::test]
    async fn updates_during_opening_coalesce() {
        let sdk = FakeSdk::new();
        let (mut display, _rx) = synchronizer(&sdk, TextProcessingOptions::default());
        display.set_session_connected(true);

        display.ensure_open();
        assert_eq!(display.state(), DisplayState::Opening);
        display.update_text("A");
        display.update_text("B");
        assert_eq!(sdk.update_calls(), 0);
        assert_eq!(sdk.open_calls(), 1);

        display.on_opened();
        assert!(display.is_ready());
        assert_eq!(sdk.pushed_texts(), vec!["B".to_string()]);
        assert_eq!(sdk.update_calls(), 1);
    }

    #[tokio::test]
    async fn ready_display_pushes_only_changes() {
        let sdk = FakeSdk::new();
        let (mut display, _rx) = synchronizer(&sdk, TextProcessingOptions::default());
        display.set_session_connected(true);
        display.ensure_open();
        display.on_opened();

        display.update_text("one");
        display.update_text("one");
        display.ensure_open();
        display.update_text("two");
        assert_eq!(sdk.pushed_texts(), vec!["one".to_string(), "two".to_string()]);
    }

    #[tokio::test]
    async fn options_are_applied_before_push() {
        let sdk = FakeSdk::new();
        let options = TextProcessingOptions {
            remove_empty_lines: true,
            ..Default::default()
        };
        let (mut display, _rx) = synchronizer(&sdk, options);
        display.set_session_connected(true);
        display.ensure_open();
        display.on_opened();

        display.update_text("a\n\nb\n \n c");
        assert_eq!(sdk.pushed_texts(), vec!["a\nb\nc".to_string()]);

        display.set_options(TextProcessingOptions {
            remove_line_breaks: true,
            ..Default::default()
        });
        assert_eq!(sdk.pushed_texts().last().map(String::as_str), Some("a b c"));
    }

    #[tokio::test]
    async fn failed_open_returns_to_closed_and_retries() {
        let sdk = FakeSdk::new();
        let (mut display, _rx) = synchronizer(&sdk, TextProcessingOptions::default());
        display.set_session_connected(true);
        sdk.set_fail_open(true);

        display.update_text("x");
        assert_eq!(display.state(), DisplayState::Closed);

        sdk.set_fail_open(false);
        display.ensure_open();
        assert_eq!(display.state(), DisplayState::Opening);
        assert_eq!(sdk.open_calls(), 2);
    }

    #[tokio::test]
    async fn open_failed_callback_closes() {
        let sdk = FakeSdk::new();
        let (mut display, _rx) = synchronizer(&sdk, TextProcessingOptions::default());
        display.set_session_connected(true);
        display.ensure_open();
        display.on_open_failed(3);
        assert_eq!(display.state(), DisplayState::Closed);
    }

    #[tokio::test]
    async fn late_open_confirmation_after_session_loss_is_ignored() {
        let sdk = FakeSdk::new();
        let (mut display, _rx) = synchronizer(&sdk, TextProcessingOptions::default());
        display.set_session_connected(true);
        display.ensure_open();
        display.update_text("held");
        display.set_session_connected(false);

        display.on_opened();
        assert_eq!(display.state(), DisplayState::Closed);
        assert!(!display.is_ready());
        assert_eq!(sdk.update_calls(), 0);

        // the next session has to open the view again
        display.set_session_connected(true);
        display.ensure_open();
        assert_eq!(sdk.open_calls(), 2);
        assert_eq!(display.state(), DisplayState::Opening);
        display.on_opened();
        assert_eq!(sdk.pushed_texts(), vec!["held".to_string()]);
    }

    #[tokio::test]
    async fn open_confirmation_while_closed_is_ignored() {
        let sdk = FakeSdk::new();
        let (mut display, _rx) = synchronizer(&sdk, TextProcessingOptions::default());
        display.set_session_connected(true);
        sdk.set_fail_open(true);
        display.update_text("nothing asked");
        assert_eq!(display.state(), DisplayState::Closed);

        display.on_opened();
        assert_eq!(display.state(), DisplayState::Closed);
        assert_eq!(sdk.update_calls(), 0);
    }

    #[tokio::test]
    async fn open_failure_while_ready_keeps_view() {
        let sdk = FakeSdk::new();
        let (mut display, _rx) = synchronizer(&sdk, TextProcessingOptions::default());
        display.set_session_connected(true);
        display.ensure_open();
        display.on_opened();

        display.on_open_failed(7);
        assert!(display.is_ready());
        display.update_text("still here");
        assert_eq!(sdk.pushed_texts(), vec!["still here".to_string()]);
    }

    #[tokio::test]
    async fn peer_close_after_session_loss_is_not_reported() {
        let sdk = FakeSdk::new();
        let (mut display, _rx) = synchronizer(&sdk, TextProcessingOptions::default());
        display.set_session_connected(true);
        display.ensure_open();
        display.on_opened();

        display.set_session_connected(false);
        assert_eq!(display.on_closed(), None);
        assert_eq!(display.state(), DisplayState::Closed);
    }

    #[tokio::test]
    async fn close_without_session_skips_vendor() {
        let sdk = FakeSdk::new();
        let (mut display, _rx) = synchronizer(&sdk, TextProcessingOptions::default());
        display.update_text("queued");

        display.close();
        assert!(sdk.calls().is_empty());
        assert_eq!(display.pending(), None);
        assert_eq!(display.on_closed(), None);
    }

    #[tokio::test]
    async fn release_closes_view_and_keeps_pending() {
        let sdk = FakeSdk::new();
        let (mut display, _rx) = synchronizer(&sdk, TextProcessingOptions::default());
        display.set_session_connected(true);
        display.ensure_open();
        display.on_opened();
        display.update_text("keep me");

        display.release();
        assert!(sdk.calls().contains(&SdkCall::CloseCustomView));
        assert_eq!(display.state(), DisplayState::Closed);
        assert_eq!(display.pending(), Some("keep me"));
        assert_eq!(display.on_closed(), Some(DisplayClosure::Local));

        display.set_session_connected(true);
        display.ensure_open();
        display.on_opened();
        assert_eq!(
            sdk.pushed_texts(),
            vec!["keep me".to_string(), "keep me".to_string()]
        );
    }

    #[tokio::test]
    async fn session_loss_keeps_pending_for_redelivery() {
        let sdk = FakeSdk::new();
        let (mut display, _rx) = synchronizer(&sdk, TextProcessingOptions::default());
        display.set_session_connected(true);
        display.ensure_open();
        display.on_opened();
        display.update_text("first");

        display.set_session_connected(false);
        display.update_text("second");
        assert_eq!(display.state(), DisplayState::Closed);
        assert_eq!(display.pending(), Some("second"));

        display.set_session_connected(true);
        display.ensure_open();
        display.on_opened();
        assert_eq!(
            sdk.pushed_texts(),
            vec!["first".to_string(), "second".to_string()]
        );
    }

    #[tokio::test]
    async fn failed_update_reopens_and_redelivers() {
        let sdk = FakeSdk::new();
        let (mut display, _rx) = synchronizer(&sdk, TextProcessingOptions::default());
        display.set_session_connected(true);
        display.ensure_open();
        display.on_opened();

        sdk.set_fail_update(true);
        display.update_text("lost?");
        assert_eq!(display.state(), DisplayState::Closed);

        sdk.set_fail_update(false);
        display.ensure_open();
        display.on_opened();
        assert_eq!(sdk.pushed_texts().last().map(String::as_str), Some("lost?"));
    }

    #[tokio::test]
    async fn close_clears_pending_and_is_local() {
        let sdk = FakeSdk::new();
        let (mut display, _rx) = synchronizer(&sdk, TextProcessingOptions::default());
        display.set_session_connected(true);
        display.ensure_open();
        display.on_opened();
        display.update_text("bye");

        display.close();
        assert_eq!(display.pending(), None);
        assert!(sdk.calls().contains(&SdkCall::CloseCustomView));
        assert_eq!(display.on_closed(), Some(DisplayClosure::Local));
        assert_eq!(display.on_closed(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn peer_close_is_external_once() {
        let sdk = FakeSdk::new();
        let (mut display, _rx) = synchronizer(&sdk, TextProcessingOptions::default());
        display.set_session_connected(true);
        display.ensure_open();
        display.on_opened();

        assert_eq!(display.on_closed(), Some(DisplayClosure::External));
        assert_eq!(display.state(), DisplayState::Closed);
        // the same closure seen again is not a new event
        assert_eq!(display.on_closed(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn close_during_open_grace_is_transient() {
        let sdk = FakeSdk::new();
        let (mut display, _rx) = synchronizer(&sdk, TextProcessingOptions::default());
        display.set_session_connected(true);
        display.ensure_open();

        assert_eq!(display.on_closed(), Some(DisplayClosure::Transient));
        assert_eq!(display.state(), DisplayState::Opening);

        settle(2_500).await;
        assert_eq!(display.on_closed(), Some(DisplayClosure::External));
    }

    #[tokio::test(start_paused = true)]
    async fn unconfirmed_open_is_reissued() {
        let sdk = FakeSdk::new();
        let (mut display, _rx) = synchronizer(&sdk, TextProcessingOptions::default());
        display.set_session_connected(true);
        display.ensure_open();

        display.ensure_open();
        assert_eq!(sdk.open_calls(), 1);

        settle(3_100).await;
        display.ensure_open();
        assert_eq!(sdk.open_calls(), 2);
        assert_eq!(display.state(), DisplayState::Opening);
    }

    #[tokio::test]
    async fn state_changes_are_observed() {
        let sdk = FakeSdk::new();
        let (mut display, mut rx) = synchronizer(&sdk, TextProcessingOptions::default());
        display.set_session_connected(true);
        display.ensure_open();
        display.on_opened();

        let mut seen = Vec::new();
        while let Ok(AppEvent::DisplayStatus(state)) = rx.try_recv() {
            seen.push(state);
        }
        assert_eq!(seen, vec![DisplayState::Opening, DisplayState::Ready]);
    }

    #[tokio::test]
    async fn text_size_patches_ready_view() {
        let sdk = FakeSdk::new();
        let (mut display, _rx) = synchronizer(&sdk, TextProcessingOptions::default());
        display.set_text_size(20.0);
        assert_eq!(sdk.update_calls(), 0);

        display.set_session_connected(true);
        display.ensure_open();
        display.on_opened();
        display.set_text_size(22.0);
        assert_eq!(sdk.update_calls(), 1);
    }
}
