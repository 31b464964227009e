//! Capture Pipeline
//!
//! Turns host accessibility notifications into deduplicated text snapshots and
//! publishes them on a single-slot channel. Slow subscribers only ever see the
//! latest value.

use crate::domain::models::TextSnapshot;
use std::collections::HashSet;
use tokio::sync::watch;
use tracing::{debug, trace};

/// One node of the active window's accessibility tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiNode {
    pub text: Option<String>,
    pub description: Option<String>,
    pub children: Vec<UiNode>,
}

impl UiNode {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn with_children(mut self, children: Vec<UiNode>) -> Self {
        self.children = children;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEventKind {
    TextChanged,
    ContentChanged,
    WindowStateChanged,
    Scrolled,
    Other,
}

impl CaptureEventKind {
    fn qualifies(&self) -> bool {
        !matches!(self, Self::Other)
    }
}

/// A host accessibility notification.
#[derive(Debug, Clone)]
pub struct CaptureEvent {
    pub kind: CaptureEventKind,
    /// Root of the active window, when the host could provide it.
    pub window: Option<UiNode>,
    /// Text carried by the event itself.
    pub text: Vec<String>,
    pub description: Option<String>,
}

impl CaptureEvent {
    pub fn window(kind: CaptureEventKind, root: UiNode) -> Self {
        Self {
            kind,
            window: Some(root),
            text: Vec::new(),
            description: None,
        }
    }
}

pub struct CapturePipeline {
    publisher: watch::Sender<TextSnapshot>,
    last_published: String,
}

impl CapturePipeline {
    pub fn new() -> (Self, watch::Receiver<TextSnapshot>) {
        let (publisher, receiver) = watch::channel(TextSnapshot::empty());
        (
            Self {
                publisher,
                last_published: String::new(),
            },
            receiver,
        )
    }

    pub fn subscribe(&self) -> watch::Receiver<TextSnapshot> {
        self.publisher.subscribe()
    }

    /// Returns whether a new snapshot was published.
    pub fn handle_event(&mut self, event: &CaptureEvent) -> bool {
        if !event.kind.qualifies() {
            trace!("Ignoring capture event {:?}", event.kind);
            return false;
        }
        let text = extract_text(event);
        self.publish(text)
    }

    /// Service interrupted or torn down: blank the published text.
    pub fn interrupt(&mut self) {
        debug!("Capture interrupted");
        self.publish(String::new());
    }

    fn publish(&mut self, text: String) -> bool {
        if text == self.last_published {
            return false;
        }
        debug!("Publishing snapshot ({} chars)", text.chars().count());
        self.last_published = text.clone();
        self.publisher.send_replace(TextSnapshot::now(text));
        true
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.interrupt();
    }
}

/// Depth-first walk of the window, falling back to the event's own fields.
pub fn extract_text(event: &CaptureEvent) -> String {
    let mut collector = Collector::default();
    if let Some(root) = &event.window {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            collector.push(node.text.as_deref());
            collector.push(node.description.as_deref());
            stack.extend(node.children.iter().rev());
        }
    }

    if collector.is_empty() {
        for text in &event.text {
            collector.push(Some(text));
        }
        collector.push(event.description.as_deref());
    }
    collector.finish()
}

#[derive(Default)]
struct Collector {
    seen: HashSet<String>,
    lines: Vec<String>,
}

impl Collector {
    fn push(&mut self, value: Option<&str>) {
        let Some(value) = value.map(str::trim) else {
            return;
        };
        if value.is_empty() || self.seen.contains(value) {
            return;
        }
        self.seen.insert(value.to_string());
        self.lines.push(value.to_string());
    }

    fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn finish(self) -> String {
        self.lines.join("\n")
    }
}
