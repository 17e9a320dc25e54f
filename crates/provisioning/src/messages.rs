//! Progress and message channels
//!
//! The engine reports through two independent channels:
//!
//! - **progress**: coarse [`ProgressEvent`]s, one step per handler slot
//! - **messages**: [`Message`]s carrying warnings, fine-grained sub-status
//!   and per-sequence completion
//!
//! Both are plain callbacks so the engine never depends on a presentation
//! layer. [`MessageBus`] wraps them for the duration of one run.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Coarse progress: `step` of `total` handler slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub message: Option<String>,
    pub step: usize,
    pub total: usize,
}

impl ProgressEvent {
    /// Rounded completion percentage, 0 when there is nothing to do
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let percent = (100.0 * self.step as f64 / self.total as f64).round();
        percent.clamp(0.0, 100.0) as u8
    }
}

/// Fine-grained status of the item a handler is working on
///
/// Positions are floating point so fractional progress survives the wire
/// form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SubStatus {
    /// Item `current` of `total` within an activity
    Determinate {
        activity: String,
        status: String,
        current: f64,
        total: f64,
    },
    /// Free text without a position
    Indeterminate(String),
}

impl SubStatus {
    pub fn determinate(
        activity: impl Into<String>,
        status: impl Into<String>,
        current: usize,
        total: usize,
    ) -> Self {
        Self::Determinate {
            activity: activity.into(),
            status: status.into(),
            current: current as f64,
            total: total as f64,
        }
    }

    /// Decode the `activity|status|current|total` wire form
    ///
    /// Anything that is not exactly four fields with finite numeric
    /// positions is kept as indeterminate text.
    pub fn parse(text: &str) -> Self {
        let fields: Vec<&str> = text.split('|').collect();
        if let [activity, status, current, total] = fields.as_slice()
            && let (Ok(current), Ok(total)) =
                (current.trim().parse::<f64>(), total.trim().parse::<f64>())
            && current.is_finite()
            && total.is_finite()
        {
            return Self::Determinate {
                activity: (*activity).to_string(),
                status: (*status).to_string(),
                current,
                total,
            };
        }
        Self::Indeterminate(text.to_string())
    }

    /// Encode into the `activity|status|current|total` wire form
    pub fn to_wire(&self) -> String {
        match self {
            Self::Determinate {
                activity,
                status,
                current,
                total,
            } => format!("{activity}|{status}|{current}|{total}"),
            Self::Indeterminate(text) => text.clone(),
        }
    }

    /// Rounded completion percentage; indeterminate status is always 0
    pub fn percent(&self) -> u8 {
        match self {
            Self::Determinate { current, total, .. } if *total > 0.0 => {
                let percent = (100.0 * current / total).round();
                percent.clamp(0.0, 100.0) as u8
            }
            _ => 0,
        }
    }

    /// Activity label, `-` when empty
    pub fn activity(&self) -> &str {
        match self {
            Self::Determinate { activity, .. } => non_empty(activity),
            Self::Indeterminate(_) => "-",
        }
    }

    /// Status label, `-` when empty
    pub fn status(&self) -> &str {
        match self {
            Self::Determinate { status, .. } => non_empty(status),
            Self::Indeterminate(text) => non_empty(text),
        }
    }
}

fn non_empty(text: &str) -> &str {
    if text.trim().is_empty() { "-" } else { text }
}

impl fmt::Display for SubStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Determinate { current, total, .. } => {
                write!(f, "{}: {} ({}/{})", self.activity(), self.status(), current, total)
            }
            Self::Indeterminate(text) => f.write_str(non_empty(text)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MessageKind {
    Warning,
    Progress,
    Completed,
}

/// A message on the message channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Message {
    Warning(String),
    Progress(SubStatus),
    /// A sequence finished; closes its sub-status display
    Completed(String),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Warning(_) => MessageKind::Warning,
            Self::Progress(_) => MessageKind::Progress,
            Self::Completed(_) => MessageKind::Completed,
        }
    }

    /// Flatten into the textual kind/text pair
    pub fn to_wire(&self) -> (MessageKind, String) {
        let text = match self {
            Self::Warning(text) | Self::Completed(text) => text.clone(),
            Self::Progress(status) => status.to_wire(),
        };
        (self.kind(), text)
    }

    /// Rebuild a message from its textual kind/text pair
    pub fn from_wire(kind: MessageKind, text: &str) -> Self {
        match kind {
            MessageKind::Warning => Self::Warning(text.to_string()),
            MessageKind::Progress => Self::Progress(SubStatus::parse(text)),
            MessageKind::Completed => Self::Completed(text.to_string()),
        }
    }
}

/// Receives coarse progress
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// Receives warnings, sub-status and completion messages
pub trait MessageCallback: Send + Sync {
    fn on_message(&self, message: &Message);
}

impl<F> ProgressCallback for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event);
    }
}

impl<F> MessageCallback for F
where
    F: Fn(&Message) + Send + Sync,
{
    fn on_message(&self, message: &Message) {
        self(message);
    }
}

/// Progress callback that ignores everything
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Message callback that ignores everything
pub struct NoMessages;

impl MessageCallback for NoMessages {
    fn on_message(&self, _message: &Message) {}
}

#[derive(Default)]
struct WarningLog {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

/// Per-run dispatcher over the two channels
///
/// Owns the step counter and de-duplicates warnings by exact text. A
/// panicking callback is logged and otherwise ignored.
pub struct MessageBus {
    progress: Arc<dyn ProgressCallback>,
    messages: Arc<dyn MessageCallback>,
    step: AtomicUsize,
    total: usize,
    warnings: Mutex<WarningLog>,
}

impl MessageBus {
    pub fn new(
        progress: Arc<dyn ProgressCallback>,
        messages: Arc<dyn MessageCallback>,
        total: usize,
    ) -> Self {
        Self {
            progress,
            messages,
            step: AtomicUsize::new(0),
            total,
            warnings: Mutex::new(WarningLog::default()),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn step(&self) -> usize {
        self.step.load(Ordering::SeqCst)
    }

    /// Report progress without moving the step counter
    pub fn report(&self, message: impl Into<String>) {
        self.emit_progress(Some(message.into()), self.step());
    }

    /// Move the step counter forward by `steps` and report
    pub fn advance(&self, steps: usize, message: impl Into<String>) {
        let previous = self.step.fetch_add(steps, Ordering::SeqCst);
        let step = (previous + steps).min(self.total);
        self.emit_progress(Some(message.into()), step);
    }

    /// Emit a warning unless the same text was already emitted this run
    pub fn warn(&self, text: impl Into<String>) {
        let text = text.into();
        let first = match self.warnings.lock() {
            Ok(mut log) => {
                if log.seen.insert(text.clone()) {
                    log.ordered.push(text.clone());
                    true
                } else {
                    false
                }
            }
            Err(_) => true,
        };
        if first {
            log::debug!("Warning: {}", text);
            self.emit_message(&Message::Warning(text));
        } else {
            log::debug!("Suppressed repeated warning: {}", text);
        }
    }

    pub fn sub_status(&self, status: SubStatus) {
        self.emit_message(&Message::Progress(status));
    }

    pub fn completed(&self, text: impl Into<String>) {
        self.emit_message(&Message::Completed(text.into()));
    }

    /// Distinct warnings emitted so far, in emission order
    pub fn warnings(&self) -> Vec<String> {
        self.warnings
            .lock()
            .map(|log| log.ordered.clone())
            .unwrap_or_default()
    }

    fn emit_progress(&self, message: Option<String>, step: usize) {
        let event = ProgressEvent {
            message,
            step,
            total: self.total,
        };
        if catch_unwind(AssertUnwindSafe(|| self.progress.on_progress(&event))).is_err() {
            log::error!("Progress callback panicked at step {}/{}", step, self.total);
        }
    }

    fn emit_message(&self, message: &Message) {
        if catch_unwind(AssertUnwindSafe(|| self.messages.on_message(message))).is_err() {
            log::error!("Message callback panicked on {:?} message", message.kind());
        }
    }
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("step", &self.step())
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<ProgressEvent>>,
        messages: Mutex<Vec<Message>>,
    }

    impl ProgressCallback for Recorder {
        fn on_progress(&self, event: &ProgressEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    impl MessageCallback for Recorder {
        fn on_message(&self, message: &Message) {
            self.messages.lock().unwrap().push(message.clone());
        }
    }

    #[test]
    fn test_parse_determinate() {
        let status = SubStatus::parse("Lists|Creating Projects|2|4");
        assert_eq!(
            status,
            SubStatus::Determinate {
                activity: "Lists".into(),
                status: "Creating Projects".into(),
                current: 2.0,
                total: 4.0,
            }
        );
        assert_eq!(status.percent(), 50);
    }

    #[test]
    fn test_parse_indeterminate() {
        assert!(matches!(SubStatus::parse("a|b|c"), SubStatus::Indeterminate(_)));
        assert!(matches!(SubStatus::parse("a|b|x|4"), SubStatus::Indeterminate(_)));
        assert!(matches!(SubStatus::parse("a|b|1|2|3"), SubStatus::Indeterminate(_)));
        assert_eq!(SubStatus::parse("just text").percent(), 0);
    }

    #[test]
    fn test_parse_fractional_positions() {
        let status = SubStatus::parse("Files|upload|1.5|3");
        assert!(matches!(
            status,
            SubStatus::Determinate { current, total, .. }
                if (current - 1.5).abs() < f64::EPSILON && (total - 3.0).abs() < f64::EPSILON
        ));
        assert_eq!(status.percent(), 50);
        assert_eq!(status.to_wire(), "Files|upload|1.5|3");
        assert!(matches!(SubStatus::parse("a|b|NaN|3"), SubStatus::Indeterminate(_)));
        assert!(matches!(SubStatus::parse("a|b|1|inf"), SubStatus::Indeterminate(_)));
    }

    #[test]
    fn test_percent_edges() {
        assert_eq!(SubStatus::parse("a|b|1|0").percent(), 0);
        assert_eq!(SubStatus::parse("a|b|5|3").percent(), 100);
        assert_eq!(SubStatus::parse("a|b|1|3").percent(), 33);
        assert_eq!(SubStatus::parse("a|b|2|3").percent(), 67);
    }

    #[test]
    fn test_empty_labels_render_dash() {
        let status = SubStatus::parse("||1|2");
        assert_eq!(status.activity(), "-");
        assert_eq!(status.status(), "-");
        assert_eq!(status.to_string(), "-: - (1/2)");
    }

    #[test]
    fn test_message_wire_form() {
        let message = Message::Progress(SubStatus::determinate("Files", "logo.png", 1, 2));
        let (kind, text) = message.to_wire();
        assert_eq!(kind, MessageKind::Progress);
        assert_eq!(text, "Files|logo.png|1|2");
        assert_eq!(Message::from_wire(kind, &text), message);
    }

    #[test]
    fn test_progress_event_percent() {
        let event = ProgressEvent {
            message: None,
            step: 3,
            total: 4,
        };
        assert_eq!(event.percent(), 75);
        assert_eq!(
            ProgressEvent {
                message: None,
                step: 0,
                total: 0
            }
            .percent(),
            0
        );
    }

    #[test]
    fn test_bus_dedupes_warnings() {
        let recorder = Arc::new(Recorder::default());
        let bus = MessageBus::new(recorder.clone(), recorder.clone(), 0);

        bus.warn("X already exists");
        bus.warn("X already exists");
        bus.warn("Y already exists");

        let messages = recorder.messages.lock().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(bus.warnings(), vec!["X already exists", "Y already exists"]);
    }

    #[test]
    fn test_bus_advance_is_capped() {
        let recorder = Arc::new(Recorder::default());
        let bus = MessageBus::new(recorder.clone(), recorder.clone(), 2);

        bus.advance(1, "one");
        bus.advance(5, "overshoot");

        let steps: Vec<usize> = recorder.events.lock().unwrap().iter().map(|e| e.step).collect();
        assert_eq!(steps, vec![1, 2]);
    }

    #[test]
    fn test_panicking_callback_is_contained() {
        struct Exploding;
        impl ProgressCallback for Exploding {
            fn on_progress(&self, _event: &ProgressEvent) {
                panic!("boom");
            }
        }

        let bus = MessageBus::new(Arc::new(Exploding), Arc::new(NoMessages), 1);
        bus.advance(1, "still running");
        assert_eq!(bus.step(), 1);
    }
}
