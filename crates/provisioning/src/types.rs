//! Core types for applying a hierarchy

use crate::error::{Error, Result};
use crate::handlers::{HandlerKind, HandlerSet, ObjectHandler};
use crate::messages::{MessageCallback, NoMessages, NoProgress, ProgressCallback};
use crate::retry::RetryConfig;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Result of converging a single object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// Object was created
    Created,
    /// Object was modified
    Modified,
    /// Object was removed
    Removed,
    /// Object was left alone on purpose
    Skipped { reason: String },
    /// Object could not be converged, the handler went on
    Failed { error: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Counts of object results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.removed
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of objects processed
    pub fn total(&self) -> usize {
        self.created + self.modified + self.removed + self.skipped + self.failed + self.no_change
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &ExecuteSummary) {
        self.created += other.created;
        self.modified += other.modified;
        self.removed += other.removed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.no_change += other.no_change;
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Modified => self.modified += 1,
            ApplyResult::Removed => self.removed += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Per-run switches honored by the handlers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Overrides {
    /// Allow writing property bag keys with reserved prefixes
    pub overwrite_system_property_bag_values: bool,
    /// Treat a duplicate data row insert as a no-op
    pub ignore_duplicate_data_row_errors: bool,
    /// Remove existing navigation nodes even when the template keeps them
    pub clear_navigation: bool,
    /// Provision content types on subsites, not only on the root site
    pub provision_content_types_to_subwebs: bool,
    /// Provision site fields on subsites, not only on the root site
    pub provision_fields_to_subwebs: bool,
}

/// Shared cancellation flag
///
/// The engine checks it between sequences, sites and handlers; a handler
/// that is already running is never interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Error::Cancelled)` once cancelled
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Options for one apply run
///
/// ```ignore
/// let options = ApplyOptions::default()
///     .with_handlers(select(None, Some("Navigation".parse()?)))
///     .with_overrides(Overrides { clear_navigation: true, ..Default::default() })
///     .with_progress(Arc::new(|e: &ProgressEvent| println!("{}%", e.percent())));
/// ```
#[derive(Clone)]
pub struct ApplyOptions {
    pub handlers: HandlerSet,
    /// Caller supplied handlers, run after the built-in handler of their kind
    pub hooks: Vec<Arc<dyn ObjectHandler>>,
    pub overrides: Overrides,
    pub retry: RetryConfig,
    pub cancel: CancelToken,
    pub progress: Arc<dyn ProgressCallback>,
    pub messages: Arc<dyn MessageCallback>,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            handlers: HandlerSet::ALL,
            hooks: Vec::new(),
            overrides: Overrides::default(),
            retry: RetryConfig::default(),
            cancel: CancelToken::default(),
            progress: Arc::new(NoProgress),
            messages: Arc::new(NoMessages),
        }
    }
}

impl ApplyOptions {
    pub fn with_handlers(mut self, handlers: HandlerSet) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn ObjectHandler>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_messages(mut self, messages: Arc<dyn MessageCallback>) -> Self {
        self.messages = messages;
        self
    }

    /// Hooks declared for a handler kind, in registration order
    pub fn hooks_for(&self, kind: HandlerKind) -> impl Iterator<Item = &Arc<dyn ObjectHandler>> {
        self.hooks.iter().filter(move |h| h.kind() == kind)
    }
}

impl fmt::Debug for ApplyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplyOptions")
            .field("handlers", &self.handlers)
            .field("hooks", &self.hooks.len())
            .field("overrides", &self.overrides)
            .field("retry", &self.retry)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// A handler (or site creation) failure that did not stop the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerFailureRecord {
    pub site_url: String,
    pub template_id: Option<String>,
    /// `None` when the site itself could not be created or opened
    pub handler: Option<HandlerKind>,
    pub message: String,
}

impl fmt::Display for HandlerFailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.handler, &self.template_id) {
            (Some(handler), Some(template)) => write!(
                f,
                "{} ({}) on {}: {}",
                handler, template, self.site_url, self.message
            ),
            (Some(handler), None) => write!(f, "{} on {}: {}", handler, self.site_url, self.message),
            (None, _) => write!(f, "{}: {}", self.site_url, self.message),
        }
    }
}

/// Outcome of one sequence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SequenceReport {
    pub id: String,
    /// Absolute urls of the sites visited, in provisioning order
    pub sites: Vec<String>,
    pub summary: ExecuteSummary,
    pub failures: Vec<HandlerFailureRecord>,
    pub completed: bool,
}

impl SequenceReport {
    pub fn is_success(&self) -> bool {
        self.completed && self.failures.is_empty() && self.summary.is_success()
    }
}

/// Outcome of an apply run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub sequences: Vec<SequenceReport>,
    /// Distinct warnings, in emission order
    pub warnings: Vec<String>,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.sequences.iter().all(SequenceReport::is_success)
    }

    /// Summary over all sequences
    pub fn summary(&self) -> ExecuteSummary {
        let mut total = ExecuteSummary::default();
        for sequence in &self.sequences {
            total.merge(&sequence.summary);
        }
        total
    }

    pub fn failures(&self) -> impl Iterator<Item = &HandlerFailureRecord> {
        self.sequences.iter().flat_map(|s| s.failures.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_add_and_merge() {
        let mut summary = ExecuteSummary::default();
        summary.add_result(&ApplyResult::Created);
        summary.add_result(&ApplyResult::NoChange);
        summary.add_result(&ApplyResult::Skipped {
            reason: "reserved".into(),
        });

        let mut other = ExecuteSummary::default();
        other.add_result(&ApplyResult::Failed {
            error: "denied".into(),
        });
        summary.merge(&other);

        assert_eq!(summary.total(), 4);
        assert_eq!(summary.total_changes(), 1);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());
        clone.cancel();
        assert!(matches!(token.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_report_success() {
        let mut report = ApplyReport {
            sequences: vec![SequenceReport {
                id: "a".into(),
                completed: true,
                ..Default::default()
            }],
            warnings: vec!["x".into()],
        };
        assert!(report.is_success());

        report.sequences[0].failures.push(HandlerFailureRecord {
            site_url: "https://t/sites/a".into(),
            template_id: Some("T".into()),
            handler: Some(HandlerKind::Navigation),
            message: "denied".into(),
        });
        assert!(!report.is_success());
        assert_eq!(
            report.failures().next().unwrap().to_string(),
            "Navigation (T) on https://t/sites/a: denied"
        );
    }
}
