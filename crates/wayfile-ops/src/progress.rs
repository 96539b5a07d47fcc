//! Progress reporting and batch outcome types.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use wayfile_core::{FailureKind, FsError};

/// The type of batch being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    Copy,
    Move,
    Delete,
}

impl OperationType {
    /// Present participle shown while the batch runs.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Copy => "Copying",
            Self::Move => "Moving",
            Self::Delete => "Deleting",
        }
    }

    /// Past tense used in summaries.
    pub fn past_tense(&self) -> &'static str {
        match self {
            Self::Copy => "Copied",
            Self::Move => "Moved",
            Self::Delete => "Deleted",
        }
    }

    fn infinitive(&self) -> &'static str {
        match self {
            Self::Copy => "copied",
            Self::Move => "moved",
            Self::Delete => "deleted",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Copy => write!(f, "Copy"),
            Self::Move => write!(f, "Move"),
            Self::Delete => write!(f, "Delete"),
        }
    }
}

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// What the batch does.
    pub operation: OperationType,
    /// Zero-based index of the current item.
    pub item_index: usize,
    /// Number of items in the batch.
    pub item_count: usize,
    /// Base name of the current item.
    pub item_name: String,
    /// Bytes of the current item written so far.
    pub bytes_done: u64,
    /// Bytes the current item is expected to write (0 when unknown).
    pub bytes_total: u64,
    /// The current item is finished (successfully or not).
    pub done: bool,
}

impl ProgressEvent {
    pub(crate) fn new(operation: OperationType, item_count: usize) -> Self {
        Self {
            operation,
            item_index: 0,
            item_count,
            item_name: String::new(),
            bytes_done: 0,
            bytes_total: 0,
            done: false,
        }
    }

    /// Progress of the current item as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.done {
            100.0
        } else if self.bytes_total > 0 {
            (self.bytes_done as f64 / self.bytes_total as f64 * 100.0).min(100.0)
        } else {
            0.0
        }
    }
}

impl std::fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}/{} {} ({:.0}%)",
            self.operation.verb(),
            self.item_index + 1,
            self.item_count,
            self.item_name,
            self.percentage()
        )
    }
}

/// What the sink wants after seeing an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressFlow {
    /// Keep going.
    Continue,
    /// Stop the batch as if it had been cancelled.
    Abort,
}

/// Receives progress events, in production order, on the engine's thread.
pub trait ProgressSink {
    fn on_progress(&mut self, event: &ProgressEvent) -> ProgressFlow;
}

impl<F> ProgressSink for F
where
    F: FnMut(&ProgressEvent) -> ProgressFlow,
{
    fn on_progress(&mut self, event: &ProgressEvent) -> ProgressFlow {
        self(event)
    }
}

/// Sink that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreProgress;

impl ProgressSink for IgnoreProgress {
    fn on_progress(&mut self, _event: &ProgressEvent) -> ProgressFlow {
        ProgressFlow::Continue
    }
}

/// Overall outcome of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    /// Every item succeeded.
    Success,
    /// The user stopped the batch; earlier items stay as they are.
    Cancelled,
    /// At least one item failed.
    Failed,
}

/// One item that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// The source (or delete target) that failed.
    pub path: PathBuf,
    /// Failure class.
    pub kind: FailureKind,
    /// Human-readable detail.
    pub message: String,
}

impl ItemFailure {
    /// Create a failure record.
    pub fn new(path: impl Into<PathBuf>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }

    /// Record `error` against `path`.
    pub fn from_error(path: impl Into<PathBuf>, error: &FsError) -> Self {
        Self::new(path, error.kind(), error.to_string())
    }
}

impl std::fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Result of a finished batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// The type of batch.
    pub operation: OperationType,
    /// Overall outcome.
    pub status: BatchStatus,
    /// Number of items requested.
    pub item_count: usize,
    /// Number of items that completed.
    pub succeeded: usize,
    /// Items that failed, in order.
    pub failures: Vec<ItemFailure>,
    /// Bytes written by byte copies.
    pub bytes_copied: u64,
    /// Final paths created by copies and moves.
    pub created: Vec<PathBuf>,
    /// Paths the OS will remove at the next restart. Each is also listed
    /// in `failures`.
    pub reboot_pending: Vec<PathBuf>,
}

impl BatchReport {
    pub(crate) fn new(operation: OperationType, item_count: usize) -> Self {
        Self {
            operation,
            status: BatchStatus::Success,
            item_count,
            succeeded: 0,
            failures: Vec::new(),
            bytes_copied: 0,
            created: Vec::new(),
            reboot_pending: Vec::new(),
        }
    }

    /// Record an item whose removal only got scheduled for the next
    /// restart. It still counts as failed for this batch.
    pub(crate) fn defer_to_restart(&mut self, path: &Path) {
        self.reboot_pending.push(path.to_path_buf());
        self.failures.push(ItemFailure::new(
            path,
            FailureKind::AccessDenied,
            "in use, scheduled for deletion at the next restart",
        ));
    }

    /// Check if the batch was fully successful.
    pub fn is_success(&self) -> bool {
        self.status == BatchStatus::Success
    }

    /// Get a human-readable summary of the batch.
    pub fn summary(&self) -> String {
        let action = self.operation.past_tense();
        let mut text = format!("{} {} of {} items", action, self.succeeded, self.item_count);
        if !self.failures.is_empty() {
            text.push_str(&format!(", {} failed", self.failures.len()));
        }
        if self.status == BatchStatus::Cancelled {
            text.push_str(" (cancelled)");
        }
        text
    }

    /// The single warning to show the user, if any.
    ///
    /// Failures are grouped by class. Cancelled batches never warn.
    pub fn warning(&self) -> Option<String> {
        if self.status == BatchStatus::Cancelled {
            return None;
        }
        if self.failures.is_empty() && self.reboot_pending.is_empty() {
            return None;
        }

        let mut parts = Vec::new();
        if !self.failures.is_empty() {
            let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();
            for failure in &self.failures {
                *by_kind.entry(failure.kind.to_string()).or_default() += 1;
            }
            let classes: Vec<String> = by_kind
                .into_iter()
                .map(|(kind, count)| format!("{kind} ({count})"))
                .collect();
            parts.push(format!(
                "{} of {} items could not be {}: {}.",
                self.failures.len(),
                self.item_count,
                self.operation.infinitive(),
                classes.join(", ")
            ));
        }
        if !self.reboot_pending.is_empty() {
            parts.push(format!(
                "{} items are in use and will be deleted at the next restart.",
                self.reboot_pending.len()
            ));
        }
        Some(parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        let mut event = ProgressEvent::new(OperationType::Copy, 3);
        assert_eq!(event.percentage(), 0.0);
        event.bytes_total = 200;
        event.bytes_done = 50;
        assert_eq!(event.percentage(), 25.0);
        event.done = true;
        assert_eq!(event.percentage(), 100.0);
    }

    #[test]
    fn test_event_display() {
        let mut event = ProgressEvent::new(OperationType::Move, 3);
        event.item_index = 1;
        event.item_name = "clip.mp4".to_string();
        assert_eq!(event.to_string(), "Moving 2/3 clip.mp4 (0%)");
    }

    #[test]
    fn test_summary_and_warning() {
        let mut report = BatchReport::new(OperationType::Delete, 3);
        report.succeeded = 1;
        report.status = BatchStatus::Failed;
        report.failures.push(ItemFailure::new("/a", FailureKind::AccessDenied, "denied"));
        report.failures.push(ItemFailure::new("/b", FailureKind::AccessDenied, "denied"));
        report.reboot_pending.push(PathBuf::from("/c"));

        assert_eq!(report.summary(), "Deleted 1 of 3 items, 2 failed");
        let warning = report.warning().unwrap();
        assert!(warning.contains("locked, in use, or permission denied (2)"));
        assert!(warning.contains("next restart"));
    }

    #[test]
    fn test_restart_deferral_counts_as_failure() {
        let mut report = BatchReport::new(OperationType::Delete, 1);
        report.defer_to_restart(Path::new("/locked.db"));

        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failures[0].kind, FailureKind::AccessDenied);
        assert_eq!(report.reboot_pending, vec![PathBuf::from("/locked.db")]);
        assert!(report.warning().unwrap().contains("next restart"));
    }

    #[test]
    fn test_cancelled_batch_has_no_warning() {
        let mut report = BatchReport::new(OperationType::Copy, 2);
        report.status = BatchStatus::Cancelled;
        report.failures.push(ItemFailure::new("/a", FailureKind::NotFound, "gone"));
        assert!(report.warning().is_none());
        assert!(report.summary().ends_with("(cancelled)"));
    }

    #[test]
    fn test_closure_sink() {
        let mut seen = 0;
        let mut sink = |_: &ProgressEvent| {
            seen += 1;
            ProgressFlow::Abort
        };
        let event = ProgressEvent::new(OperationType::Copy, 1);
        assert_eq!(sink.on_progress(&event), ProgressFlow::Abort);
        assert_eq!(IgnoreProgress.on_progress(&event), ProgressFlow::Continue);
        assert_eq!(seen, 1);
    }
}
