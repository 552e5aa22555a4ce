//! Outcome aggregation across independent per-item operations.
//!
//! [`OutcomeRecorder`] is an ordered event log of successes and errors that
//! is safe to share between tasks. [`OutcomeRecorder::finalize`] snapshots it
//! into a [`PullRequestContent`], and [`render`] applies the partial-failure
//! policy:
//!
//! | successes | errors | result                                   |
//! |-----------|--------|------------------------------------------|
//! | 0         | 0      | nothing to publish, not an error         |
//! | 0         | ≥ 1    | refused: hard error                      |
//! | ≥ 1       | any    | publishable; errors listed, never block  |

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::obs::{emit_item_failed, emit_item_succeeded};

/// One recorded outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeEvent {
    Success {
        text: String,
    },
    /// Only the summary is kept; the underlying error is logged, never stored.
    Error {
        item_id: String,
        action: String,
        summary: String,
    },
}

/// Content of a pull request built up over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestContent {
    /// One entry per successful operation (one commit each).
    pub successes: Vec<String>,
    /// One summary per failed operation that would otherwise have committed.
    pub errors: Vec<String>,
    /// Set when any success came from a library gated for manual review.
    pub requires_review: bool,
}

impl PullRequestContent {
    pub fn is_empty(&self) -> bool {
        self.successes.is_empty() && self.errors.is_empty()
    }
}

#[derive(Debug, Default)]
struct RecorderInner {
    events: Vec<OutcomeEvent>,
    requires_review: bool,
}

/// Thread-safe, append-only outcome log.
#[derive(Debug, Default)]
pub struct OutcomeRecorder {
    inner: Mutex<RecorderInner>,
}

impl OutcomeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut RecorderInner) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    /// Record a success line, shown verbatim in the pull request.
    pub fn record_success(&self, text: impl Into<String>) {
        let text = text.into();
        self.with_inner(|inner| inner.events.push(OutcomeEvent::Success { text }));
    }

    /// Record a success for `item_id` and emit the matching event.
    pub fn record_item_success(&self, item_id: &str, action: &str, text: impl Into<String>) {
        emit_item_succeeded(item_id, action);
        self.record_success(text);
    }

    /// Record a failure which prevented one item from being processed.
    ///
    /// The full error is logged locally; the pull request only ever sees
    /// `"Error while {action} {item_id}"`. `action` describes what failed,
    /// e.g. "generating", "building", "releasing".
    pub fn record_error(&self, item_id: &str, err: &dyn std::fmt::Display, action: &str) {
        emit_item_failed(item_id, action, err);
        let summary = format!("Error while {action} {item_id}");
        self.with_inner(|inner| {
            inner.events.push(OutcomeEvent::Error {
                item_id: item_id.to_string(),
                action: action.to_string(),
                summary,
            })
        });
    }

    /// Mark the eventual pull request as needing human review.
    pub fn flag_for_review(&self) {
        self.with_inner(|inner| inner.requires_review = true);
    }

    /// Snapshot of every event recorded so far, in recording order.
    pub fn events(&self) -> Vec<OutcomeEvent> {
        self.with_inner(|inner| inner.events.clone())
    }

    /// Build the pull request content from the events recorded so far.
    pub fn finalize(&self) -> PullRequestContent {
        self.with_inner(|inner| {
            let mut content = PullRequestContent {
                requires_review: inner.requires_review,
                ..PullRequestContent::default()
            };
            for event in &inner.events {
                match event {
                    OutcomeEvent::Success { text } => content.successes.push(text.clone()),
                    OutcomeEvent::Error { summary, .. } => content.errors.push(summary.clone()),
                }
            }
            content
        })
    }
}

/// What a finalized content object turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedContent {
    /// No successes and no errors.
    Nothing,
    /// Errors only: publishing is refused.
    AllFailed { errors: Vec<String> },
    /// At least one success: a pull request body.
    Publishable { description: String },
}

const HEADING_RULE: &str = "==================";

/// Apply the partial-failure policy and render the pull request body.
pub fn render(content: &PullRequestContent) -> RenderedContent {
    match (content.successes.is_empty(), content.errors.is_empty()) {
        (true, true) => RenderedContent::Nothing,
        (true, false) => RenderedContent::AllFailed {
            errors: content.errors.clone(),
        },
        (false, true) => RenderedContent::Publishable {
            description: format!(
                "Changes Included:\n{HEADING_RULE}\n{}",
                format_list_as_markdown(&content.successes)
            ),
        },
        (false, false) => RenderedContent::Publishable {
            description: format!(
                "Errors:\n{HEADING_RULE}\n{}\n\nChanges Included:\n{HEADING_RULE}\n{}",
                format_list_as_markdown(&content.errors),
                format_list_as_markdown(&content.successes)
            ),
        },
    }
}

/// `- value\n` for each value.
pub fn format_list_as_markdown(values: &[String]) -> String {
    values.iter().map(|v| format!("- {v}\n")).collect()
}
