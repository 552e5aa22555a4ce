//! Structured observability hooks for Librarian runs.
//!
//! This module provides:
//! - A command-scoped tracing span via the `RunSpan` RAII guard
//! - Emission functions for key lifecycle events: strategy selection, gate
//!   evaluation, per-item outcomes and pull request publication
//!
//! Events are emitted at `info!` (failures at `warn!`) with an `event` field
//! so JSON log lines can be filtered by kind.

use pipeline_state::AutomationLevel;
use tracing::{info, warn};

use crate::gate::{ActionKind, GateDecision};

/// RAII guard that enters a command-scoped span for the duration of a run.
///
/// # Example
///
/// ```ignore
/// let _span = RunSpan::enter("generate", "20250304T050607Z");
/// // every event below carries command = "generate"
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(command: &str, started: &str) -> Self {
        let span = tracing::info_span!("librarian.run", command = %command, started = %started);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: generation strategy chosen for an API path.
pub fn emit_strategy_selected(api_path: &str, strategy: &str, library_id: Option<&str>) {
    info!(
        event = "generate.strategy_selected",
        api_path = %api_path,
        strategy = %strategy,
        library_id = library_id.unwrap_or(""),
    );
}

/// Emit event: automation gate evaluated for a library.
pub fn emit_gate_evaluated(
    library_id: &str,
    kind: ActionKind,
    level: AutomationLevel,
    decision: GateDecision,
) {
    info!(
        event = "gate.evaluated",
        library_id = %library_id,
        action = kind.verb(),
        level = %level,
        decision = ?decision,
    );
}

/// Emit event: a batch item completed successfully.
pub fn emit_item_succeeded(item_id: &str, action: &str) {
    info!(event = "item.succeeded", item_id = %item_id, action = %action);
}

/// Emit event: a batch item failed. Full error detail stays in local logs.
pub fn emit_item_failed(item_id: &str, action: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "item.failed",
        item_id = %item_id,
        action = %action,
        error = %error,
        "Error while {action} {item_id}: {error}"
    );
}

/// Emit event: publish suppressed because push is disabled.
pub fn emit_publish_dry_run(branch: &str, title: &str, description: &str) {
    info!(
        event = "publish.dry_run",
        branch = %branch,
        "Push not specified; would have created PR with the following title and description:\n{title}\n\n{description}"
    );
}

/// Emit event: pull request created on the hosting service.
pub fn emit_pull_request_created(number: u64, url: &str, draft: bool) {
    info!(event = "publish.created", number = number, url = %url, draft = draft);
}
