//! Automation gate.
//!
//! Maps an [`AutomationLevel`] to a [`GateDecision`]. The mapping is total
//! over the closed level set and `None` shares the `Blocked` arm, so an
//! unconfigured library can never be treated as permissive.

use pipeline_state::{AutomationLevel, LibraryState};
use serde::{Deserialize, Serialize};

use crate::obs::emit_gate_evaluated;

/// Kind of automated action being gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Generate,
    Release,
}

impl ActionKind {
    /// Present participle used in outcome summaries ("Error while generating x").
    pub fn verb(&self) -> &'static str {
        match self {
            ActionKind::Generate => "generating",
            ActionKind::Release => "releasing",
        }
    }
}

/// Outcome of gating one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    /// Do nothing for this library.
    Skip,
    /// Produce output; the resulting pull request needs human sign-off.
    ProceedWithReview,
    /// May complete unattended.
    Proceed,
}

impl GateDecision {
    pub fn may_proceed(&self) -> bool {
        !matches!(self, GateDecision::Skip)
    }

    pub fn requires_review(&self) -> bool {
        matches!(self, GateDecision::ProceedWithReview)
    }
}

/// Decide whether an action at `level` may go ahead.
///
/// With `require_unattended`, only `Automatic` proceeds: the caller has no
/// way to attach a review flag to its result.
pub fn permits(level: AutomationLevel, require_unattended: bool) -> GateDecision {
    match level {
        AutomationLevel::None | AutomationLevel::Blocked => GateDecision::Skip,
        AutomationLevel::ManualReview if require_unattended => GateDecision::Skip,
        AutomationLevel::ManualReview => GateDecision::ProceedWithReview,
        AutomationLevel::Automatic => GateDecision::Proceed,
    }
}

/// The library's level for `kind`. Generation and release are configured independently.
pub fn library_level(library: &LibraryState, kind: ActionKind) -> AutomationLevel {
    match kind {
        ActionKind::Generate => library.generation_automation_level,
        ActionKind::Release => library.release_automation_level,
    }
}

/// Gate `kind` for `library`, emitting a structured event.
pub fn gate_library(
    library: &LibraryState,
    kind: ActionKind,
    require_unattended: bool,
) -> GateDecision {
    let level = library_level(library, kind);
    let decision = permits(level, require_unattended);
    emit_gate_evaluated(&library.id, kind, level, decision);
    decision
}
