//! Document schema for `pipeline-state.json` and `pipeline-config.json`.
//!
//! Field names follow the camelCase JSON mapping used by every managed
//! repository. Missing collections deserialize as empty and a missing
//! automation level deserializes as [`AutomationLevel::None`]. Empty
//! strings are omitted on save and unknown fields are carried through
//! unchanged, so a load/save cycle does not rewrite parts of the document
//! this crate does not model.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// How much of an action may happen without a human.
///
/// This is configuration, not a runtime state machine: no transitions are
/// defined between levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AutomationLevel {
    /// Unconfigured marker.
    #[default]
    #[serde(rename = "AUTOMATION_LEVEL_NONE", alias = "NONE")]
    None,
    /// Skip the library entirely.
    #[serde(rename = "AUTOMATION_LEVEL_BLOCKED", alias = "BLOCKED")]
    Blocked,
    /// Produce output, but a human signs off before merge/publish.
    #[serde(rename = "AUTOMATION_LEVEL_MANUAL_REVIEW", alias = "MANUAL_REVIEW")]
    ManualReview,
    /// May proceed unattended if all checks pass.
    #[serde(rename = "AUTOMATION_LEVEL_AUTOMATIC", alias = "AUTOMATIC")]
    Automatic,
}

impl AutomationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutomationLevel::None => "none",
            AutomationLevel::Blocked => "blocked",
            AutomationLevel::ManualReview => "manual_review",
            AutomationLevel::Automatic => "automatic",
        }
    }
}

impl std::fmt::Display for AutomationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One releasable unit tracked in a language repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryState {
    pub id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_version: String,

    /// Forces an explicit next release version; normally unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_version: Option<String>,

    #[serde(default)]
    pub generation_automation_level: AutomationLevel,

    #[serde(default)]
    pub release_automation_level: AutomationLevel,

    /// Instant of the last release. Several releases may land on one day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_timestamp: Option<DateTime<Utc>>,

    /// Commit in the API-definition history; empty until first generation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_generated_commit: String,

    /// Commit in the API-definition history; empty until first release.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_released_commit: String,

    /// API-definition-relative paths owned by this library.
    #[serde(default)]
    pub api_paths: Vec<String>,

    /// Repository paths whose modification concerns this library.
    #[serde(default)]
    pub source_paths: Vec<String>,

    /// Fields not modelled here, preserved on save.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl LibraryState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Builder helper for tests and fixtures.
    pub fn with_api_path(mut self, path: impl Into<String>) -> Self {
        self.api_paths.push(path.into());
        self
    }

    pub fn with_generation_level(mut self, level: AutomationLevel) -> Self {
        self.generation_automation_level = level;
        self
    }

    pub fn with_release_level(mut self, level: AutomationLevel) -> Self {
        self.release_automation_level = level;
        self
    }

    pub fn has_been_generated(&self) -> bool {
        !self.last_generated_commit.is_empty()
    }

    pub fn has_been_released(&self) -> bool {
        !self.last_released_commit.is_empty()
    }
}

/// Process-wide pipeline state, loaded once per invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    /// Version of the generation/build container image.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_tag: String,

    #[serde(default)]
    pub libraries: Vec<LibraryState>,

    /// Paths which, when changed, affect every library.
    #[serde(default)]
    pub common_source_paths: Vec<String>,

    /// API paths deliberately excluded from ownership checks.
    #[serde(default)]
    pub ignored_api_paths: Vec<String>,

    /// Fields not modelled here, preserved on save.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl PipelineState {
    /// Check load-time invariants: every library has a non-empty, unique id.
    pub fn validate(&self) -> Result<(), StateError> {
        let mut seen = HashSet::new();
        for (index, library) in self.libraries.iter().enumerate() {
            if library.id.is_empty() {
                return Err(StateError::EmptyLibraryId { index });
            }
            if !seen.insert(library.id.as_str()) {
                return Err(StateError::DuplicateLibrary {
                    id: library.id.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn library(&self, id: &str) -> Option<&LibraryState> {
        self.libraries.iter().find(|l| l.id == id)
    }

    pub fn library_mut(&mut self, id: &str) -> Option<&mut LibraryState> {
        self.libraries.iter_mut().find(|l| l.id == id)
    }
}

/// Environment variable descriptor supplied to a container command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentVariable {
    pub name: String,

    /// Secret-store key consulted when the host does not provide a value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl EnvironmentVariable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret_name: None,
            default_value: None,
        }
    }
}

/// Per-command container configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandConfig {
    #[serde(default)]
    pub environment_variables: Vec<EnvironmentVariable>,
}

/// Manually maintained pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Overrides the default image name when non-empty.
    #[serde(default)]
    pub image_name: String,

    /// Command name → configuration.
    #[serde(default)]
    pub commands: BTreeMap<String, CommandConfig>,

    /// Upper bound on commits in one generated pull request.
    /// Non-positive means unlimited.
    #[serde(default)]
    pub max_pull_request_commits: i32,
}

impl PipelineConfig {
    /// The commit limit, or `None` when unlimited.
    pub fn commit_limit(&self) -> Option<usize> {
        if self.max_pull_request_commits > 0 {
            Some(self.max_pull_request_commits as usize)
        } else {
            None
        }
    }

    pub fn command(&self, name: &str) -> Option<&CommandConfig> {
        self.commands.get(name)
    }
}
