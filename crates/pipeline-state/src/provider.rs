//! Loading and saving pipeline documents.
//!
//! [`StateProvider`] is the seam orchestration code depends on. The
//! [`FileStateProvider`] serves local checkouts; remote references are served
//! by the hosting-service client in `librarian-core`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::StateError;
use crate::schema::{PipelineConfig, PipelineState};
use crate::Result;

/// Directory (relative to a language repository root) holding generator input.
pub const GENERATOR_INPUT_DIR: &str = "generator-input";

/// State document file name inside [`GENERATOR_INPUT_DIR`].
pub const PIPELINE_STATE_FILE: &str = "pipeline-state.json";

/// Config document file name inside [`GENERATOR_INPUT_DIR`].
pub const PIPELINE_CONFIG_FILE: &str = "pipeline-config.json";

/// Where a pipeline state document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateSource {
    /// A language repository checked out at this root.
    Local(PathBuf),
    /// A remote repository URL at a revision such as `"HEAD"`.
    Remote { url: String, revision: String },
}

impl StateSource {
    pub fn remote_head(url: impl Into<String>) -> Self {
        StateSource::Remote {
            url: url.into(),
            revision: "HEAD".to_string(),
        }
    }
}

impl std::fmt::Display for StateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateSource::Local(path) => write!(f, "{}", path.display()),
            StateSource::Remote { url, revision } => write!(f, "{url}@{revision}"),
        }
    }
}

/// Loads pipeline state from some source.
#[async_trait]
pub trait StateProvider: Send + Sync {
    /// Load and validate the state document at `source`.
    async fn load_pipeline_state(&self, source: &StateSource) -> Result<PipelineState>;
}

/// Serves [`StateSource::Local`] from the filesystem.
#[derive(Debug, Default, Clone)]
pub struct FileStateProvider;

impl FileStateProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StateProvider for FileStateProvider {
    async fn load_pipeline_state(&self, source: &StateSource) -> Result<PipelineState> {
        match source {
            StateSource::Local(repo_root) => {
                load_pipeline_state_file(&generator_input_dir(repo_root).join(PIPELINE_STATE_FILE))
            }
            StateSource::Remote { .. } => Err(StateError::UnsupportedSource(source.to_string())),
        }
    }
}

/// `{repo_root}/generator-input`
pub fn generator_input_dir(repo_root: &Path) -> PathBuf {
    repo_root.join(GENERATOR_INPUT_DIR)
}

/// Parse and validate a state document.
pub fn parse_pipeline_state(bytes: &[u8]) -> Result<PipelineState> {
    let state: PipelineState =
        serde_json::from_slice(bytes).map_err(|e| StateError::Parse {
            document: PIPELINE_STATE_FILE.to_string(),
            detail: e.to_string(),
        })?;
    state.validate()?;
    Ok(state)
}

/// Load and validate the state document at `path`.
pub fn load_pipeline_state_file(path: &Path) -> Result<PipelineState> {
    if !path.exists() {
        return Err(StateError::NotFound(path.display().to_string()));
    }
    let bytes = std::fs::read(path)?;
    let state = parse_pipeline_state(&bytes)?;
    debug!(
        path = %path.display(),
        libraries = state.libraries.len(),
        "loaded pipeline state"
    );
    Ok(state)
}

/// Write the state document to `path` as pretty JSON with a trailing newline.
pub fn save_pipeline_state_file(path: &Path, state: &PipelineState) -> Result<()> {
    let mut content = serde_json::to_string_pretty(state)?;
    content.push('\n');
    std::fs::write(path, content)?;
    Ok(())
}

/// Load the config document at `path`.
pub fn load_pipeline_config_file(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        return Err(StateError::NotFound(path.display().to_string()));
    }
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| StateError::Parse {
        document: PIPELINE_CONFIG_FILE.to_string(),
        detail: e.to_string(),
    })
}

/// Load both documents from a checked-out repository.
///
/// The state document is required; a missing config document yields
/// [`PipelineConfig::default`].
pub fn load_repo_state_and_config(repo_root: &Path) -> Result<(PipelineState, PipelineConfig)> {
    let input = generator_input_dir(repo_root);
    let state = load_pipeline_state_file(&input.join(PIPELINE_STATE_FILE))?;
    let config_path = input.join(PIPELINE_CONFIG_FILE);
    let config = if config_path.exists() {
        load_pipeline_config_file(&config_path)?
    } else {
        debug!(path = %config_path.display(), "no pipeline config; using defaults");
        PipelineConfig::default()
    };
    Ok((state, config))
}
