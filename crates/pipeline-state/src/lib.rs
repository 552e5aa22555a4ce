//! Pipeline-State: persisted documents for Librarian
//!
//! This crate owns the two documents every managed language repository
//! carries under `generator-input/`:
//!
//! - `pipeline-state.json`: machine-maintained record of every tracked
//!   library, its API path ownership and generation/release history.
//! - `pipeline-config.json`: manually maintained image and command settings.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: faithful serde mapping, load-time validation and a narrow
//! [`StateProvider`] seam so callers never care where a document came from.
//!
//! ## Key Components
//!
//! - `PipelineState` / `LibraryState`: tracked libraries and ownership
//! - `AutomationLevel`: per-library, per-action automation setting
//! - `PipelineConfig` / `CommandConfig`: container image and environment
//! - `StateProvider`: loads state from a local checkout or a remote reference

mod error;
pub mod fakes;
pub mod provider;
mod schema;

pub use error::StateError;
pub use provider::{
    generator_input_dir, load_pipeline_config_file, load_pipeline_state_file,
    load_repo_state_and_config, parse_pipeline_state, save_pipeline_state_file,
    FileStateProvider, StateProvider, StateSource, GENERATOR_INPUT_DIR, PIPELINE_CONFIG_FILE,
    PIPELINE_STATE_FILE,
};
pub use schema::{
    AutomationLevel, CommandConfig, EnvironmentVariable, LibraryState, PipelineConfig,
    PipelineState,
};

/// Result type for pipeline-state operations
pub type Result<T> = std::result::Result<T, StateError>;
