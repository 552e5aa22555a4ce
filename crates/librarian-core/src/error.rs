//! Error taxonomy for Librarian orchestration.
//!
//! Configuration errors abort before any side effect. Resolution misses are
//! not errors at all (they select raw generation). Per-item failures are
//! recorded by the outcome recorder; publish-layer failures and all-failure
//! batches are returned to the caller.

use pipeline_state::StateError;

/// Librarian errors.
#[derive(Debug, thiserror::Error)]
pub enum LibrarianError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("API path {api_path} is claimed by multiple libraries: {libraries:?}")]
    AmbiguousOwnership {
        api_path: String,
        libraries: Vec<String>,
    },

    #[error("bug in librarian: {0}")]
    Internal(String),

    #[error("container command {command} failed: {detail}")]
    Container { command: String, detail: String },

    #[error("git error: {0}")]
    Git(String),

    #[error("hosting service error: {0}")]
    Hosting(String),

    #[error("secret lookup failed for {name}: {detail}")]
    Secret { name: String, detail: String },

    #[error(
        "errors encountered but no pull request to create ({} error(s))",
        .errors.len()
    )]
    AllItemsFailed { errors: Vec<String> },

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LibrarianError {
    /// Errors that must abort a run before any side effect.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LibrarianError::Config(_)
                | LibrarianError::AmbiguousOwnership { .. }
                | LibrarianError::State(StateError::DuplicateLibrary { .. })
                | LibrarianError::State(StateError::EmptyLibraryId { .. })
        )
    }
}

/// Result type for Librarian operations.
pub type Result<T> = std::result::Result<T, LibrarianError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_ownership_names_every_candidate() {
        let err = LibrarianError::AmbiguousOwnership {
            api_path: "google/cloud/run/v2".to_string(),
            libraries: vec!["run".to_string(), "run-admin".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("google/cloud/run/v2"));
        assert!(msg.contains("run-admin"));
        assert!(err.is_configuration());
    }

    #[test]
    fn all_items_failed_reports_count() {
        let err = LibrarianError::AllItemsFailed {
            errors: vec!["Error while generating a".to_string(); 3],
        };
        assert!(err.to_string().contains("3 error(s)"));
        assert!(!err.is_configuration());
    }

    #[test]
    fn duplicate_library_state_is_configuration() {
        let err: LibrarianError = StateError::DuplicateLibrary {
            id: "x".to_string(),
        }
        .into();
        assert!(err.is_configuration());
        assert!(!LibrarianError::Git("push rejected".to_string()).is_configuration());
    }
}
