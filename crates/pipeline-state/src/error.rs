//! Error types for pipeline-state

use thiserror::Error;

/// Errors that can occur while loading, validating or saving pipeline documents
#[derive(Error, Debug)]
pub enum StateError {
    /// Document not present at the expected location
    #[error("State document not found: {0}")]
    NotFound(String),

    /// Document could not be parsed
    #[error("Failed to parse {document}: {detail}")]
    Parse { document: String, detail: String },

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Two libraries share an id
    #[error("Duplicate library id in pipeline state: {id}")]
    DuplicateLibrary { id: String },

    /// A library has an empty id
    #[error("Library at index {index} has an empty id")]
    EmptyLibraryId { index: usize },

    /// Remote fetch failed
    #[error("Failed to fetch remote state: {0}")]
    Fetch(String),

    /// The provider cannot serve this kind of source
    #[error("Unsupported state source: {0}")]
    UnsupportedSource(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Serialization(err.to_string())
    }
}
