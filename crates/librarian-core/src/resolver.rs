//! API path → library resolution.
//!
//! A library owns an API path when the path equals one of its `apiPaths` or
//! sits underneath one of them. Containment is segment-wise: `a/b` owns
//! `a/b/c` but not `a/bc`. Empty segments (leading, trailing or doubled
//! slashes) are ignored; comparison is case-sensitive.

use pipeline_state::PipelineState;
use tracing::debug;

use crate::error::{LibrarianError, Result};

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// True when `candidate` equals `owner` or is a segment-wise descendant of it.
pub fn path_contains(owner: &str, candidate: &str) -> bool {
    let owner = segments(owner);
    let candidate = segments(candidate);
    !owner.is_empty() && candidate.len() >= owner.len() && candidate[..owner.len()] == owner[..]
}

/// True when `api_path` is covered by the state's ignore list.
pub fn is_ignored(state: &PipelineState, api_path: &str) -> bool {
    state
        .ignored_api_paths
        .iter()
        .any(|ignored| path_contains(ignored, api_path))
}

/// Resolve `api_path` to the id of the library that owns it.
///
/// Returns `Ok(None)` when no library owns the path or the path is ignored;
/// callers use that to fall back to raw generation. More than one owning
/// library is a configuration error naming every candidate.
pub fn resolve(state: &PipelineState, api_path: &str) -> Result<Option<String>> {
    if is_ignored(state, api_path) {
        debug!(api_path, "API path is ignored by pipeline state");
        return Ok(None);
    }

    let owners: Vec<&str> = state
        .libraries
        .iter()
        .filter(|lib| lib.api_paths.iter().any(|owned| path_contains(owned, api_path)))
        .map(|lib| lib.id.as_str())
        .collect();

    match owners.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some((*only).to_string())),
        _ => Err(LibrarianError::AmbiguousOwnership {
            api_path: api_path.to_string(),
            libraries: owners.iter().map(|s| s.to_string()).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_state::LibraryState;

    fn state() -> PipelineState {
        PipelineState {
            libraries: vec![
                LibraryState::new("functions").with_api_path("google/cloud/functions/v2"),
                LibraryState::new("pubsub")
                    .with_api_path("google/pubsub/v1")
                    .with_api_path("google/pubsub/v1beta"),
                LibraryState::new("storage").with_api_path("google/storage"),
            ],
            ignored_api_paths: vec!["google/storage/internal".to_string()],
            ..PipelineState::default()
        }
    }

    #[test]
    fn exact_match_resolves() {
        assert_eq!(
            resolve(&state(), "google/cloud/functions/v2").unwrap(),
            Some("functions".to_string())
        );
    }

    #[test]
    fn descendant_resolves() {
        assert_eq!(
            resolve(&state(), "google/storage/v2").unwrap(),
            Some("storage".to_string())
        );
    }

    #[test]
    fn containment_is_segment_wise() {
        assert!(path_contains("a/b", "a/b"));
        assert!(path_contains("a/b", "a/b/c"));
        assert!(!path_contains("a/b", "a/bc"));
        assert!(!path_contains("a/b/c", "a/b"));
        assert_eq!(resolve(&state(), "google/pubsub/v1beta2").unwrap(), None);
    }

    #[test]
    fn trailing_and_doubled_slashes_are_ignored() {
        assert!(path_contains("a/b/", "a//b"));
        assert_eq!(
            resolve(&state(), "google/pubsub/v1/").unwrap(),
            Some("pubsub".to_string())
        );
    }

    #[test]
    fn empty_owner_never_matches() {
        assert!(!path_contains("", "google/pubsub/v1"));
        assert!(!path_contains("/", "google"));
    }

    #[test]
    fn unmapped_path_is_none_not_error() {
        assert_eq!(resolve(&state(), "some/unmapped/api").unwrap(), None);
    }

    #[test]
    fn ignored_path_never_resolves() {
        assert_eq!(resolve(&state(), "google/storage/internal").unwrap(), None);
        assert_eq!(
            resolve(&state(), "google/storage/internal/v1").unwrap(),
            None
        );
    }

    #[test]
    fn ambiguous_ownership_is_configuration_error() {
        let mut s = state();
        s.libraries
            .push(LibraryState::new("functions-v2").with_api_path("google/cloud/functions"));
        let err = resolve(&s, "google/cloud/functions/v2").unwrap_err();
        match err {
            LibrarianError::AmbiguousOwnership { libraries, .. } => {
                assert_eq!(libraries, vec!["functions", "functions-v2"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn ignored_path_suppresses_ambiguity() {
        let mut s = state();
        s.libraries
            .push(LibraryState::new("storage-internal").with_api_path("google/storage/internal"));
        assert_eq!(resolve(&s, "google/storage/internal").unwrap(), None);
    }

    #[test]
    fn library_matching_through_two_paths_counts_once() {
        let mut s = state();
        s.libraries[1].api_paths.push("google/pubsub".to_string());
        assert_eq!(
            resolve(&s, "google/pubsub/v1").unwrap(),
            Some("pubsub".to_string())
        );
    }
}
