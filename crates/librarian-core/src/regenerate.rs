//! Batch regeneration of every library in a language repository.
//!
//! Each library is gated, regenerated, committed and recorded independently:
//! a failure on one library is recorded and its working-tree changes are
//! discarded before moving on. If those changes cannot be discarded the
//! batch stops before any further commit. One pull request covers the
//! whole batch.
//!
//! Libraries are processed sequentially because they share one working tree.

use std::path::Path;
use std::sync::Arc;

use pipeline_state::{
    generator_input_dir, load_repo_state_and_config, save_pipeline_state_file, PipelineState,
    PIPELINE_STATE_FILE,
};
use tracing::{error, info, warn};

use crate::config::{ContainerConfig, InvocationConfig};
use crate::error::Result;
use crate::gate::{gate_library, ActionKind};
use crate::generate::GenerationOrchestrator;
use crate::git::{capture_head_sha, LanguageRepository, RepositoryOpener};
use crate::github::PullRequestMetadata;
use crate::outcome::{OutcomeRecorder, PullRequestContent};
use crate::publish::{PublishRequest, PullRequestPublisher};

pub const REGEN_TITLE_PREFIX: &str = "feat: API regeneration";
pub const REGEN_BRANCH_TYPE: &str = "regen";

/// Collaborators for the `regenerate` command.
pub struct RegenerateDeps {
    pub opener: Arc<dyn RepositoryOpener>,
    pub orchestrator: GenerationOrchestrator,
    pub publisher: PullRequestPublisher,
}

/// Result of a batch regeneration that reached publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegenerateOutcome {
    pub content: PullRequestContent,
    /// Permitted libraries left out because the commit limit was reached.
    pub deferred: Vec<String>,
    pub pull_request: Option<PullRequestMetadata>,
}

/// Description paragraph listing libraries deferred by the commit limit.
pub fn deferred_suffix(deferred: &[String], limit: usize) -> String {
    if deferred.is_empty() {
        return String::new();
    }
    let mut suffix = format!(
        "Commit limit ({limit}) reached; the following libraries were not regenerated:\n"
    );
    for id in deferred {
        suffix.push_str(&format!("- {id}\n"));
    }
    suffix
}

struct BatchContext<'a> {
    container: &'a ContainerConfig,
    api_root: &'a Path,
    api_commit: Option<&'a str>,
    work_root: &'a Path,
    build: bool,
}

/// Regenerate one library and commit it.
///
/// Returns `Ok(false)` when regeneration produced no changes. On success
/// `state` carries the updated bookkeeping; on failure it is untouched.
async fn regenerate_one(
    ctx: &BatchContext<'_>,
    orchestrator: &GenerationOrchestrator,
    repo: &dyn LanguageRepository,
    state: &mut PipelineState,
    library_id: &str,
) -> Result<bool> {
    let output_dir = ctx.work_root.join(format!("output-{library_id}"));
    std::fs::create_dir_all(&output_dir)?;

    orchestrator
        .regenerate_library(
            ctx.container,
            library_id,
            ctx.api_root,
            &output_dir,
            repo.dir(),
            ctx.build,
        )
        .await?;

    let mut next = state.clone();
    if let (Some(commit), Some(library)) = (ctx.api_commit, next.library_mut(library_id)) {
        library.last_generated_commit = commit.to_string();
    }
    save_pipeline_state_file(
        &generator_input_dir(repo.dir()).join(PIPELINE_STATE_FILE),
        &next,
    )?;

    if repo.is_clean()? {
        info!(library_id, "regeneration produced no changes");
        return Ok(false);
    }
    repo.commit_all(&format!("feat: Regenerated {library_id}"))?;
    *state = next;
    Ok(true)
}

/// Run the `regenerate` command.
pub async fn run_regenerate(
    config: &InvocationConfig,
    deps: &RegenerateDeps,
) -> Result<RegenerateOutcome> {
    let api_root = std::fs::canonicalize(config.require_api_root()?)?;
    let location = config.require_repo()?;

    let repo = deps.opener.open_or_clone(location, &config.work_root)?;
    let (mut state, pipeline_config) = load_repo_state_and_config(repo.dir())?;
    let container = config.container_config(Some(&state), Some(&pipeline_config))?;

    let api_commit = match capture_head_sha(&api_root) {
        Ok(sha) => Some(sha),
        Err(e) => {
            warn!(error = %e, "cannot read API root HEAD; lastGeneratedCommit will not be updated");
            None
        }
    };

    let ctx = BatchContext {
        container: &container,
        api_root: &api_root,
        api_commit: api_commit.as_deref(),
        work_root: &config.work_root,
        build: config.build,
    };

    let recorder = OutcomeRecorder::new();
    let limit = pipeline_config.commit_limit();
    let mut commits = 0usize;
    let mut deferred = Vec::new();

    let candidates: Vec<_> = state
        .libraries
        .iter()
        .map(|lib| (lib.id.clone(), gate_library(lib, ActionKind::Generate, false)))
        .collect();

    for (library_id, decision) in candidates {
        if !decision.may_proceed() {
            info!(library_id = %library_id, "generation not permitted; skipping");
            continue;
        }
        if limit.is_some_and(|limit| commits >= limit) {
            deferred.push(library_id);
            continue;
        }

        match regenerate_one(&ctx, &deps.orchestrator, repo.as_ref(), &mut state, &library_id).await
        {
            Ok(true) => {
                commits += 1;
                recorder.record_item_success(
                    &library_id,
                    ActionKind::Generate.verb(),
                    format!("Regenerated {library_id}"),
                );
                if decision.requires_review() {
                    recorder.flag_for_review();
                }
            }
            Ok(false) => {}
            Err(e) => {
                recorder.record_error(&library_id, &e, ActionKind::Generate.verb());
                // The next library must start from a clean tree.
                if let Err(discard) = repo.discard_changes() {
                    error!(library_id = %library_id, error = %discard, "failed to discard changes; aborting batch");
                    return Err(discard);
                }
            }
        }
    }

    let content = recorder.finalize();
    let suffix = limit
        .map(|limit| deferred_suffix(&deferred, limit))
        .unwrap_or_default();
    let pull_request = deps
        .publisher
        .publish(
            repo.as_ref(),
            &content,
            &PublishRequest {
                title_prefix: REGEN_TITLE_PREFIX,
                description_suffix: &suffix,
                branch_type: REGEN_BRANCH_TYPE,
                now: config.start_time,
            },
        )
        .await?;

    Ok(RegenerateOutcome {
        content,
        deferred,
        pull_request,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deferred_suffix_lists_every_library() {
        let suffix = deferred_suffix(&["b".to_string(), "c".to_string()], 1);
        assert_eq!(
            suffix,
            "Commit limit (1) reached; the following libraries were not regenerated:\n- b\n- c\n"
        );
    }

    #[test]
    fn no_deferred_libraries_no_suffix() {
        assert_eq!(deferred_suffix(&[], 3), "");
    }
}
