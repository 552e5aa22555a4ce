//! Pull request publication.
//!
//! The publisher turns finalized [`PullRequestContent`] into a pushed branch
//! and a pull request. With push disabled it only logs what would have been
//! created.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::config::format_timestamp;
use crate::error::{LibrarianError, Result};
use crate::git::LanguageRepository;
use crate::github::{GitHubRepo, HostingService, NewPullRequest, PullRequestMetadata};
use crate::obs::{emit_publish_dry_run, emit_pull_request_created};
use crate::outcome::{render, PullRequestContent, RenderedContent};

/// Appended to the description of pull requests that need human review.
pub const REVIEW_NOTICE: &str =
    "At least one library in this pull request is configured for manual review; \
     please review the changes before merging.";

/// Fixed parts of one publication.
#[derive(Debug, Clone)]
pub struct PublishRequest<'a> {
    /// e.g. `"feat: API regeneration"`.
    pub title_prefix: &'a str,
    /// Extra paragraph appended to the description; may be empty.
    pub description_suffix: &'a str,
    /// e.g. `"regen"`, used in the branch name.
    pub branch_type: &'a str,
    pub now: DateTime<Utc>,
}

/// Everything needed to push and open one pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestPlan {
    pub branch: String,
    pub title: String,
    pub description: String,
    pub draft: bool,
}

/// Apply the partial-failure policy to `content`.
///
/// `Ok(None)` when there is nothing to publish; `Err(AllItemsFailed)` when
/// every recorded operation failed.
pub fn plan_pull_request(
    content: &PullRequestContent,
    request: &PublishRequest<'_>,
) -> Result<Option<PullRequestPlan>> {
    let mut description = match render(content) {
        RenderedContent::Nothing => {
            info!("no pull request to create, and no errors");
            return Ok(None);
        }
        RenderedContent::AllFailed { errors } => {
            error!("no pull request to create, but errors were logged (and restated below); aborting");
            for e in &errors {
                error!("{e}");
            }
            return Err(LibrarianError::AllItemsFailed { errors });
        }
        RenderedContent::Publishable { description } => description,
    };

    if content.requires_review {
        description.push('\n');
        description.push_str(REVIEW_NOTICE);
    }
    if !request.description_suffix.is_empty() {
        description.push('\n');
        description.push_str(request.description_suffix);
    }

    let ts = format_timestamp(&request.now);
    Ok(Some(PullRequestPlan {
        branch: format!("librarian-{}-{ts}", request.branch_type),
        title: format!("{}: {ts}", request.title_prefix),
        description,
        draft: content.requires_review,
    }))
}

/// Pushes branches and opens pull requests.
pub struct PullRequestPublisher {
    hosting: Arc<dyn HostingService>,
    push: bool,
}

impl PullRequestPublisher {
    pub fn new(hosting: Arc<dyn HostingService>, push: bool) -> Self {
        Self { hosting, push }
    }

    /// Publish `content` from `repo`.
    ///
    /// The branch is pushed before the pull request is created; a push
    /// failure is returned without creating anything.
    pub async fn publish(
        &self,
        repo: &dyn LanguageRepository,
        content: &PullRequestContent,
        request: &PublishRequest<'_>,
    ) -> Result<Option<PullRequestMetadata>> {
        let Some(plan) = plan_pull_request(content, request)? else {
            return Ok(None);
        };

        if !self.push {
            emit_publish_dry_run(&plan.branch, &plan.title, &plan.description);
            return Ok(None);
        }

        let github_repo = GitHubRepo::parse_url(&repo.remote_url()?)?;
        let token = self.hosting.access_token()?;
        if let Err(e) = repo.push_branch(&plan.branch, &token) {
            info!(branch = %plan.branch, error = %e, "received error pushing branch");
            return Err(e);
        }

        let metadata = self
            .hosting
            .create_pull_request(
                &github_repo,
                NewPullRequest {
                    head: &plan.branch,
                    title: &plan.title,
                    body: &plan.description,
                    draft: plan.draft,
                },
            )
            .await?;
        emit_pull_request_created(metadata.number, &metadata.url, metadata.draft);
        Ok(Some(metadata))
    }
}
