//! Librarian Core Library
//!
//! Resolution, automation gating, generation orchestration, outcome
//! aggregation and pull request publication for Librarian-managed language
//! repositories.

pub mod config;
pub mod container;
pub mod error;
pub mod fakes;
pub mod gate;
pub mod generate;
pub mod git;
pub mod github;
pub mod obs;
pub mod outcome;
pub mod publish;
pub mod regenerate;
pub mod resolver;
pub mod telemetry;

pub use config::{
    format_timestamp, ContainerConfig, InvocationConfig, InvocationFlags, RepoLocation,
    DEFAULT_IMAGE_REPOSITORY,
};
pub use container::env::{EnvironmentResolver, GcloudSecretStore, HostEnvironment, SecretStore};
pub use container::{Builder, ContainerInvocation, DockerRunner, Generator};
pub use error::{LibrarianError, Result};
pub use gate::{gate_library, permits, ActionKind, GateDecision};
pub use generate::{
    copy_dir_all, run_generate, GenerateDeps, GenerateOutcome, GenerateRequest,
    GenerationOrchestrator, GenerationStrategy,
};
pub use git::{capture_head_sha, is_git_repo, GitRepo, GitRepoOpener, LanguageRepository, RepositoryOpener};
pub use github::{
    GitHubClient, GitHubRepo, HostingService, HostingStateProvider, NewPullRequest,
    PullRequestMetadata,
};
pub use obs::RunSpan;
pub use outcome::{render, OutcomeEvent, OutcomeRecorder, PullRequestContent, RenderedContent};
pub use publish::{plan_pull_request, PublishRequest, PullRequestPlan, PullRequestPublisher};
pub use regenerate::{run_regenerate, RegenerateDeps, RegenerateOutcome};
pub use resolver::resolve;
pub use telemetry::init_tracing;

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
