//! Batch regeneration: per-library isolation, gating and publication.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use librarian_core::fakes::{
    ContainerCall, FixedOpener, MemoryHostingService, MemoryRepository, RecordingContainer,
};
use librarian_core::{
    capture_head_sha, run_regenerate, GenerationOrchestrator, InvocationConfig, InvocationFlags,
    LibrarianError, PullRequestPublisher, RegenerateDeps,
};
use pipeline_state::{
    load_pipeline_state_file, save_pipeline_state_file, AutomationLevel, LibraryState,
    PipelineConfig, PipelineState, GENERATOR_INPUT_DIR, PIPELINE_CONFIG_FILE, PIPELINE_STATE_FILE,
};

const REMOTE: &str = "https://github.com/googleapis/google-cloud-dotnet";
const BRANCH: &str = "librarian-regen-20250304T050607Z";

struct Fixture {
    _dirs: Vec<tempfile::TempDir>,
    api_root: PathBuf,
    repo_dir: PathBuf,
    work_root: PathBuf,
}

fn library(id: &str, level: AutomationLevel) -> LibraryState {
    LibraryState::new(id)
        .with_api_path(format!("google/cloud/{id}/v1"))
        .with_generation_level(level)
}

fn fixture(libraries: Vec<LibraryState>, pipeline_config: Option<PipelineConfig>) -> Fixture {
    let api = tempfile::tempdir().unwrap();
    let repo = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();

    let input = repo.path().join(GENERATOR_INPUT_DIR);
    std::fs::create_dir_all(&input).unwrap();
    let state = PipelineState {
        image_tag: "v1".to_string(),
        libraries,
        ..PipelineState::default()
    };
    save_pipeline_state_file(&input.join(PIPELINE_STATE_FILE), &state).unwrap();
    if let Some(cfg) = pipeline_config {
        std::fs::write(
            input.join(PIPELINE_CONFIG_FILE),
            serde_json::to_vec_pretty(&cfg).unwrap(),
        )
        .unwrap();
    }

    Fixture {
        api_root: api.path().to_path_buf(),
        repo_dir: repo.path().to_path_buf(),
        work_root: work.path().to_path_buf(),
        _dirs: vec![api, repo, work],
    }
}

fn automatic(ids: &[&str]) -> Vec<LibraryState> {
    ids.iter()
        .map(|id| library(id, AutomationLevel::Automatic))
        .collect()
}

fn config(fx: &Fixture, push: bool) -> InvocationConfig {
    let flags = InvocationFlags {
        work_root: Some(fx.work_root.clone()),
        api_root: Some(fx.api_root.clone()),
        repo_root: Some(fx.repo_dir.clone()),
        language: Some("dotnet".to_string()),
        push,
        ..InvocationFlags::default()
    };
    InvocationConfig::from_flags(flags, Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap())
        .unwrap()
}

struct Harness {
    deps: RegenerateDeps,
    repo: MemoryRepository,
    hosting: Arc<MemoryHostingService>,
    container: Arc<RecordingContainer>,
}

fn harness(repo: MemoryRepository, container: RecordingContainer, push: bool) -> Harness {
    let hosting = Arc::new(MemoryHostingService::new());
    let container = Arc::new(container);
    let deps = RegenerateDeps {
        opener: Arc::new(FixedOpener::new(repo.clone())),
        orchestrator: GenerationOrchestrator::new(container.clone(), container.clone()),
        publisher: PullRequestPublisher::new(hosting.clone(), push),
    };
    Harness {
        deps,
        repo,
        hosting,
        container,
    }
}

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

#[tokio::test]
async fn one_failure_does_not_block_the_batch() {
    let fx = fixture(automatic(&["a", "b", "c"]), None);
    let h = harness(
        MemoryRepository::at(&fx.repo_dir, REMOTE),
        RecordingContainer::new().failing_on("b"),
        true,
    );

    let outcome = run_regenerate(&config(&fx, true), &h.deps).await.unwrap();

    assert_eq!(
        outcome.content.successes,
        vec!["Regenerated a", "Regenerated c"]
    );
    assert_eq!(outcome.content.errors, vec!["Error while generating b"]);
    assert_eq!(
        h.repo.commits(),
        vec!["feat: Regenerated a", "feat: Regenerated c"]
    );
    assert_eq!(h.repo.discards(), 1);
    assert_eq!(h.repo.pushes(), vec![BRANCH]);

    let created = h.hosting.created();
    assert_eq!(created.len(), 1);
    let body = &created[0].body;
    assert!(body.contains("- Regenerated a\n"));
    assert!(body.contains("- Regenerated c\n"));
    assert!(body.contains("- Error while generating b\n"));
    assert!(!body.contains("registry credentials"));
    assert!(!created[0].draft);
    assert_eq!(outcome.pull_request.unwrap().number, 1);
}

#[tokio::test]
async fn failed_discard_stops_the_batch_before_more_commits() {
    let fx = fixture(automatic(&["a", "b", "c"]), None);
    let h = harness(
        MemoryRepository::at(&fx.repo_dir, REMOTE).failing_discard(),
        RecordingContainer::new().failing_on("b"),
        true,
    );

    let err = run_regenerate(&config(&fx, true), &h.deps)
        .await
        .unwrap_err();
    assert!(matches!(err, LibrarianError::Git(_)));
    assert_eq!(h.repo.commits(), vec!["feat: Regenerated a"]);
    assert!(h.repo.pushes().is_empty());
    assert!(h.hosting.created().is_empty());

    let generated: Vec<_> = h
        .container
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ContainerCall::GenerateLibrary { library_id, .. } => Some(library_id),
            _ => None,
        })
        .collect();
    assert_eq!(generated, vec!["a", "b"]);
}

#[tokio::test]
async fn all_failures_escalate_without_publishing() {
    let fx = fixture(automatic(&["a", "b"]), None);
    let h = harness(
        MemoryRepository::at(&fx.repo_dir, REMOTE),
        RecordingContainer::new().failing_on("a").failing_on("b"),
        true,
    );

    let err = run_regenerate(&config(&fx, true), &h.deps)
        .await
        .unwrap_err();
    match err {
        LibrarianError::AllItemsFailed { errors } => assert_eq!(errors.len(), 2),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(h.repo.pushes().is_empty());
    assert!(h.hosting.created().is_empty());
}

#[tokio::test]
async fn dry_run_returns_no_metadata() {
    let fx = fixture(automatic(&["a"]), None);
    let h = harness(
        MemoryRepository::at(&fx.repo_dir, REMOTE),
        RecordingContainer::new(),
        false,
    );

    let outcome = run_regenerate(&config(&fx, false), &h.deps).await.unwrap();
    assert_eq!(outcome.pull_request, None);
    assert_eq!(outcome.content.successes, vec!["Regenerated a"]);
    assert!(h.repo.pushes().is_empty());
    assert!(h.hosting.created().is_empty());
}

#[tokio::test]
async fn push_failure_stops_before_pull_request() {
    let fx = fixture(automatic(&["a"]), None);
    let h = harness(
        MemoryRepository::at(&fx.repo_dir, REMOTE).failing_push(),
        RecordingContainer::new(),
        true,
    );

    let err = run_regenerate(&config(&fx, true), &h.deps)
        .await
        .unwrap_err();
    assert!(matches!(err, LibrarianError::Git(_)));
    assert!(h.hosting.created().is_empty());
}

#[tokio::test]
async fn gate_skips_blocked_and_drafts_manual_review() {
    let fx = fixture(
        vec![
            library("auto", AutomationLevel::Automatic),
            library("blocked", AutomationLevel::Blocked),
            library("unset", AutomationLevel::None),
            library("manual", AutomationLevel::ManualReview),
        ],
        None,
    );
    let h = harness(
        MemoryRepository::at(&fx.repo_dir, REMOTE),
        RecordingContainer::new(),
        true,
    );

    let outcome = run_regenerate(&config(&fx, true), &h.deps).await.unwrap();
    assert_eq!(
        outcome.content.successes,
        vec!["Regenerated auto", "Regenerated manual"]
    );
    assert!(outcome.content.requires_review);

    let generated: Vec<_> = h
        .container
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ContainerCall::GenerateLibrary { library_id, .. } => Some(library_id),
            _ => None,
        })
        .collect();
    assert_eq!(generated, vec!["auto", "manual"]);

    let created = h.hosting.created();
    assert!(created[0].draft);
    assert!(created[0].body.contains("manual review"));
}

#[tokio::test]
async fn commit_limit_defers_remaining_libraries() {
    let pipeline_config = PipelineConfig {
        max_pull_request_commits: 2,
        ..PipelineConfig::default()
    };
    let fx = fixture(automatic(&["a", "b", "c", "d"]), Some(pipeline_config));
    let h = harness(
        MemoryRepository::at(&fx.repo_dir, REMOTE),
        RecordingContainer::new(),
        true,
    );

    let outcome = run_regenerate(&config(&fx, true), &h.deps).await.unwrap();
    assert_eq!(h.repo.commits().len(), 2);
    assert_eq!(outcome.deferred, vec!["c", "d"]);
    let body = &h.hosting.created()[0].body;
    assert!(body.contains("Commit limit (2) reached"));
    assert!(body.ends_with("- c\n- d\n"));
}

#[tokio::test]
async fn unchanged_tree_publishes_nothing() {
    let fx = fixture(automatic(&["a"]), None);
    let h = harness(
        MemoryRepository::at(&fx.repo_dir, REMOTE).clean(),
        RecordingContainer::new(),
        true,
    );

    let outcome = run_regenerate(&config(&fx, true), &h.deps).await.unwrap();
    assert!(outcome.content.is_empty());
    assert_eq!(outcome.pull_request, None);
    assert!(h.repo.commits().is_empty());
    assert!(h.repo.pushes().is_empty());
}

#[tokio::test]
async fn successful_libraries_record_api_head() {
    let fx = fixture(automatic(&["a", "b", "c"]), None);
    git(&fx.api_root, &["init"]);
    git(&fx.api_root, &["config", "user.name", "test-user"]);
    git(&fx.api_root, &["config", "user.email", "test@example.com"]);
    git(&fx.api_root, &["commit", "--allow-empty", "-m", "initial"]);
    let head = capture_head_sha(&fx.api_root).unwrap();

    let h = harness(
        MemoryRepository::at(&fx.repo_dir, REMOTE),
        RecordingContainer::new().failing_on("b"),
        false,
    );
    run_regenerate(&config(&fx, false), &h.deps).await.unwrap();

    let saved = load_pipeline_state_file(
        &fx.repo_dir.join(GENERATOR_INPUT_DIR).join(PIPELINE_STATE_FILE),
    )
    .unwrap();
    assert_eq!(saved.library("a").unwrap().last_generated_commit, head);
    assert_eq!(saved.library("b").unwrap().last_generated_commit, "");
    assert_eq!(saved.library("c").unwrap().last_generated_commit, head);
}

#[tokio::test]
async fn generated_output_is_copied_into_the_repository() {
    let fx = fixture(automatic(&["a"]), None);
    let h = harness(
        MemoryRepository::at(&fx.repo_dir, REMOTE),
        RecordingContainer::new(),
        false,
    );
    run_regenerate(&config(&fx, false), &h.deps).await.unwrap();

    let marker = fx.repo_dir.join(RecordingContainer::MARKER_FILE);
    assert_eq!(std::fs::read_to_string(marker).unwrap(), "a");
    assert_eq!(
        h.container.calls(),
        vec![
            ContainerCall::GenerateLibrary {
                library_id: "a".to_string(),
                generator_input_dir: fx.repo_dir.join(GENERATOR_INPUT_DIR),
            },
            ContainerCall::Clean {
                library_id: "a".to_string()
            },
        ]
    );
}
