//! In-memory fakes for collaborator traits (testing only)
//!
//! Every fake records its calls behind a `Mutex` so tests can assert on
//! what the orchestration layer asked for.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::{ContainerConfig, RepoLocation};
use crate::container::env::SecretStore;
use crate::container::{Builder, Generator, GENERATE_LIBRARY, GENERATE_RAW};
use crate::error::{LibrarianError, Result};
use crate::git::{LanguageRepository, RepositoryOpener};
use crate::github::{GitHubRepo, HostingService, NewPullRequest, PullRequestMetadata};

/// Secret store backed by a `HashMap<(project, name), value>`.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<(String, String), String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(self, project: &str, name: &str, value: &str) -> Self {
        self.secrets
            .lock()
            .unwrap()
            .insert((project.to_string(), name.to_string()), value.to_string());
        self
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn access_secret(&self, project: &str, secret: &str) -> Result<Option<String>> {
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .get(&(project.to_string(), secret.to_string()))
            .cloned())
    }
}

/// A pull request the fake hosting service was asked to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPullRequest {
    pub repo: GitHubRepo,
    pub head: String,
    pub title: String,
    pub body: String,
    pub draft: bool,
}

/// Hosting service serving files by path and recording created pull requests.
#[derive(Debug)]
pub struct MemoryHostingService {
    files: Mutex<HashMap<String, Vec<u8>>>,
    token: Option<String>,
    fail_create: bool,
    created: Mutex<Vec<CreatedPullRequest>>,
    fetches: Mutex<Vec<(GitHubRepo, String, String)>>,
}

impl Default for MemoryHostingService {
    fn default() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            token: Some("test-token".to_string()),
            fail_create: false,
            created: Mutex::new(Vec::new()),
            fetches: Mutex::new(Vec::new()),
        }
    }
}

impl MemoryHostingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for `path` in any repository at any revision.
    pub fn with_file(self, path: &str, bytes: &[u8]) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
        self
    }

    pub fn without_token(mut self) -> Self {
        self.token = None;
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn created(&self) -> Vec<CreatedPullRequest> {
        self.created.lock().unwrap().clone()
    }

    /// `(repo, revision, path)` for every fetch, in order.
    pub fn fetches(&self) -> Vec<(GitHubRepo, String, String)> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl HostingService for MemoryHostingService {
    fn access_token(&self) -> Result<String> {
        self.token
            .clone()
            .ok_or_else(|| LibrarianError::Hosting("no token".to_string()))
    }

    async fn create_pull_request(
        &self,
        repo: &GitHubRepo,
        request: NewPullRequest<'_>,
    ) -> Result<PullRequestMetadata> {
        if self.fail_create {
            return Err(LibrarianError::Hosting("pull request rejected".to_string()));
        }
        let mut created = self.created.lock().unwrap();
        created.push(CreatedPullRequest {
            repo: repo.clone(),
            head: request.head.to_string(),
            title: request.title.to_string(),
            body: request.body.to_string(),
            draft: request.draft,
        });
        let number = created.len() as u64;
        Ok(PullRequestMetadata {
            repo: repo.clone(),
            number,
            url: format!("https://github.com/{repo}/pull/{number}"),
            draft: request.draft,
        })
    }

    async fn fetch_file(&self, repo: &GitHubRepo, revision: &str, path: &str) -> Result<Vec<u8>> {
        self.fetches
            .lock()
            .unwrap()
            .push((repo.clone(), revision.to_string(), path.to_string()));
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| LibrarianError::Hosting(format!("404 Not Found: {path}")))
    }
}

#[derive(Debug, Default)]
struct RepoLog {
    commits: Vec<String>,
    pushes: Vec<String>,
    discards: usize,
}

/// Language repository over a plain directory, recording commits and pushes.
///
/// The working tree is reported dirty unless [`MemoryRepository::clean`] is
/// set. Clones share their log.
#[derive(Debug, Clone)]
pub struct MemoryRepository {
    dir: PathBuf,
    remote: String,
    clean: bool,
    fail_push: bool,
    fail_discard: bool,
    log: Arc<Mutex<RepoLog>>,
}

impl MemoryRepository {
    pub fn new(remote: &str) -> Self {
        Self::at(Path::new("."), remote)
    }

    pub fn at(dir: &Path, remote: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            remote: remote.to_string(),
            clean: false,
            fail_push: false,
            fail_discard: false,
            log: Arc::new(Mutex::new(RepoLog::default())),
        }
    }

    pub fn clean(mut self) -> Self {
        self.clean = true;
        self
    }

    pub fn failing_push(mut self) -> Self {
        self.fail_push = true;
        self
    }

    pub fn failing_discard(mut self) -> Self {
        self.fail_discard = true;
        self
    }

    pub fn commits(&self) -> Vec<String> {
        self.log.lock().unwrap().commits.clone()
    }

    pub fn pushes(&self) -> Vec<String> {
        self.log.lock().unwrap().pushes.clone()
    }

    pub fn discards(&self) -> usize {
        self.log.lock().unwrap().discards
    }
}

impl LanguageRepository for MemoryRepository {
    fn dir(&self) -> &Path {
        &self.dir
    }

    fn remote_url(&self) -> Result<String> {
        Ok(self.remote.clone())
    }

    fn is_clean(&self) -> Result<bool> {
        Ok(self.clean)
    }

    fn commit_all(&self, message: &str) -> Result<()> {
        self.log.lock().unwrap().commits.push(message.to_string());
        Ok(())
    }

    fn discard_changes(&self) -> Result<()> {
        if self.fail_discard {
            return Err(LibrarianError::Git(
                "git reset failed: index.lock exists".to_string(),
            ));
        }
        self.log.lock().unwrap().discards += 1;
        Ok(())
    }

    fn push_branch(&self, branch: &str, _token: &str) -> Result<()> {
        if self.fail_push {
            return Err(LibrarianError::Git(format!("git push failed: {branch} rejected")));
        }
        self.log.lock().unwrap().pushes.push(branch.to_string());
        Ok(())
    }
}

/// Opener that always hands out the same [`MemoryRepository`].
#[derive(Debug)]
pub struct FixedOpener {
    repo: MemoryRepository,
    opened: Mutex<Vec<RepoLocation>>,
}

impl FixedOpener {
    pub fn new(repo: MemoryRepository) -> Self {
        Self {
            repo,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn opened(&self) -> Vec<RepoLocation> {
        self.opened.lock().unwrap().clone()
    }
}

impl RepositoryOpener for FixedOpener {
    fn open_or_clone(
        &self,
        location: &RepoLocation,
        _work_root: &Path,
    ) -> Result<Box<dyn LanguageRepository>> {
        self.opened.lock().unwrap().push(location.clone());
        Ok(Box::new(self.repo.clone()))
    }
}

/// One recorded container command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerCall {
    GenerateLibrary {
        library_id: String,
        generator_input_dir: PathBuf,
    },
    GenerateRaw {
        api_path: String,
    },
    Clean {
        library_id: String,
    },
    BuildLibrary {
        library_id: String,
    },
    BuildRaw {
        api_path: String,
    },
}

/// Generator and builder that records calls and writes a marker file.
///
/// Generation fails for any library id or API path registered with
/// [`RecordingContainer::failing_on`].
#[derive(Debug, Default)]
pub struct RecordingContainer {
    calls: Mutex<Vec<ContainerCall>>,
    failing: Vec<String>,
}

impl RecordingContainer {
    /// Written into the output directory by every successful generation.
    pub const MARKER_FILE: &'static str = "GENERATED";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, target: &str) -> Self {
        self.failing.push(target.to_string());
        self
    }

    pub fn calls(&self) -> Vec<ContainerCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: ContainerCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn finish_generation(&self, command: &str, target: &str, output_dir: &Path) -> Result<()> {
        if self.failing.iter().any(|f| f == target) {
            return Err(LibrarianError::Container {
                command: command.to_string(),
                detail: format!("exit code 1: registry credentials rejected for {target}"),
            });
        }
        std::fs::create_dir_all(output_dir)?;
        std::fs::write(output_dir.join(Self::MARKER_FILE), target)?;
        Ok(())
    }
}

#[async_trait]
impl Generator for RecordingContainer {
    async fn generate_library(
        &self,
        _config: &ContainerConfig,
        _api_root: &Path,
        output_dir: &Path,
        generator_input_dir: &Path,
        library_id: &str,
    ) -> Result<()> {
        self.record(ContainerCall::GenerateLibrary {
            library_id: library_id.to_string(),
            generator_input_dir: generator_input_dir.to_path_buf(),
        });
        self.finish_generation(GENERATE_LIBRARY, library_id, output_dir)
    }

    async fn generate_raw(
        &self,
        _config: &ContainerConfig,
        _api_root: &Path,
        output_dir: &Path,
        api_path: &str,
    ) -> Result<()> {
        self.record(ContainerCall::GenerateRaw {
            api_path: api_path.to_string(),
        });
        self.finish_generation(GENERATE_RAW, api_path, output_dir)
    }
}

#[async_trait]
impl Builder for RecordingContainer {
    async fn clean(
        &self,
        _config: &ContainerConfig,
        _repo_dir: &Path,
        library_id: &str,
    ) -> Result<()> {
        self.record(ContainerCall::Clean {
            library_id: library_id.to_string(),
        });
        Ok(())
    }

    async fn build_library(
        &self,
        _config: &ContainerConfig,
        _repo_dir: &Path,
        library_id: &str,
    ) -> Result<()> {
        self.record(ContainerCall::BuildLibrary {
            library_id: library_id.to_string(),
        });
        Ok(())
    }

    async fn build_raw(
        &self,
        _config: &ContainerConfig,
        _output_dir: &Path,
        api_path: &str,
    ) -> Result<()> {
        self.record(ContainerCall::BuildRaw {
            api_path: api_path.to_string(),
        });
        Ok(())
    }
}
