//! Git integration for language repository working trees.
//!
//! [`LanguageRepository`] is the narrow seam orchestration code uses;
//! [`GitRepo`] implements it by shelling out to the `git` CLI.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::config::RepoLocation;
use crate::error::{LibrarianError, Result};

/// Operations the orchestrator needs from a language repository.
pub trait LanguageRepository: Send + Sync {
    /// Root of the working tree.
    fn dir(&self) -> &Path;

    /// URL of the `origin` remote.
    fn remote_url(&self) -> Result<String>;

    /// True when the working tree has no uncommitted changes.
    fn is_clean(&self) -> Result<bool>;

    /// Stage everything and commit with `message`.
    fn commit_all(&self, message: &str) -> Result<()>;

    /// Drop uncommitted changes, tracked and untracked.
    fn discard_changes(&self) -> Result<()>;

    /// Push the current `HEAD` to the remote as `branch`, authenticating with `token`.
    fn push_branch(&self, branch: &str, token: &str) -> Result<()>;
}

/// Opens or clones a language repository for a run.
pub trait RepositoryOpener: Send + Sync {
    fn open_or_clone(
        &self,
        location: &RepoLocation,
        work_root: &Path,
    ) -> Result<Box<dyn LanguageRepository>>;
}

/// Capture the HEAD commit SHA from a git repository.
///
/// Runs `git rev-parse HEAD` in the given directory. Returns an error if the
/// directory is not inside a git repository or if git is not available.
pub fn capture_head_sha(repo_dir: &Path) -> Result<String> {
    let sha = run_git(repo_dir, &["rev-parse", "HEAD"])?;
    let sha = sha.trim().to_string();
    if sha.is_empty() {
        return Err(LibrarianError::Git(
            "git rev-parse HEAD returned empty output".to_string(),
        ));
    }
    Ok(sha)
}

/// Check whether a directory is inside a git work tree.
pub fn is_git_repo(dir: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    run_git_redacted(dir, args, None)
}

/// Run git, replacing `secret` in any error text.
fn run_git_redacted(dir: &Path, args: &[&str], secret: Option<&str>) -> Result<String> {
    let redact = |text: String| match secret {
        Some(s) if !s.is_empty() => text.replace(s, "***"),
        _ => text,
    };
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| LibrarianError::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let subcommand = args.first().copied().unwrap_or("");
        return Err(LibrarianError::Git(redact(format!(
            "git {subcommand} failed: {}",
            stderr.trim()
        ))));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Insert `x-access-token:{token}@` into an https remote URL.
pub fn authenticated_url(remote: &str, token: &str) -> Result<String> {
    let rest = remote.strip_prefix("https://").ok_or_else(|| {
        LibrarianError::Git(format!(
            "cannot push with a token to a non-https remote: {remote}"
        ))
    })?;
    let host_and_path = rest.rsplit_once('@').map(|(_, h)| h).unwrap_or(rest);
    Ok(format!("https://x-access-token:{token}@{host_and_path}"))
}

/// A git working tree on local disk.
#[derive(Debug, Clone)]
pub struct GitRepo {
    dir: PathBuf,
}

impl GitRepo {
    /// Open an existing working tree.
    pub fn open(dir: &Path) -> Result<Self> {
        if !is_git_repo(dir) {
            return Err(LibrarianError::Git(format!(
                "{} is not a git working tree",
                dir.display()
            )));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Clone `url` into `{work_root}/{repo name}`, or open it if already cloned.
    pub fn clone_into(url: &str, work_root: &Path) -> Result<Self> {
        let name = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .map(|n| n.trim_end_matches(".git"))
            .filter(|n| !n.is_empty())
            .ok_or_else(|| LibrarianError::Config(format!("cannot derive a directory from {url}")))?;
        let dir = work_root.join(name);
        if dir.exists() {
            debug!(dir = %dir.display(), "reusing existing clone");
            return Self::open(&dir);
        }
        std::fs::create_dir_all(work_root)?;
        info!(url, dir = %dir.display(), "cloning language repository");
        let dir_arg = dir.to_string_lossy().to_string();
        run_git(work_root, &["clone", "--depth", "1", url, &dir_arg])?;
        Self::open(&dir)
    }
}

impl LanguageRepository for GitRepo {
    fn dir(&self) -> &Path {
        &self.dir
    }

    fn remote_url(&self) -> Result<String> {
        Ok(run_git(&self.dir, &["remote", "get-url", "origin"])?
            .trim()
            .to_string())
    }

    fn is_clean(&self) -> Result<bool> {
        Ok(run_git(&self.dir, &["status", "--porcelain"])?
            .trim()
            .is_empty())
    }

    fn commit_all(&self, message: &str) -> Result<()> {
        run_git(&self.dir, &["add", "--all"])?;
        run_git(&self.dir, &["commit", "--quiet", "-m", message])?;
        Ok(())
    }

    fn discard_changes(&self) -> Result<()> {
        run_git(&self.dir, &["reset", "--hard", "--quiet", "HEAD"])?;
        run_git(&self.dir, &["clean", "-fd", "--quiet"])?;
        Ok(())
    }

    fn push_branch(&self, branch: &str, token: &str) -> Result<()> {
        let url = authenticated_url(&self.remote_url()?, token)?;
        let refspec = format!("HEAD:refs/heads/{branch}");
        info!(branch, "pushing branch");
        run_git_redacted(&self.dir, &["push", &url, &refspec], Some(token))?;
        Ok(())
    }
}

/// [`RepositoryOpener`] backed by [`GitRepo`].
#[derive(Debug, Default, Clone)]
pub struct GitRepoOpener;

impl RepositoryOpener for GitRepoOpener {
    fn open_or_clone(
        &self,
        location: &RepoLocation,
        work_root: &Path,
    ) -> Result<Box<dyn LanguageRepository>> {
        let repo = match location {
            RepoLocation::Root(root) => GitRepo::open(root)?,
            RepoLocation::Url(url) => GitRepo::clone_into(url, work_root)?,
        };
        Ok(Box::new(repo))
    }
}
