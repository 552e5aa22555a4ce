//! Container collaborators for generation and build.
//!
//! Provides:
//! - [`Generator`]: refined (`generate-library`) and raw (`generate-raw`) generation
//! - [`Builder`]: `clean`, `build-library` and `build-raw`
//! - [`DockerRunner`]: both traits over `docker run`
//!
//! Calls are fallible and never retried.

pub mod env;

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::ContainerConfig;
use crate::error::{LibrarianError, Result};
use env::EnvironmentResolver;

pub const GENERATE_LIBRARY: &str = "generate-library";
pub const GENERATE_RAW: &str = "generate-raw";
pub const CLEAN: &str = "clean";
pub const BUILD_LIBRARY: &str = "build-library";
pub const BUILD_RAW: &str = "build-raw";

/// Generation collaborator.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate_library(
        &self,
        config: &ContainerConfig,
        api_root: &Path,
        output_dir: &Path,
        generator_input_dir: &Path,
        library_id: &str,
    ) -> Result<()>;

    async fn generate_raw(
        &self,
        config: &ContainerConfig,
        api_root: &Path,
        output_dir: &Path,
        api_path: &str,
    ) -> Result<()>;
}

/// Build collaborator.
#[async_trait]
pub trait Builder: Send + Sync {
    async fn clean(&self, config: &ContainerConfig, repo_dir: &Path, library_id: &str)
        -> Result<()>;

    async fn build_library(
        &self,
        config: &ContainerConfig,
        repo_dir: &Path,
        library_id: &str,
    ) -> Result<()>;

    async fn build_raw(&self, config: &ContainerConfig, output_dir: &Path, api_path: &str)
        -> Result<()>;
}

/// One `docker run` invocation: command name, bind mounts and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInvocation {
    pub command: &'static str,
    /// `(host path, container path)` pairs.
    pub mounts: Vec<(PathBuf, &'static str)>,
    pub args: Vec<String>,
}

impl ContainerInvocation {
    pub fn generate_library(
        api_root: &Path,
        output_dir: &Path,
        generator_input_dir: &Path,
        library_id: &str,
    ) -> Self {
        Self {
            command: GENERATE_LIBRARY,
            mounts: vec![
                (api_root.to_path_buf(), "/apis"),
                (output_dir.to_path_buf(), "/output"),
                (generator_input_dir.to_path_buf(), "/generator-input"),
            ],
            args: vec![
                "--api-root=/apis".to_string(),
                "--output=/output".to_string(),
                "--generator-input=/generator-input".to_string(),
                format!("--library-id={library_id}"),
            ],
        }
    }

    pub fn generate_raw(api_root: &Path, output_dir: &Path, api_path: &str) -> Self {
        Self {
            command: GENERATE_RAW,
            mounts: vec![
                (api_root.to_path_buf(), "/apis"),
                (output_dir.to_path_buf(), "/output"),
            ],
            args: vec![
                "--api-root=/apis".to_string(),
                "--output=/output".to_string(),
                format!("--api-path={api_path}"),
            ],
        }
    }

    pub fn clean(repo_dir: &Path, library_id: &str) -> Self {
        Self::repo_scoped(CLEAN, repo_dir, library_id)
    }

    pub fn build_library(repo_dir: &Path, library_id: &str) -> Self {
        Self::repo_scoped(BUILD_LIBRARY, repo_dir, library_id)
    }

    fn repo_scoped(command: &'static str, repo_dir: &Path, library_id: &str) -> Self {
        Self {
            command,
            mounts: vec![(repo_dir.to_path_buf(), "/repo")],
            args: vec![
                "--repo-root=/repo".to_string(),
                format!("--library-id={library_id}"),
            ],
        }
    }

    pub fn build_raw(output_dir: &Path, api_path: &str) -> Self {
        Self {
            command: BUILD_RAW,
            mounts: vec![(output_dir.to_path_buf(), "/generator-output")],
            args: vec![
                "--generator-output=/generator-output".to_string(),
                format!("--api-path={api_path}"),
            ],
        }
    }

    /// Full `docker` argument list.
    ///
    /// Variables are forwarded by name only (`-e NAME`); their values are
    /// taken from the docker process environment and never appear in the
    /// argument list.
    pub fn docker_args<S: AsRef<str>>(&self, image: &str, env_names: &[S]) -> Vec<String> {
        let mut args = vec!["run".to_string(), "--rm".to_string()];
        for name in env_names {
            args.push("-e".to_string());
            args.push(name.as_ref().to_string());
        }
        for (host, container) in &self.mounts {
            args.push("-v".to_string());
            args.push(format!("{}:{container}", host.display()));
        }
        args.push(image.to_string());
        args.push(self.command.to_string());
        args.extend(self.args.iter().cloned());
        args
    }
}

/// Runs container commands with the docker CLI.
pub struct DockerRunner {
    env: EnvironmentResolver,
}

impl DockerRunner {
    pub fn new(env: EnvironmentResolver) -> Self {
        Self { env }
    }

    async fn run(&self, config: &ContainerConfig, invocation: ContainerInvocation) -> Result<()> {
        let declared = config
            .pipeline_config
            .command(invocation.command)
            .map(|c| c.environment_variables.as_slice())
            .unwrap_or_default();
        let resolved = self
            .env
            .resolve(declared, config.secrets_project.as_deref())
            .await?;

        let names: Vec<&str> = resolved.iter().map(|(name, _)| name.as_str()).collect();
        let args = invocation.docker_args(&config.image, &names);
        info!(command = invocation.command, image = %config.image, "running container command");
        debug!(args = ?args, "docker invocation");

        let output = Command::new("docker")
            .args(&args)
            .envs(resolved.iter().map(|(name, value)| (name, value)))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| LibrarianError::Container {
                command: invocation.command.to_string(),
                detail: format!("failed to run docker: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LibrarianError::Container {
                command: invocation.command.to_string(),
                detail: format!(
                    "exit code {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Generator for DockerRunner {
    async fn generate_library(
        &self,
        config: &ContainerConfig,
        api_root: &Path,
        output_dir: &Path,
        generator_input_dir: &Path,
        library_id: &str,
    ) -> Result<()> {
        self.run(
            config,
            ContainerInvocation::generate_library(
                api_root,
                output_dir,
                generator_input_dir,
                library_id,
            ),
        )
        .await
    }

    async fn generate_raw(
        &self,
        config: &ContainerConfig,
        api_root: &Path,
        output_dir: &Path,
        api_path: &str,
    ) -> Result<()> {
        self.run(
            config,
            ContainerInvocation::generate_raw(api_root, output_dir, api_path),
        )
        .await
    }
}

#[async_trait]
impl Builder for DockerRunner {
    async fn clean(
        &self,
        config: &ContainerConfig,
        repo_dir: &Path,
        library_id: &str,
    ) -> Result<()> {
        self.run(config, ContainerInvocation::clean(repo_dir, library_id))
            .await
    }

    async fn build_library(
        &self,
        config: &ContainerConfig,
        repo_dir: &Path,
        library_id: &str,
    ) -> Result<()> {
        self.run(
            config,
            ContainerInvocation::build_library(repo_dir, library_id),
        )
        .await
    }

    async fn build_raw(
        &self,
        config: &ContainerConfig,
        output_dir: &Path,
        api_path: &str,
    ) -> Result<()> {
        self.run(config, ContainerInvocation::build_raw(output_dir, api_path))
            .await
    }
}
