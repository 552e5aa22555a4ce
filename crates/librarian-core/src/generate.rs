//! Generation orchestration.
//!
//! A single resolution step turns `(state, api path, language repo)` into a
//! [`GenerationStrategy`]. Refined generation hands the library id and the
//! repository's `generator-input` directory to the container; raw generation
//! only sees the API root and path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pipeline_state::{
    generator_input_dir, load_repo_state_and_config, PipelineConfig, PipelineState, StateProvider,
    StateSource,
};
use tracing::{info, warn};

use crate::config::{ContainerConfig, InvocationConfig, RepoLocation};
use crate::container::{Builder, Generator};
use crate::error::{LibrarianError, Result};
use crate::git::{LanguageRepository, RepositoryOpener};
use crate::obs::emit_strategy_selected;
use crate::resolver::resolve;

/// How an API path will be generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationStrategy {
    /// The API belongs to a configured library.
    Refined {
        library_id: String,
        generator_input_dir: PathBuf,
    },
    /// No owning library (or no repository): generate from the API alone.
    Raw { api_path: String },
}

impl GenerationStrategy {
    /// Choose the strategy for `api_path`.
    ///
    /// Without a repository the strategy is always raw. With a repository the
    /// path must resolve to a library; callers only open a repository after a
    /// successful lookup, so a miss here is an internal error.
    pub fn select(
        state: Option<&PipelineState>,
        api_path: &str,
        repo_dir: Option<&Path>,
    ) -> Result<Self> {
        let Some(repo_dir) = repo_dir else {
            return Ok(GenerationStrategy::Raw {
                api_path: api_path.to_string(),
            });
        };
        let library_id = match state {
            Some(state) => resolve(state, api_path)?,
            None => None,
        };
        match library_id {
            Some(library_id) => Ok(GenerationStrategy::Refined {
                library_id,
                generator_input_dir: generator_input_dir(repo_dir),
            }),
            None => Err(LibrarianError::Internal(format!(
                "library for {api_path} not found during generation, despite being found earlier"
            ))),
        }
    }

    pub fn library_id(&self) -> Option<&str> {
        match self {
            GenerationStrategy::Refined { library_id, .. } => Some(library_id),
            GenerationStrategy::Raw { .. } => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            GenerationStrategy::Refined { .. } => "refined",
            GenerationStrategy::Raw { .. } => "raw",
        }
    }
}

/// Inputs for one generation.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    pub api_path: &'a str,
    pub api_root: &'a Path,
    pub output_dir: &'a Path,
    pub repo_dir: Option<&'a Path>,
}

/// Drives the generation and build collaborators.
#[derive(Clone)]
pub struct GenerationOrchestrator {
    generator: Arc<dyn Generator>,
    builder: Arc<dyn Builder>,
}

impl GenerationOrchestrator {
    pub fn new(generator: Arc<dyn Generator>, builder: Arc<dyn Builder>) -> Self {
        Self { generator, builder }
    }

    /// Generate code for `request.api_path` into `request.output_dir`.
    ///
    /// Returns the library id when refined generation ran.
    pub async fn generate(
        &self,
        config: &ContainerConfig,
        state: Option<&PipelineState>,
        request: GenerateRequest<'_>,
    ) -> Result<Option<String>> {
        let strategy = GenerationStrategy::select(state, request.api_path, request.repo_dir)?;
        emit_strategy_selected(request.api_path, strategy.name(), strategy.library_id());
        match &strategy {
            GenerationStrategy::Refined {
                library_id,
                generator_input_dir,
            } => {
                info!(library_id = %library_id, "performing refined generation");
                self.generator
                    .generate_library(
                        config,
                        request.api_root,
                        request.output_dir,
                        generator_input_dir,
                        library_id,
                    )
                    .await?;
            }
            GenerationStrategy::Raw { api_path } => {
                info!(api_path = %api_path, "no matching library; performing raw generation");
                self.generator
                    .generate_raw(config, request.api_root, request.output_dir, api_path)
                    .await?;
            }
        }
        Ok(strategy.library_id().map(str::to_string))
    }

    /// Build generated code.
    ///
    /// With a library id the repository copy is cleaned, the output is copied
    /// over it and the library is built in place. Without one the raw output
    /// is built where it is.
    pub async fn build(
        &self,
        config: &ContainerConfig,
        library_id: Option<&str>,
        request: GenerateRequest<'_>,
    ) -> Result<()> {
        match (library_id, request.repo_dir) {
            (Some(library_id), Some(repo_dir)) => {
                info!(library_id, "cleaning and copying generated code before build");
                self.builder.clean(config, repo_dir, library_id).await?;
                copy_dir_all(request.output_dir, repo_dir)?;
                self.builder.build_library(config, repo_dir, library_id).await
            }
            (Some(library_id), None) => Err(LibrarianError::Internal(format!(
                "cannot build library {library_id} without a language repository"
            ))),
            (None, _) => {
                self.builder
                    .build_raw(config, request.output_dir, request.api_path)
                    .await
            }
        }
    }

    /// Regenerate a known library straight into its repository.
    ///
    /// The library id is already known, so no resolution happens. The
    /// repository copy is always cleaned and replaced; `build` only controls
    /// whether the library is built afterwards.
    pub async fn regenerate_library(
        &self,
        config: &ContainerConfig,
        library_id: &str,
        api_root: &Path,
        output_dir: &Path,
        repo_dir: &Path,
        build: bool,
    ) -> Result<()> {
        info!(library_id, "regenerating library");
        self.generator
            .generate_library(
                config,
                api_root,
                output_dir,
                &generator_input_dir(repo_dir),
                library_id,
            )
            .await?;
        self.builder.clean(config, repo_dir, library_id).await?;
        copy_dir_all(output_dir, repo_dir)?;
        if build {
            self.builder.build_library(config, repo_dir, library_id).await?;
        }
        Ok(())
    }

    /// Generate, then build when `build` is set.
    pub async fn generate_and_build(
        &self,
        config: &ContainerConfig,
        state: Option<&PipelineState>,
        request: GenerateRequest<'_>,
        build: bool,
    ) -> Result<Option<String>> {
        let library_id = self.generate(config, state, request).await?;
        if build {
            self.build(config, library_id.as_deref(), request).await?;
        }
        Ok(library_id)
    }
}

/// Recursively copy `src` into `dst`, overwriting existing files.
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Collaborators for the `generate` command.
pub struct GenerateDeps {
    pub state_provider: Arc<dyn StateProvider>,
    pub opener: Arc<dyn RepositoryOpener>,
    pub orchestrator: GenerationOrchestrator,
}

/// Result of the `generate` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOutcome {
    pub library_id: Option<String>,
    pub output_dir: PathBuf,
}

/// Look up `api_path` in the configured repository and open it only when a
/// library owns the path.
async fn open_repo_if_library_exists(
    config: &InvocationConfig,
    api_path: &str,
    deps: &GenerateDeps,
) -> Result<Option<Box<dyn LanguageRepository>>> {
    let Some(location) = &config.repo else {
        warn!("repo url and root are not specified; cannot check if library exists");
        return Ok(None);
    };
    let source = match location {
        RepoLocation::Root(root) => StateSource::Local(root.clone()),
        RepoLocation::Url(url) => StateSource::remote_head(url.clone()),
    };
    let state = deps.state_provider.load_pipeline_state(&source).await?;
    match resolve(&state, api_path)? {
        None => {
            info!(api_path, "API path not configured in repo");
            Ok(None)
        }
        Some(library_id) => {
            info!(api_path, library_id = %library_id, "API path configured in repo library");
            Ok(Some(deps.opener.open_or_clone(location, &config.work_root)?))
        }
    }
}

/// Run the `generate` command.
///
/// Output lands in `{work_root}/output`, which must not exist yet.
pub async fn run_generate(config: &InvocationConfig, deps: &GenerateDeps) -> Result<GenerateOutcome> {
    let api_path = config.require_api_path()?;
    let api_root = std::fs::canonicalize(config.require_api_root()?)?;

    let repo = open_repo_if_library_exists(config, api_path, deps).await?;
    let documents: Option<(PipelineState, PipelineConfig)> = match &repo {
        Some(repo) => Some(load_repo_state_and_config(repo.dir())?),
        None => None,
    };
    let container = config.container_config(
        documents.as_ref().map(|(state, _)| state),
        documents.as_ref().map(|(_, cfg)| cfg),
    )?;

    std::fs::create_dir_all(&config.work_root)?;
    let output_dir = config.work_root.join("output");
    std::fs::create_dir(&output_dir)?;
    info!(output_dir = %output_dir.display(), "code will be generated here");

    let request = GenerateRequest {
        api_path,
        api_root: &api_root,
        output_dir: &output_dir,
        repo_dir: repo.as_ref().map(|r| r.dir()),
    };
    let library_id = deps
        .orchestrator
        .generate_and_build(
            &container,
            documents.as_ref().map(|(state, _)| state),
            request,
            config.build,
        )
        .await?;

    Ok(GenerateOutcome {
        library_id,
        output_dir,
    })
}
