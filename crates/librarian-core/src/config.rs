//! Per-invocation configuration.
//!
//! An [`InvocationConfig`] is built once from command-line flags, validated
//! before any side effect, and passed by reference everywhere afterwards.
//! [`ContainerConfig`] is derived from it plus the loaded pipeline documents.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use pipeline_state::{PipelineConfig, PipelineState};

use crate::error::{LibrarianError, Result};

/// Image repository used when neither a flag nor the pipeline config names one.
pub const DEFAULT_IMAGE_REPOSITORY: &str =
    "us-central1-docker.pkg.dev/cloud-sdk-librarian-prod/images-prod";

/// Format an instant the way branch names and titles embed it.
pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Where the language repository comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoLocation {
    /// An existing local checkout.
    Root(PathBuf),
    /// A remote URL to clone into the work root.
    Url(String),
}

/// Raw flag values before validation.
#[derive(Debug, Clone, Default)]
pub struct InvocationFlags {
    pub work_root: Option<PathBuf>,
    pub api_path: Option<String>,
    pub api_root: Option<PathBuf>,
    pub repo_root: Option<PathBuf>,
    pub repo_url: Option<String>,
    pub build: bool,
    pub push: bool,
    pub image: Option<String>,
    pub secrets_project: Option<String>,
    pub language: Option<String>,
}

/// Validated, immutable configuration for one invocation.
#[derive(Debug, Clone)]
pub struct InvocationConfig {
    pub work_root: PathBuf,
    pub api_path: Option<String>,
    pub api_root: Option<PathBuf>,
    pub repo: Option<RepoLocation>,
    pub build: bool,
    pub push: bool,
    pub image: Option<String>,
    pub secrets_project: Option<String>,
    pub language: Option<String>,
    pub start_time: DateTime<Utc>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl InvocationConfig {
    /// Validate `flags`. `start_time` stamps branch names and the default work root.
    pub fn from_flags(flags: InvocationFlags, start_time: DateTime<Utc>) -> Result<Self> {
        let repo_url = non_empty(flags.repo_url);
        let repo = match (flags.repo_root, repo_url) {
            (Some(_), Some(_)) => {
                return Err(LibrarianError::Config(
                    "do not specify both repo-root and repo-url".to_string(),
                ))
            }
            (Some(root), None) => Some(RepoLocation::Root(root)),
            (None, Some(url)) => Some(RepoLocation::Url(url)),
            (None, None) => None,
        };

        let work_root = flags.work_root.unwrap_or_else(|| {
            std::env::temp_dir().join(format!("librarian-{}", format_timestamp(&start_time)))
        });

        Ok(Self {
            work_root,
            api_path: non_empty(flags.api_path),
            api_root: flags.api_root,
            repo,
            build: flags.build,
            push: flags.push,
            image: non_empty(flags.image),
            secrets_project: non_empty(flags.secrets_project),
            language: non_empty(flags.language),
            start_time,
        })
    }

    pub fn require_api_path(&self) -> Result<&str> {
        self.api_path
            .as_deref()
            .ok_or_else(|| LibrarianError::Config("missing required flag -api-path".to_string()))
    }

    pub fn require_api_root(&self) -> Result<&Path> {
        self.api_root
            .as_deref()
            .ok_or_else(|| LibrarianError::Config("missing required flag -api-root".to_string()))
    }

    pub fn require_repo(&self) -> Result<&RepoLocation> {
        self.repo.as_ref().ok_or_else(|| {
            LibrarianError::Config("one of repo-root or repo-url is required".to_string())
        })
    }

    /// Build the container configuration for this invocation.
    ///
    /// Image precedence: the `image` flag, then `imageName` from the
    /// pipeline config, then the per-language default. The tag comes from the
    /// pipeline state when the name carries none.
    pub fn container_config(
        &self,
        state: Option<&PipelineState>,
        pipeline_config: Option<&PipelineConfig>,
    ) -> Result<ContainerConfig> {
        let name = match (&self.image, pipeline_config) {
            (Some(image), _) => image.clone(),
            (None, Some(cfg)) if !cfg.image_name.is_empty() => cfg.image_name.clone(),
            _ => {
                let language = self.language.as_deref().ok_or_else(|| {
                    LibrarianError::Config(
                        "an image or language must be specified when the repository does not configure one"
                            .to_string(),
                    )
                })?;
                format!("{DEFAULT_IMAGE_REPOSITORY}/{language}-librarian-generator")
            }
        };
        let image = if has_tag(&name) {
            name
        } else {
            let tag = state
                .map(|s| s.image_tag.as_str())
                .filter(|t| !t.is_empty())
                .unwrap_or("latest");
            format!("{name}:{tag}")
        };

        Ok(ContainerConfig {
            image,
            pipeline_config: pipeline_config.cloned().unwrap_or_default(),
            secrets_project: self.secrets_project.clone(),
            work_root: self.work_root.clone(),
        })
    }
}

/// True when the final path component carries a `:tag` or `@digest`.
fn has_tag(image: &str) -> bool {
    let last = image.rsplit('/').next().unwrap_or(image);
    last.contains(':') || last.contains('@')
}

/// Everything a container invocation needs beyond its per-command arguments.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Fully qualified image reference including tag.
    pub image: String,
    pub pipeline_config: PipelineConfig,
    pub secrets_project: Option<String>,
    pub work_root: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap()
    }

    #[test]
    fn timestamp_format_is_compact_utc() {
        assert_eq!(format_timestamp(&start()), "20250304T050607Z");
    }

    #[test]
    fn repo_root_and_url_are_mutually_exclusive() {
        let flags = InvocationFlags {
            repo_root: Some(PathBuf::from("/src/repo")),
            repo_url: Some("https://github.com/o/r".to_string()),
            ..InvocationFlags::default()
        };
        let err = InvocationConfig::from_flags(flags, start()).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("repo-root and repo-url"));
    }

    #[test]
    fn blank_url_counts_as_absent() {
        let flags = InvocationFlags {
            repo_root: Some(PathBuf::from("/src/repo")),
            repo_url: Some("  ".to_string()),
            ..InvocationFlags::default()
        };
        let config = InvocationConfig::from_flags(flags, start()).unwrap();
        assert_eq!(
            config.repo,
            Some(RepoLocation::Root(PathBuf::from("/src/repo")))
        );
    }

    #[test]
    fn default_work_root_is_timestamped() {
        let config = InvocationConfig::from_flags(InvocationFlags::default(), start()).unwrap();
        assert!(config
            .work_root
            .to_string_lossy()
            .ends_with("librarian-20250304T050607Z"));
    }

    #[test]
    fn required_flags_are_reported() {
        let config = InvocationConfig::from_flags(InvocationFlags::default(), start()).unwrap();
        assert!(config.require_api_path().unwrap_err().to_string().contains("api-path"));
        assert!(config.require_api_root().unwrap_err().to_string().contains("api-root"));
        assert!(config.require_repo().is_err());
    }

    #[test]
    fn image_precedence() {
        let state = PipelineState {
            image_tag: "v9".to_string(),
            ..PipelineState::default()
        };
        let pipeline = PipelineConfig {
            image_name: "gcr.io/x/gen".to_string(),
            ..PipelineConfig::default()
        };

        let mut flags = InvocationFlags {
            language: Some("dotnet".to_string()),
            ..InvocationFlags::default()
        };
        let config = InvocationConfig::from_flags(flags.clone(), start()).unwrap();
        let from_config = config
            .container_config(Some(&state), Some(&pipeline))
            .unwrap();
        assert_eq!(from_config.image, "gcr.io/x/gen:v9");

        let default = config.container_config(None, None).unwrap();
        assert_eq!(
            default.image,
            format!("{DEFAULT_IMAGE_REPOSITORY}/dotnet-librarian-generator:latest")
        );

        flags.image = Some("localhost:5000/gen:dev".to_string());
        let config = InvocationConfig::from_flags(flags, start()).unwrap();
        let explicit = config
            .container_config(Some(&state), Some(&pipeline))
            .unwrap();
        assert_eq!(explicit.image, "localhost:5000/gen:dev");
    }

    #[test]
    fn image_requires_some_source() {
        let config = InvocationConfig::from_flags(InvocationFlags::default(), start()).unwrap();
        assert!(config.container_config(None, None).is_err());
    }

    #[test]
    fn registry_port_is_not_a_tag() {
        assert!(!has_tag("localhost:5000/gen"));
        assert!(has_tag("localhost:5000/gen:dev"));
        assert!(has_tag("gen@sha256:abc"));
    }
}
