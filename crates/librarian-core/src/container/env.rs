//! Environment resolution for container commands.
//!
//! Each declared variable is resolved in order: host-provided value, then a
//! secret-store lookup (only when a secrets project is configured and the
//! variable names a secret), then its default value. Variables with none of
//! these are omitted.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use pipeline_state::EnvironmentVariable;
use tokio::process::Command;
use tracing::debug;

use crate::error::{LibrarianError, Result};

/// Source of host-provided values.
pub trait HostEnvironment: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Default, Clone)]
pub struct ProcessEnvironment;

impl HostEnvironment for ProcessEnvironment {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl HostEnvironment for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned()
    }
}

/// Secret store keyed by project and secret name.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Latest value of `secret` in `project`, or `None` when it does not exist.
    async fn access_secret(&self, project: &str, secret: &str) -> Result<Option<String>>;
}

/// Secret Manager access through the `gcloud` CLI.
#[derive(Debug, Default, Clone)]
pub struct GcloudSecretStore;

#[async_trait]
impl SecretStore for GcloudSecretStore {
    async fn access_secret(&self, project: &str, secret: &str) -> Result<Option<String>> {
        let output = Command::new("gcloud")
            .args([
                "secrets",
                "versions",
                "access",
                "latest",
                &format!("--secret={secret}"),
                &format!("--project={project}"),
            ])
            .output()
            .await
            .map_err(|e| LibrarianError::Secret {
                name: secret.to_string(),
                detail: format!("failed to run gcloud: {e}"),
            })?;

        if output.status.success() {
            return Ok(Some(String::from_utf8_lossy(&output.stdout).to_string()));
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("NOT_FOUND") {
            return Ok(None);
        }
        Err(LibrarianError::Secret {
            name: secret.to_string(),
            detail: stderr.trim().to_string(),
        })
    }
}

/// Resolves declared variables to concrete `(name, value)` pairs.
pub struct EnvironmentResolver {
    host: Arc<dyn HostEnvironment>,
    secrets: Arc<dyn SecretStore>,
}

impl EnvironmentResolver {
    pub fn new(host: Arc<dyn HostEnvironment>, secrets: Arc<dyn SecretStore>) -> Self {
        Self { host, secrets }
    }

    /// Process environment plus `gcloud` secrets.
    pub fn system() -> Self {
        Self::new(Arc::new(ProcessEnvironment), Arc::new(GcloudSecretStore))
    }

    /// Resolve `vars` in declaration order.
    pub async fn resolve(
        &self,
        vars: &[EnvironmentVariable],
        secrets_project: Option<&str>,
    ) -> Result<Vec<(String, String)>> {
        let mut resolved = Vec::with_capacity(vars.len());
        for var in vars {
            if let Some(value) = self.resolve_one(var, secrets_project).await? {
                resolved.push((var.name.clone(), value));
            } else {
                debug!(name = %var.name, "no value for environment variable; omitting");
            }
        }
        Ok(resolved)
    }

    async fn resolve_one(
        &self,
        var: &EnvironmentVariable,
        secrets_project: Option<&str>,
    ) -> Result<Option<String>> {
        if let Some(value) = self.host.get(&var.name) {
            return Ok(Some(value));
        }
        if let (Some(project), Some(secret)) = (secrets_project, var.secret_name.as_deref()) {
            if let Some(value) = self.secrets.access_secret(project, secret).await? {
                return Ok(Some(value));
            }
        }
        Ok(var.default_value.clone())
    }
}
