//! # Publish Pipeline
//!
//! Turns the local working tree into a published site:
//!
//! 1. **Stage** every change (`git add -A`).
//! 2. **Commit** with a message built by the caller.
//! 3. **Push** `HEAD` to the configured remote branch.
//! 4. **Deploy trigger** (optional) on the hosting provider.
//!
//! Steps run in order and are not retried. A failure stops the pipeline and
//! leaves the working tree as the failed step left it; nothing is rolled back.
//! When the tree has no changes nothing is committed, but commits left behind
//! by an earlier failed push are still pushed. Only a clean tree whose `HEAD`
//! is already on the remote branch skips the pipeline entirely.
//!
//! Version control and the deploy hook sit behind traits so the request
//! handlers can be exercised without a git remote or network access.

pub mod deploy;
pub mod git;

use async_trait::async_trait;
use deploy::DeployTriggerError;
use log::{info, warn};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("push target not configured: {0}")]
    NotConfigured(String),

    #[error("git {step} failed ({status}): {stderr}")]
    CommandFailed {
        step: &'static str,
        status: String,
        stderr: String,
    },

    #[error("could not run git {step}: {source}")]
    Spawn {
        step: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("git {step} timed out after {secs}s")]
    Timeout { step: &'static str, secs: u64 },

    #[error(transparent)]
    Deploy(#[from] DeployTriggerError),
}

/// Stage/commit/push primitives of the repository holding the site.
#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn has_changes(&self) -> Result<bool, PublishError>;
    /// Whether `HEAD` holds commits the remote branch does not have.
    async fn has_unpushed(&self) -> Result<bool, PublishError>;
    async fn stage_all(&self) -> Result<(), PublishError>;
    async fn commit(&self, message: &str) -> Result<(), PublishError>;
    async fn push(&self) -> Result<(), PublishError>;
}

/// Hosting provider hook that rebuilds the site from the pushed branch.
#[async_trait]
pub trait DeployTrigger: Send + Sync {
    /// Returns the provider's identifier for the started deploy.
    async fn trigger(&self) -> Result<String, DeployTriggerError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployStatus {
    /// No deploy hook configured, or nothing was pushed.
    Skipped,
    Triggered(String),
    /// The hook failed and the failure policy is non-fatal.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub committed: bool,
    pub pushed: bool,
    pub deploy: DeployStatus,
}

pub struct PublishPipeline {
    vcs: Arc<dyn VersionControl>,
    deploy: Option<Arc<dyn DeployTrigger>>,
    deploy_failure_fatal: bool,
}

impl PublishPipeline {
    pub fn new(
        vcs: Arc<dyn VersionControl>,
        deploy: Option<Arc<dyn DeployTrigger>>,
        deploy_failure_fatal: bool,
    ) -> Self {
        PublishPipeline {
            vcs,
            deploy,
            deploy_failure_fatal,
        }
    }

    pub async fn publish(&self, message: &str) -> Result<PublishReport, PublishError> {
        let committed = if self.vcs.has_changes().await? {
            self.vcs.stage_all().await?;
            self.vcs.commit(message).await?;
            true
        } else if self.vcs.has_unpushed().await? {
            info!("Working tree clean, pushing commits missing from the remote");
            false
        } else {
            info!("Working tree clean, nothing to publish for '{message}'");
            return Ok(PublishReport {
                committed: false,
                pushed: false,
                deploy: DeployStatus::Skipped,
            });
        };

        self.vcs.push().await?;
        info!("Pushed '{message}'");

        let deploy = match &self.deploy {
            None => {
                info!("Deploy trigger not configured, skipping deploy");
                DeployStatus::Skipped
            }
            Some(hook) => match hook.trigger().await {
                Ok(id) => {
                    info!("Deploy triggered: {id}");
                    DeployStatus::Triggered(id)
                }
                Err(e) if self.deploy_failure_fatal => return Err(e.into()),
                Err(e) => {
                    warn!("Deploy trigger failed after push: {e}");
                    DeployStatus::Failed(e.to_string())
                }
            },
        };

        Ok(PublishReport {
            committed,
            pushed: true,
            deploy,
        })
    }
}
