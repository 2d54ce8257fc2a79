//! Process configuration, read once at startup.
//!
//! Every option can be given as a flag or through the environment variable
//! named next to it, which keeps the variable names the hosting setup already
//! uses (`REPO_PATH`, `GITHUB_TOKEN`, `RENDER_API_KEY`, ...).

use crate::publish::git::RemoteTarget;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "cms_backend",
    about = "Edits the published site document and pushes each change to git"
)]
pub struct Config {
    /// Root of the git working tree holding the published site
    #[arg(long, env = "REPO_PATH")]
    pub repo_path: PathBuf,

    /// Page document, relative to the repository root
    #[arg(long, env = "SITE_DOCUMENT", default_value = "index.html")]
    pub document: String,

    /// Directory for uploaded images, relative to the repository root
    #[arg(long, env = "SITE_ASSETS_DIR", default_value = "images")]
    pub assets_dir: String,

    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Full push URL; takes precedence over the GitHub settings
    #[arg(long, env = "GIT_REMOTE_URL", hide_env_values = true)]
    pub git_remote_url: Option<String>,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    #[arg(long, env = "GITHUB_REPO_OWNER")]
    pub github_repo_owner: Option<String>,

    #[arg(long, env = "GITHUB_REPO_NAME")]
    pub github_repo_name: Option<String>,

    /// Branch the working tree is pushed to
    #[arg(long, env = "GITHUB_BRANCH", default_value = "main")]
    pub branch: String,

    #[arg(long, env = "GIT_AUTHOR_NAME", default_value = "Site CMS Bot")]
    pub git_author_name: String,

    #[arg(long, env = "GIT_AUTHOR_EMAIL", default_value = "cms-bot@localhost")]
    pub git_author_email: String,

    #[arg(long, env = "RENDER_API_KEY", hide_env_values = true)]
    pub render_api_key: Option<String>,

    #[arg(long, env = "RENDER_SERVICE_ID")]
    pub render_service_id: Option<String>,

    #[arg(long, env = "RENDER_API_BASE", default_value = "https://api.render.com/v1")]
    pub render_api_base: String,

    /// Fail the request when the deploy trigger fails after a successful push
    #[arg(long, env = "DEPLOY_FAILURE_FATAL", default_value_t = false)]
    pub deploy_failure_fatal: bool,

    /// Upper bound for each git command and the deploy request
    #[arg(long, env = "COMMAND_TIMEOUT_SECS", default_value_t = 60)]
    pub command_timeout_secs: u64,

    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
    pub max_upload_bytes: usize,
}

impl Config {
    /// Push target, or `None` when neither form of remote is configured.
    pub fn remote(&self) -> Option<RemoteTarget> {
        if let Some(url) = non_empty(&self.git_remote_url) {
            return Some(RemoteTarget::new(url));
        }
        match (
            non_empty(&self.github_token),
            non_empty(&self.github_repo_owner),
            non_empty(&self.github_repo_name),
        ) {
            (Some(token), Some(owner), Some(repo)) => {
                Some(RemoteTarget::github(token, owner, repo))
            }
            _ => None,
        }
    }

    /// `(api_key, service_id)` when both deploy settings are present.
    pub fn deploy_target(&self) -> Option<(&str, &str)> {
        Some((
            non_empty(&self.render_api_key)?,
            non_empty(&self.render_service_id)?,
        ))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs.max(1))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
