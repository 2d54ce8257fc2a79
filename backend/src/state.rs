//! Shared application state.
//!
//! Built once from `Config` in `main.rs` and handed to every worker as
//! `web::Data<AppState>`. Cloning is cheap: the repository (with its lock) and
//! the publish pipeline are behind `Arc`s, so all workers serialize on the
//! same repository mutex.

use crate::config::Config;
use crate::publish::deploy::RenderDeployHook;
use crate::publish::git::GitCli;
use crate::publish::{DeployTrigger, PublishPipeline};
use crate::site::error::SiteError;
use crate::site::store::SiteRepository;
use log::{info, warn};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Site(#[from] SiteError),

    #[error("could not build deploy client: {0}")]
    DeployClient(#[from] reqwest::Error),
}

#[derive(Clone)]
pub struct AppState {
    pub site: Arc<SiteRepository>,
    pub pipeline: Arc<PublishPipeline>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(site: SiteRepository, pipeline: PublishPipeline, max_upload_bytes: usize) -> Self {
        AppState {
            site: Arc::new(site),
            pipeline: Arc::new(pipeline),
            max_upload_bytes,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, StartupError> {
        let site = SiteRepository::open(&config.repo_path, &config.document, &config.assets_dir)?;

        let remote = config.remote();
        match &remote {
            Some(remote) => info!("Pushing to {remote:?} branch {}", config.branch),
            None => warn!("No git remote configured, publishing will fail at push"),
        }
        let git = GitCli::new(
            site.root().to_path_buf(),
            remote,
            config.branch.clone(),
            config.git_author_name.clone(),
            config.git_author_email.clone(),
            config.command_timeout(),
        );

        let deploy: Option<Arc<dyn DeployTrigger>> = match config.deploy_target() {
            Some((api_key, service_id)) => {
                info!("Deploy trigger enabled for service {service_id}");
                Some(Arc::new(RenderDeployHook::new(
                    &config.render_api_base,
                    service_id,
                    api_key.to_string(),
                    config.command_timeout(),
                )?))
            }
            None => {
                info!("RENDER_API_KEY or RENDER_SERVICE_ID not set, deploys will be skipped");
                None
            }
        };

        let pipeline = PublishPipeline::new(Arc::new(git), deploy, config.deploy_failure_fatal);
        Ok(AppState::new(site, pipeline, config.max_upload_bytes))
    }
}
