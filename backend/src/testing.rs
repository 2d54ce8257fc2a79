//! Test doubles and fixtures shared by the unit tests.

use crate::publish::deploy::DeployTriggerError;
use crate::publish::{DeployTrigger, PublishError, PublishPipeline, VersionControl};
use crate::site::store::SiteRepository;
use crate::state::AppState;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const FIXTURE: &str = include_str!("../tests/fixtures/index.html");

/// Records every call; yields before answering so concurrent callers get a
/// chance to interleave.
#[derive(Default)]
pub struct FakeVcs {
    calls: Mutex<Vec<String>>,
    clean: bool,
    unpushed: bool,
    fail_at: Option<&'static str>,
}

impl FakeVcs {
    pub fn clean() -> Self {
        FakeVcs {
            clean: true,
            ..Default::default()
        }
    }

    /// Clean tree with commits the remote does not have.
    pub fn ahead() -> Self {
        FakeVcs {
            clean: true,
            unpushed: true,
            ..Default::default()
        }
    }

    pub fn failing_at(step: &'static str) -> Self {
        FakeVcs {
            fail_at: Some(step),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commits(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| call.strip_prefix("commit:").map(str::to_string))
            .collect()
    }

    async fn step(&self, step: &'static str, record: String) -> Result<(), PublishError> {
        tokio::task::yield_now().await;
        self.calls.lock().unwrap().push(record);
        if self.fail_at == Some(step) {
            return Err(PublishError::CommandFailed {
                step,
                status: "exit status: 1".to_string(),
                stderr: format!("simulated {step} failure"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VersionControl for FakeVcs {
    async fn has_changes(&self) -> Result<bool, PublishError> {
        self.step("status", "status".to_string()).await?;
        Ok(!self.clean)
    }

    async fn has_unpushed(&self) -> Result<bool, PublishError> {
        self.step("unpushed", "unpushed".to_string()).await?;
        Ok(self.unpushed)
    }

    async fn stage_all(&self) -> Result<(), PublishError> {
        self.step("add", "add".to_string()).await
    }

    async fn commit(&self, message: &str) -> Result<(), PublishError> {
        self.step("commit", format!("commit:{message}")).await
    }

    async fn push(&self) -> Result<(), PublishError> {
        self.step("push", "push".to_string()).await
    }
}

pub struct FakeDeploy {
    result: Result<String, u16>,
    count: AtomicUsize,
}

impl FakeDeploy {
    pub fn succeeding(id: &str) -> Self {
        FakeDeploy {
            result: Ok(id.to_string()),
            count: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        FakeDeploy {
            result: Err(502),
            count: AtomicUsize::new(0),
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeployTrigger for FakeDeploy {
    async fn trigger(&self) -> Result<String, DeployTriggerError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Ok(id) => Ok(id.clone()),
            Err(status) => Err(DeployTriggerError::Status {
                status: *status,
                body: "bad gateway".to_string(),
            }),
        }
    }
}

/// Temporary site holding the fixture document.
pub fn fixture_site() -> (TempDir, SiteRepository) {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("index.html"), FIXTURE).unwrap();
    let repo = SiteRepository::open(dir.path(), "index.html", "images").unwrap();
    (dir, repo)
}

pub fn fixture_state(
    vcs: Arc<FakeVcs>,
    deploy: Option<Arc<FakeDeploy>>,
    deploy_failure_fatal: bool,
) -> (TempDir, AppState) {
    let (dir, site) = fixture_site();
    let pipeline = PublishPipeline::new(
        vcs,
        deploy.map(|d| d as Arc<dyn DeployTrigger>),
        deploy_failure_fatal,
    );
    (dir, AppState::new(site, pipeline, 1024 * 1024))
}
