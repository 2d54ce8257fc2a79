use crate::publish::{PublishError, VersionControl};
use async_trait::async_trait;
use log::debug;
use std::fmt;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// Push URL plus the credential embedded in it, kept so it can be scrubbed
/// from anything logged or returned.
#[derive(Clone)]
pub struct RemoteTarget {
    url: String,
    secret: Option<String>,
}

impl RemoteTarget {
    /// Any userinfo in the URL (`https://token@host/...`) is treated as secret.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let secret = url.split_once("://").and_then(|(_, rest)| {
            let authority = rest.split('/').next().unwrap_or_default();
            authority
                .rsplit_once('@')
                .map(|(userinfo, _)| userinfo.to_string())
                .filter(|userinfo| !userinfo.is_empty())
        });
        RemoteTarget { url, secret }
    }

    pub fn github(token: &str, owner: &str, repo: &str) -> Self {
        RemoteTarget::new(format!("https://{token}@github.com/{owner}/{repo}.git"))
    }

    pub fn redact(&self, text: &str) -> String {
        match &self.secret {
            Some(secret) => text.replace(secret.as_str(), "***"),
            None => text.to_string(),
        }
    }
}

impl fmt::Debug for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RemoteTarget")
            .field(&self.redact(&self.url))
            .finish()
    }
}

/// `VersionControl` backed by the `git` executable on `PATH`.
#[derive(Debug)]
pub struct GitCli {
    repo: PathBuf,
    remote: Option<RemoteTarget>,
    branch: String,
    author_name: String,
    author_email: String,
    timeout: Duration,
}

impl GitCli {
    pub fn new(
        repo: PathBuf,
        remote: Option<RemoteTarget>,
        branch: String,
        author_name: String,
        author_email: String,
        timeout: Duration,
    ) -> Self {
        GitCli {
            repo,
            remote,
            branch,
            author_name,
            author_email,
            timeout,
        }
    }

    fn redact(&self, text: &str) -> String {
        match &self.remote {
            Some(remote) => remote.redact(text),
            None => text.to_string(),
        }
    }

    async fn run(&self, step: &'static str, args: &[&str]) -> Result<Output, PublishError> {
        let mut cmd = Command::new("git");
        cmd.args(args);
        cmd.current_dir(&self.repo);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| PublishError::Timeout {
                step,
                secs: self.timeout.as_secs(),
            })?
            .map_err(|source| PublishError::Spawn { step, source })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            // `git commit` reports "nothing to commit" on stdout.
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(PublishError::CommandFailed {
                step,
                status: output.status.to_string(),
                stderr: self.redact(detail.trim()),
            });
        }
        debug!(
            "git {step}: {}",
            self.redact(String::from_utf8_lossy(&output.stdout).trim())
        );
        Ok(output)
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn has_changes(&self) -> Result<bool, PublishError> {
        let output = self.run("status", &["status", "--porcelain"]).await?;
        Ok(!output.stdout.iter().all(u8::is_ascii_whitespace))
    }

    /// Compares `HEAD` with the remote branch tip from `ls-remote`. A
    /// repository without commits, or without a remote, has nothing to push.
    async fn has_unpushed(&self) -> Result<bool, PublishError> {
        let Some(remote) = &self.remote else {
            return Ok(false);
        };
        let head = match self
            .run("rev-parse", &["rev-parse", "--verify", "-q", "HEAD"])
            .await
        {
            Ok(output) => String::from_utf8_lossy(&output.stdout).trim().to_string(),
            Err(PublishError::CommandFailed { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };

        let branch = format!("refs/heads/{}", self.branch);
        let listed = self
            .run("ls-remote", &["ls-remote", remote.url.as_str(), branch.as_str()])
            .await?;
        let listed = String::from_utf8_lossy(&listed.stdout);
        let remote_tip = listed.split_whitespace().next();
        Ok(remote_tip != Some(head.as_str()))
    }

    async fn stage_all(&self) -> Result<(), PublishError> {
        self.run("add", &["add", "-A"]).await.map(|_| ())
    }

    async fn commit(&self, message: &str) -> Result<(), PublishError> {
        let name = format!("user.name={}", self.author_name);
        let email = format!("user.email={}", self.author_email);
        self.run(
            "commit",
            &["-c", name.as_str(), "-c", email.as_str(), "commit", "-m", message],
        )
        .await
        .map(|_| ())
    }

    async fn push(&self) -> Result<(), PublishError> {
        let remote = self.remote.as_ref().ok_or_else(|| {
            PublishError::NotConfigured(
                "set GIT_REMOTE_URL or GITHUB_TOKEN, GITHUB_REPO_OWNER and GITHUB_REPO_NAME"
                    .to_string(),
            )
        })?;
        let refspec = format!("HEAD:refs/heads/{}", self.branch);
        self.run("push", &["push", remote.url.as_str(), refspec.as_str()])
            .await
            .map(|_| ())
    }
}
