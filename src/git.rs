//! Version-control executable driver
//!
//! All transfer work is delegated to `git`. Every invocation runs
//! non-interactively with progress suppressed, captures stderr for the
//! failure diagnostic, and is bounded by a timeout.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command as AsyncCommand;
use tokio::time::timeout;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::error::{redact_credentials, GitError};

/// The external process contract used by the sync engine
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Vcs: Send + Sync {
    /// `git clone --mirror` from `url` into `mirror`
    async fn mirror_clone(&self, url: &str, mirror: &Path) -> Result<(), GitError>;

    /// Fetch all refs from origin into `mirror`, pruning deleted ones
    async fn fetch_prune(&self, mirror: &Path) -> Result<(), GitError>;

    /// Point the push URL of origin in `mirror` at `url`
    async fn set_push_url(&self, mirror: &Path, url: &str) -> Result<(), GitError>;

    /// `git push --mirror` from `mirror` to its push URL
    async fn push_mirror(&self, mirror: &Path) -> Result<(), GitError>;

    /// Plain clone of the local `mirror` into `checkout`
    async fn clone_checkout(&self, mirror: &Path, checkout: &Path) -> Result<(), GitError>;

    /// Integrate the default branch into `checkout`
    async fn pull(&self, checkout: &Path) -> Result<(), GitError>;
}

/// [`Vcs`] implementation that shells out to the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    timeout: Duration,
}

impl GitCli {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "git".to_string(),
            timeout,
        }
    }

    #[cfg(test)]
    fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Run one git subcommand; `label` names it in errors and logs
    async fn run<I, S>(&self, label: &str, args: I) -> Result<(), GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        debug!("Running git {}", label);

        let mut command = AsyncCommand::new(&self.program);
        command
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_ASKPASS", "")
            .env("SSH_ASKPASS", "")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(GitError::Spawn {
                    command: label.to_string(),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                return Err(GitError::TimedOut {
                    command: label.to_string(),
                    after: self.timeout,
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitError::Failed {
                command: label.to_string(),
                status: output.status.to_string(),
                stderr: redact_credentials(stderr.trim()),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn mirror_clone(&self, url: &str, mirror: &Path) -> Result<(), GitError> {
        self.run(
            "clone --mirror",
            [
                OsStr::new("clone"),
                OsStr::new("--mirror"),
                OsStr::new("--quiet"),
                OsStr::new(url),
                mirror.as_os_str(),
            ],
        )
        .await
    }

    async fn fetch_prune(&self, mirror: &Path) -> Result<(), GitError> {
        self.run(
            "fetch --prune",
            [
                OsStr::new("-C"),
                mirror.as_os_str(),
                OsStr::new("fetch"),
                OsStr::new("--quiet"),
                OsStr::new("--prune"),
                OsStr::new("origin"),
            ],
        )
        .await
    }

    async fn set_push_url(&self, mirror: &Path, url: &str) -> Result<(), GitError> {
        self.run(
            "remote set-url --push",
            [
                OsStr::new("-C"),
                mirror.as_os_str(),
                OsStr::new("remote"),
                OsStr::new("set-url"),
                OsStr::new("--push"),
                OsStr::new("origin"),
                OsStr::new(url),
            ],
        )
        .await
    }

    async fn push_mirror(&self, mirror: &Path) -> Result<(), GitError> {
        self.run(
            "push --mirror",
            [
                OsStr::new("-C"),
                mirror.as_os_str(),
                OsStr::new("push"),
                OsStr::new("--mirror"),
                OsStr::new("--quiet"),
            ],
        )
        .await
    }

    async fn clone_checkout(&self, mirror: &Path, checkout: &Path) -> Result<(), GitError> {
        self.run(
            "clone",
            [
                OsStr::new("clone"),
                OsStr::new("--quiet"),
                mirror.as_os_str(),
                checkout.as_os_str(),
            ],
        )
        .await
    }

    async fn pull(&self, checkout: &Path) -> Result<(), GitError> {
        self.run(
            "pull",
            [
                OsStr::new("-C"),
                checkout.as_os_str(),
                OsStr::new("pull"),
                OsStr::new("--quiet"),
                OsStr::new("--ff-only"),
            ],
        )
        .await
    }
}
