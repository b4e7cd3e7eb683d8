//! Git plumbing driven through the `git` binary.
//!
//! Cloning and syncing shell out (so progress lines stream into the job log)
//! while read-only inspections use `git2`.

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use super::process::{CommandSpec, ProcessRunner};
use crate::config::GitSettings;
use crate::errors::{MaintainerError, Result};

pub const UPSTREAM_REMOTE: &str = "upstream";

/// Author and committer identity for commits the pipeline creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn from_settings(settings: &GitSettings) -> Self {
        Self {
            name: settings.author_name.clone(),
            email: settings.author_email.clone(),
        }
    }
}

/// Result of registering the upstream remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteOutcome {
    Added,
    AlreadyPresent,
}

/// A job's handle on the `git` binary.
#[derive(Clone)]
pub struct Git {
    runner: ProcessRunner,
    identity: Identity,
    config: Vec<(String, String)>,
}

impl Git {
    pub fn new(runner: ProcessRunner, identity: Identity) -> Self {
        Self {
            runner,
            identity,
            config: Vec::new(),
        }
    }

    /// Pass `-c key=value` to every command.
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.push((key.into(), value.into()));
        self
    }

    /// Authenticate every URL under `prefix` with `token`.
    ///
    /// The token only ever appears on the command line as a URL rewrite, so
    /// remotes recorded in `.git/config` stay credential-free.
    pub fn with_credentials(self, prefix: &str, token: &str) -> Self {
        let authed = prefix.replacen("://", &format!("://x-access-token:{}@", token), 1);
        self.with_config(format!("url.{}.insteadOf", authed), prefix)
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    /// `git <args>` with prompts disabled and the pipeline identity applied.
    pub fn command<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = CommandSpec::new("git")
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_AUTHOR_NAME", &self.identity.name)
            .env("GIT_AUTHOR_EMAIL", &self.identity.email)
            .env("GIT_COMMITTER_NAME", &self.identity.name)
            .env("GIT_COMMITTER_EMAIL", &self.identity.email);
        for (key, value) in &self.config {
            spec = spec.arg("-c").arg(format!("{}={}", key, value));
        }
        spec.args(args)
    }

    /// Run a git command inside `tree`.
    pub async fn run<I, S>(&self, tree: &Path, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runner.run_in(&self.command(args), tree).await
    }
}

/// Clone `url` into `dest`, replacing whatever was there.
pub async fn clone_fork(git: &Git, url: &str, dest: &Path) -> Result<()> {
    if dest.exists() {
        warn!(path = %dest.display(), "removing stale working tree");
        tokio::fs::remove_dir_all(dest).await?;
    }
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let spec = git.command(["clone".to_string(), url.to_string(), dest.display().to_string()]);
    git.runner().run(&spec, None).await?;
    info!(path = %dest.display(), "clone completed");
    Ok(())
}

/// Bring the fork's `base` branch up to date with upstream and push it.
///
/// A merge that fails for any reason (conflicts, unrelated histories, a
/// missing upstream branch) is aborted and reported as a sync failure; no
/// resolution is attempted.
pub async fn sync_fork(
    git: &Git,
    tree: &Path,
    upstream_url: &str,
    base: &str,
) -> Result<RemoteOutcome> {
    let remote = add_upstream(git, tree, upstream_url).await?;

    git.run(tree, ["fetch", UPSTREAM_REMOTE]).await?;
    git.run(tree, ["checkout", base]).await?;

    let upstream_base = format!("{}/{}", UPSTREAM_REMOTE, base);
    match git.run(tree, ["merge", "--no-edit", upstream_base.as_str()]).await {
        Ok(_) => {}
        Err(MaintainerError::ProcessFailure { output, .. }) => {
            if let Err(e) = git.run(tree, ["merge", "--abort"]).await {
                warn!(error = %e, "merge --abort failed");
            }
            return Err(MaintainerError::stage(
                "sync",
                format!("merge of {} failed\n{}", upstream_base, output),
            ));
        }
        Err(e) => return Err(e),
    }

    git.run(tree, ["push", "origin", base]).await?;
    info!(%base, "fork synced with upstream");
    Ok(remote)
}

async fn add_upstream(git: &Git, tree: &Path, url: &str) -> Result<RemoteOutcome> {
    match git.run(tree, ["remote", "add", UPSTREAM_REMOTE, url]).await {
        Ok(_) => Ok(RemoteOutcome::Added),
        Err(MaintainerError::ProcessFailure { output, .. }) if output.contains("already exists") => {
            git.run(tree, ["remote", "set-url", UPSTREAM_REMOTE, url]).await?;
            Ok(RemoteOutcome::AlreadyPresent)
        }
        Err(e) => Err(e),
    }
}
