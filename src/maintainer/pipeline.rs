//! The maintenance pipeline: fork → clone → sync → branch → fix → commit → PR.
//!
//! Stages run strictly in order; the first failure aborts the rest. Each
//! stage reports progress through the job's [`LogSink`] and checks the job's
//! cancellation token before it starts.

use std::future::Future;
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use super::branch::{BranchOutcome, ensure_branch};
use super::commit::{CommitOutcome, commit_and_push};
use super::git::{Git, Identity, RemoteOutcome, clone_fork, sync_fork};
use super::github::{ForkOutcome, HostingClient, PullRequestOutcome};
use super::process::ProcessRunner;
use super::repo::RepoRef;
use super::sandbox::FixEngine;
use super::sink::LogSink;
use super::workspace::WorkspaceArena;
use crate::config::MaintainerConfig;
use crate::errors::{MaintainerError, Result};

/// Per-job handles threaded through every stage.
#[derive(Clone)]
pub struct JobContext {
    pub job_id: Uuid,
    pub sink: LogSink,
    pub cancel: CancellationToken,
}

/// Terminal payload of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    /// Always `"completed"`.
    pub status: String,
    pub pr_url: Option<String>,
    pub message: String,
    pub repository: String,
    pub base: String,
    pub branch: String,
    pub fork: ForkOutcome,
    pub upstream_remote: RemoteOutcome,
    pub branch_outcome: BranchOutcome,
    pub changes: CommitOutcome,
    pub pull_request: PullRequestOutcome,
    /// Filled in by the job store once the log drain has finished.
    pub logs: Vec<String>,
}

/// Anything that can service a maintenance request for a job.
#[async_trait]
pub trait MaintenancePipeline: Send + Sync {
    async fn run(&self, repo_url: &str, ctx: JobContext) -> Result<MaintenanceReport>;
}

/// The real pipeline, backed by git, the container CLI and the hosting API.
pub struct RepoPipeline {
    config: MaintainerConfig,
    hosting: HostingClient,
    engine: FixEngine,
    arena: WorkspaceArena,
}

impl RepoPipeline {
    /// Build the pipeline from a validated configuration.
    pub fn new(config: MaintainerConfig) -> Result<Self> {
        config.validate()?;
        let hosting = HostingClient::new(&config.github.api_url, config.token()?, config.user()?)?;
        let engine = FixEngine::new(config.fix_engine.clone());
        let arena = WorkspaceArena::new(&config.workspace.root, config.workspace.retain);
        Ok(Self {
            config,
            hosting,
            engine,
            arena,
        })
    }

    pub fn arena(&self) -> &WorkspaceArena {
        &self.arena
    }

    async fn run_stages(
        &self,
        repo_url: &str,
        ctx: &JobContext,
        tree: &Path,
    ) -> Result<MaintenanceReport> {
        let sink = &ctx.sink;
        let settings = &self.config;
        let user = settings.user()?;

        let repo = RepoRef::parse(repo_url)?;
        sink.emit(format!("Normalized repo: {}", repo.url));

        let git = settings.git.config.iter().fold(
            Git::new(
                ProcessRunner::new(
                    sink.clone(),
                    ctx.cancel.clone(),
                    settings.git.command_timeout(),
                ),
                Identity::from_settings(&settings.git),
            )
            .with_credentials(&repo.fork_owner_prefix(user), settings.token()?),
            |git, (key, value)| git.with_config(key.as_str(), value.as_str()),
        );

        checkpoint(ctx, "fork")?;
        sink.emit(format!("Forking {} into {}", repo.slug(), self.hosting.user()));
        let fork = cancellable(ctx, "fork", self.hosting.fork(&repo)).await?;
        sink.emit("Fork step completed");

        let base = match &settings.git.base_branch {
            Some(base) => base.clone(),
            None => cancellable(ctx, "default branch", self.hosting.default_branch(&repo)).await?,
        };

        checkpoint(ctx, "clone")?;
        sink.emit(format!("Cloning fork into {}", tree.display()));
        clone_fork(&git, &repo.fork_url(user), tree).await?;
        sink.emit("Clone completed");

        checkpoint(ctx, "sync")?;
        sink.emit(format!("Syncing {} with upstream", base));
        let upstream_remote = sync_fork(&git, tree, &repo.upstream_url(), &base).await?;
        sink.emit("Sync completed");

        checkpoint(ctx, "branch")?;
        let branch_name = settings.git.branch.as_str();
        let branch = ensure_branch(&git, tree, branch_name).await?;
        sink.emit(format!("Branch ready: {}", branch_name));

        checkpoint(ctx, "fix engine")?;
        sink.emit("Running fix engine");
        self.engine.execute(git.runner(), tree).await?;
        sink.emit("Docker execution finished");

        checkpoint(ctx, "commit")?;
        let changes =
            commit_and_push(&git, tree, &settings.git.commit_message, branch_name).await?;
        sink.emit(changes.message());

        checkpoint(ctx, "pull request")?;
        let pull_request = cancellable(
            ctx,
            "pull request",
            self.hosting
                .create_or_find(&repo, &settings.pull_request, branch_name, &base),
        )
        .await?;
        sink.emit(format!("PR result: {}", pull_request.message()));

        let message = match &changes {
            CommitOutcome::NoChanges => changes.message(),
            CommitOutcome::Committed { .. } => pull_request.message(),
        };

        Ok(MaintenanceReport {
            status: "completed".to_string(),
            pr_url: pull_request.url().map(str::to_string),
            message: message.to_string(),
            repository: repo.url.clone(),
            base,
            branch: branch_name.to_string(),
            fork,
            upstream_remote,
            branch_outcome: branch,
            changes,
            pull_request,
            logs: Vec::new(),
        })
    }
}

#[async_trait]
impl MaintenancePipeline for RepoPipeline {
    async fn run(&self, repo_url: &str, ctx: JobContext) -> Result<MaintenanceReport> {
        info!(job_id = %ctx.job_id, repo = %repo_url, "pipeline started");
        self.arena.allocate(ctx.job_id).await?;
        let tree = self.arena.tree_for(ctx.job_id);

        let result = self.run_stages(repo_url, &ctx, &tree).await;

        self.arena.release(ctx.job_id).await;
        match &result {
            Ok(report) => info!(job_id = %ctx.job_id, message = %report.message, "pipeline completed"),
            Err(e) => info!(job_id = %ctx.job_id, error = %e, "pipeline failed"),
        }
        result
    }
}

fn checkpoint(ctx: &JobContext, stage: &str) -> Result<()> {
    if ctx.cancel.is_cancelled() {
        return Err(MaintainerError::Cancelled {
            command: stage.to_string(),
            output: String::new(),
        });
    }
    Ok(())
}

/// Race a hosting API call against the job's cancellation token.
async fn cancellable<T, F>(ctx: &JobContext, stage: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        result = fut => result,
        _ = ctx.cancel.cancelled() => Err(MaintainerError::Cancelled {
            command: stage.to_string(),
            output: String::new(),
        }),
    }
}
