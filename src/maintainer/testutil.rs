//! Test fixtures: scratch repositories (local bare remotes driven by the
//! real `git` binary), an in-process hosting API, a stand-in container CLI
//! and a scripted pipeline.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::branch::BranchOutcome;
use super::commit::CommitOutcome;
use super::git::{Git, Identity, RemoteOutcome};
use super::github::{ForkOutcome, PullRequestOutcome};
use super::pipeline::{JobContext, MaintenancePipeline, MaintenanceReport};
use super::process::ProcessRunner;
use super::sink::LogSink;
use crate::errors::{MaintainerError, Result};

pub fn identity() -> Identity {
    Identity {
        name: "Test Bot".to_string(),
        email: "bot@example.com".to_string(),
    }
}

pub fn runner() -> ProcessRunner {
    ProcessRunner::new(
        LogSink::discard(),
        CancellationToken::new(),
        Duration::from_secs(60),
    )
}

pub fn git() -> Git {
    Git::new(runner(), identity())
}

/// Run git synchronously in `dir`, panicking on failure. Returns stdout.
pub fn sh_git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args([
            "-c",
            "user.name=Test Bot",
            "-c",
            "user.email=bot@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git should run");
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).into_owned()
}

/// Bare `upstream.git` under `root` with one commit on `main`.
pub fn seed_upstream(root: &Path) -> PathBuf {
    let bare = root.join("upstream.git");
    std::fs::create_dir_all(&bare).unwrap();
    sh_git(&bare, &["init", "--bare", "--quiet"]);
    sh_git(&bare, &["symbolic-ref", "HEAD", "refs/heads/main"]);

    let seed = root.join("seed");
    std::fs::create_dir_all(&seed).unwrap();
    sh_git(&seed, &["init", "--quiet"]);
    sh_git(&seed, &["checkout", "-q", "-b", "main"]);
    std::fs::write(seed.join("README.md"), "hello\n").unwrap();
    sh_git(&seed, &["add", "."]);
    sh_git(&seed, &["commit", "-q", "-m", "initial"]);
    sh_git(&seed, &["remote", "add", "origin", &bare.display().to_string()]);
    sh_git(&seed, &["push", "-q", "origin", "main"]);
    bare
}

/// Bare copy of `upstream` standing in for the provider-side fork.
pub fn fork_of(upstream: &Path, root: &Path) -> PathBuf {
    let fork = root.join("fork.git");
    sh_git(
        root,
        &[
            "clone",
            "--bare",
            "--quiet",
            &upstream.display().to_string(),
            &fork.display().to_string(),
        ],
    );
    fork
}

/// Commit `file` with `content` on upstream's `main` via the seed checkout.
pub fn push_upstream_change(upstream: &Path, root: &Path, file: &str, content: &str) {
    let seed = root.join("seed");
    assert!(seed.exists(), "seed_upstream must run first");
    sh_git(&seed, &["pull", "-q", "--ff-only", &upstream.display().to_string(), "main"]);
    std::fs::write(seed.join(file), content).unwrap();
    sh_git(&seed, &["add", "."]);
    sh_git(&seed, &["commit", "-q", "-m", &format!("change {}", file)]);
    sh_git(&seed, &["push", "-q", "origin", "main"]);
}

/// Commit `file` with `content` on `remote`'s `main` from a fresh checkout.
pub fn push_change(remote: &Path, root: &Path, file: &str, content: &str) {
    let checkout = root.join(format!("edit-{}", uuid::Uuid::new_v4().simple()));
    sh_git(
        root,
        &[
            "clone",
            "--quiet",
            &remote.display().to_string(),
            &checkout.display().to_string(),
        ],
    );
    std::fs::write(checkout.join(file), content).unwrap();
    sh_git(&checkout, &["add", "."]);
    sh_git(&checkout, &["commit", "-q", "-m", &format!("edit {}", file)]);
    sh_git(&checkout, &["push", "-q", "origin", "HEAD:main"]);
}

/// Executable shell script standing in for the container CLI.
#[cfg(unix)]
pub fn fake_cli(dir: &Path, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("fake-docker");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.display().to_string()
}

// ── hosting API double ──────────────────────────────────────────────

/// Canned responses for the fake provider, plus a record of what it saw.
#[derive(Clone, Default)]
pub struct FakeProvider {
    pub fork_status: u16,
    pub create_status: u16,
    pub open_prs: Vec<String>,
    pub list_status: Option<u16>,
    pub seen: Arc<Mutex<Vec<String>>>,
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap()
}

async fn fork(
    State(p): State<FakeProvider>,
    UrlPath((owner, name)): UrlPath<(String, String)>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    p.seen
        .lock()
        .unwrap()
        .push(format!("fork {}/{} {}", owner, name, auth));
    (status(p.fork_status), Json(json!({"message": "fork"})))
}

async fn repository(UrlPath((_owner, _name)): UrlPath<(String, String)>) -> Json<Value> {
    Json(json!({"default_branch": "trunk"}))
}

async fn create_pull(
    State(p): State<FakeProvider>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    p.seen.lock().unwrap().push(format!(
        "create head={} base={} title={}",
        body["head"].as_str().unwrap_or_default(),
        body["base"].as_str().unwrap_or_default(),
        body["title"].as_str().unwrap_or_default(),
    ));
    (
        status(p.create_status),
        Json(json!({"html_url": "https://github.com/acme/widgets/pull/7"})),
    )
}

async fn list_pulls(
    State(p): State<FakeProvider>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    p.seen.lock().unwrap().push(format!(
        "list head={} state={}",
        params.get("head").cloned().unwrap_or_default(),
        params.get("state").cloned().unwrap_or_default(),
    ));
    let prs: Vec<Value> = p
        .open_prs
        .iter()
        .map(|url| json!({"html_url": url}))
        .collect();
    (status(p.list_status.unwrap_or(200)), Json(Value::Array(prs)))
}

/// Serve `provider` on an ephemeral port; returns its base URL.
pub async fn serve_provider(provider: FakeProvider) -> String {
    let app = Router::new()
        .route("/repos/{owner}/{name}/forks", post(fork))
        .route("/repos/{owner}/{name}", get(repository))
        .route("/repos/{owner}/{name}/pulls", post(create_pull).get(list_pulls))
        .with_state(provider);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

// ── scripted pipeline ───────────────────────────────────────────────

/// Scripted stand-in for the real pipeline.
pub struct FakePipeline {
    lines: Vec<String>,
    failure: Option<String>,
    gate: Option<Arc<Notify>>,
    panics: bool,
}

impl FakePipeline {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            failure: None,
            gate: None,
            panics: false,
        }
    }

    /// Fail with a stage error after emitting the lines.
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Panic after emitting the lines.
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    /// Block after emitting the lines until `gate` is notified or the job
    /// is cancelled.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

pub fn report(repo_url: &str) -> MaintenanceReport {
    MaintenanceReport {
        status: "completed".to_string(),
        pr_url: Some("https://github.com/acme/widgets/pull/1".to_string()),
        message: "PR created successfully".to_string(),
        repository: repo_url.to_string(),
        base: "main".to_string(),
        branch: "ai-update".to_string(),
        fork: ForkOutcome::Created,
        upstream_remote: RemoteOutcome::Added,
        branch_outcome: BranchOutcome::Created,
        changes: CommitOutcome::Committed {
            files: vec!["README.md".to_string()],
        },
        pull_request: PullRequestOutcome::Created {
            url: "https://github.com/acme/widgets/pull/1".to_string(),
        },
        logs: Vec::new(),
    }
}

#[async_trait]
impl MaintenancePipeline for FakePipeline {
    async fn run(&self, repo_url: &str, ctx: JobContext) -> Result<MaintenanceReport> {
        for line in &self.lines {
            ctx.sink.emit(line.as_str());
        }
        if self.panics {
            panic!("scripted pipeline panic");
        }
        if let Some(gate) = &self.gate {
            tokio::select! {
                _ = gate.notified() => {}
                _ = ctx.cancel.cancelled() => {
                    return Err(MaintainerError::Cancelled {
                        command: "fake".to_string(),
                        output: String::new(),
                    });
                }
            }
        }
        match &self.failure {
            Some(message) => Err(MaintainerError::stage("fake", message.clone())),
            None => Ok(report(repo_url)),
        }
    }
}
