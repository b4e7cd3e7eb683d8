//! Repository maintenance service.
//!
//! ## Overview
//!
//! A caller submits an upstream repository reference; the service forks it
//! into the configured account, clones the fork into a per-job workspace,
//! syncs it with upstream, runs the sandboxed fix engine over the working
//! tree, pushes whatever changed to a working branch and opens (or finds)
//! the pull request. Each submission is a background job the caller polls
//! or follows live.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, CORS, shutdown)        │
//! │          │ <─────── │    ├─ api.rs  (route handlers, AppState)         │
//! └──────────┘ WebSocket│    └─ ws.rs   (live log follower)                │
//!                       │         │                                        │
//!                       │         │ JobManager::submit()                   │
//!                       │         v                                        │
//!                       │  jobs.rs  (JobManager, JobStore, LogSink drain)  │
//!                       │         │                                        │
//!                       │         │ MaintenancePipeline::run()             │
//!                       │         v                                        │
//!                       │  pipeline.rs  (RepoPipeline, MaintenanceReport)  │
//!                       │    ├─ github.rs   fork / PR reconciliation       │
//!                       │    ├─ git.rs      clone / sync                   │
//!                       │    ├─ branch.rs   working branch                 │
//!                       │    ├─ sandbox.rs  fix-engine container           │
//!                       │    └─ commit.rs   commit / force-push            │
//!                       │         │                                        │
//!                       │         v                                        │
//!                       │  process.rs  (ProcessRunner, CommandSpec)        │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module      | Responsibility                                        |
//! |-------------|-------------------------------------------------------|
//! | `repo`      | `normalize()` and `RepoRef` parsing                   |
//! | `sink`      | `LogSink`: per-job log channel with secret scrubbing  |
//! | `workspace` | `WorkspaceArena`: one scratch directory per job       |
//!
//! ## Typical Request Flow
//!
//! 1. `POST /run` → `JobManager::submit()` records the job as `running`
//!    and spawns it; the response carries the job id immediately.
//! 2. The pipeline runs fork → clone → sync → branch → fix engine →
//!    commit/push → pull request, strictly in order. Every stage writes
//!    progress lines to the job's `LogSink`.
//! 3. A drain task appends those lines to the `JobStore` and broadcasts
//!    them to WebSocket followers.
//! 4. When the pipeline returns, the drain is awaited and the job moves to
//!    `done` (with a `MaintenanceReport`) or `error` (with the message).
//! 5. `GET /status/{job_id}` reads a snapshot at any point.

pub mod api;
pub mod branch;
pub mod commit;
pub mod git;
pub mod github;
pub mod jobs;
pub mod pipeline;
pub mod process;
pub mod repo;
pub mod sandbox;
pub mod server;
pub mod sink;
pub mod workspace;
pub mod ws;

#[cfg(test)]
pub(crate) mod testutil;
