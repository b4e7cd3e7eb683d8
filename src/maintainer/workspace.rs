use std::path::PathBuf;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::Result;

/// Hands out one scratch directory per job under a shared root.
#[derive(Debug, Clone)]
pub struct WorkspaceArena {
    root: PathBuf,
    retain: bool,
}

impl WorkspaceArena {
    pub fn new(root: impl Into<PathBuf>, retain: bool) -> Self {
        Self {
            root: root.into(),
            retain,
        }
    }

    pub fn job_dir(&self, job_id: Uuid) -> PathBuf {
        self.root.join(job_id.to_string())
    }

    /// Where the job's working tree is cloned.
    pub fn tree_for(&self, job_id: Uuid) -> PathBuf {
        self.job_dir(job_id).join("repo")
    }

    /// Create the job's directory.
    pub async fn allocate(&self, job_id: Uuid) -> Result<PathBuf> {
        let dir = self.job_dir(job_id);
        tokio::fs::create_dir_all(&dir).await?;
        debug!(path = %dir.display(), "workspace allocated");
        Ok(dir)
    }

    /// Remove the job's directory unless the arena retains workspaces.
    /// Failures are logged, never returned.
    pub async fn release(&self, job_id: Uuid) {
        if self.retain {
            return;
        }
        let dir = self.job_dir(job_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(path = %dir.display(), "workspace released"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %dir.display(), error = %e, "failed to remove workspace"),
        }
    }
}
