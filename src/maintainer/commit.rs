use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use super::git::Git;
use crate::errors::{MaintainerError, Result};

/// Result of the commit/push stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommitOutcome {
    /// A commit was created and force-pushed to the fork.
    Committed { files: Vec<String> },
    /// The fix engine left the tree unchanged; nothing was pushed.
    NoChanges,
}

impl CommitOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Committed { .. } => "Commit & push done",
            Self::NoChanges => "No changes to commit",
        }
    }
}

/// Stage everything, commit it, and force-push `branch` to `origin`.
pub async fn commit_and_push(
    git: &Git,
    tree: &Path,
    message: &str,
    branch: &str,
) -> Result<CommitOutcome> {
    git.run(tree, ["add", "-A"]).await?;

    let files = staged_paths(tree.to_path_buf()).await?;
    if files.is_empty() {
        info!("working tree unchanged, skipping commit");
        return Ok(CommitOutcome::NoChanges);
    }

    git.run(tree, ["commit", "-m", message]).await?;
    git.run(tree, ["push", "--force", "origin", branch]).await?;
    info!(%branch, files = files.len(), "changes committed and pushed");
    Ok(CommitOutcome::Committed { files })
}

/// Paths whose index entry differs from HEAD.
async fn staged_paths(tree: PathBuf) -> Result<Vec<String>> {
    tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
        let repo = git2::Repository::open(&tree)?;
        let head_tree = match repo.head() {
            Ok(head) => Some(head.peel_to_tree()?),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => None,
            Err(e) => return Err(e.into()),
        };
        let diff = repo.diff_tree_to_index(head_tree.as_ref(), None, None)?;
        Ok(diff
            .deltas()
            .filter_map(|d| {
                d.new_file()
                    .path()
                    .or_else(|| d.old_file().path())
                    .map(|p| p.to_string_lossy().into_owned())
            })
            .collect())
    })
    .await
    .map_err(|e| MaintainerError::stage("commit", format!("index inspection panicked: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maintainer::testutil::{self, sh_git};

    fn checkout(tmp: &Path) -> (PathBuf, PathBuf) {
        let upstream = testutil::seed_upstream(tmp);
        let fork = testutil::fork_of(&upstream, tmp);
        let tree = tmp.join("repo");
        sh_git(
            tmp,
            &["clone", "-q", &fork.display().to_string(), &tree.display().to_string()],
        );
        sh_git(&tree, &["checkout", "-q", "-b", "ai-update"]);
        (fork, tree)
    }

    #[tokio::test]
    async fn test_changes_are_committed_and_force_pushed() {
        let tmp = tempfile::tempdir().unwrap();
        let (fork, tree) = checkout(tmp.path());
        std::fs::write(tree.join("README.md"), "fixed\n").unwrap();
        std::fs::write(tree.join("LICENSE"), "MIT\n").unwrap();

        let outcome = commit_and_push(&testutil::git(), &tree, "AI Maintainer update", "ai-update")
            .await
            .unwrap();

        match &outcome {
            CommitOutcome::Committed { files } => {
                assert_eq!(files.len(), 2);
                assert!(files.contains(&"README.md".to_string()));
                assert!(files.contains(&"LICENSE".to_string()));
            }
            other => panic!("expected Committed, got {:?}", other),
        }
        assert_eq!(outcome.message(), "Commit & push done");

        let log = sh_git(&fork, &["log", "--format=%s|%an", "-1", "ai-update"]);
        assert_eq!(log.trim(), "AI Maintainer update|Test Bot");
    }

    #[tokio::test]
    async fn test_unchanged_tree_is_no_changes_without_push() {
        let tmp = tempfile::tempdir().unwrap();
        let (_fork, tree) = checkout(tmp.path());
        // A push would fail against this remote.
        sh_git(&tree, &["remote", "set-url", "origin", "/nonexistent/fork.git"]);

        let outcome = commit_and_push(&testutil::git(), &tree, "msg", "ai-update")
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::NoChanges);
        assert_eq!(outcome.message(), "No changes to commit");
    }

    #[tokio::test]
    async fn test_push_failure_propagates() {
        let tmp = tempfile::tempdir().unwrap();
        let (_fork, tree) = checkout(tmp.path());
        sh_git(&tree, &["remote", "set-url", "origin", "/nonexistent/fork.git"]);
        std::fs::write(tree.join("README.md"), "fixed\n").unwrap();

        let err = commit_and_push(&testutil::git(), &tree, "msg", "ai-update")
            .await
            .unwrap_err();
        assert!(matches!(err, MaintainerError::ProcessFailure { .. }));
    }

    #[tokio::test]
    async fn test_deleted_file_counts_as_change() {
        let tmp = tempfile::tempdir().unwrap();
        let (_fork, tree) = checkout(tmp.path());
        std::fs::remove_file(tree.join("README.md")).unwrap();

        let outcome = commit_and_push(&testutil::git(), &tree, "msg", "ai-update")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CommitOutcome::Committed {
                files: vec!["README.md".to_string()]
            }
        );
    }
}
