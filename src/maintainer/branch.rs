use std::path::Path;

use serde::Serialize;
use tracing::info;

use super::git::Git;
use crate::errors::{MaintainerError, Result};

/// How the working branch became current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchOutcome {
    Created,
    CheckedOut,
}

/// Make `name` the current branch of `tree`, creating it from HEAD if needed.
pub async fn ensure_branch(git: &Git, tree: &Path, name: &str) -> Result<BranchOutcome> {
    let create_err = match git.run(tree, ["checkout", "-b", name]).await {
        Ok(_) => {
            info!(branch = %name, "branch created");
            return Ok(BranchOutcome::Created);
        }
        Err(e @ MaintainerError::ProcessFailure { .. }) => e,
        Err(e) => return Err(e),
    };

    match git.run(tree, ["checkout", name]).await {
        Ok(_) => {
            info!(branch = %name, "branch checked out");
            Ok(BranchOutcome::CheckedOut)
        }
        Err(MaintainerError::ProcessFailure { output, .. }) => Err(MaintainerError::stage(
            "branch",
            format!(
                "could not create or check out '{}':\n{}\n{}",
                name,
                create_err.output().unwrap_or_default(),
                output
            ),
        )),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maintainer::testutil::{self, sh_git};

    fn checkout(tmp: &Path) -> std::path::PathBuf {
        let upstream = testutil::seed_upstream(tmp);
        let tree = tmp.join("repo");
        sh_git(
            tmp,
            &["clone", "-q", &upstream.display().to_string(), &tree.display().to_string()],
        );
        tree
    }

    #[tokio::test]
    async fn test_first_call_creates_second_checks_out() {
        let tmp = tempfile::tempdir().unwrap();
        let tree = checkout(tmp.path());
        let git = testutil::git();

        assert_eq!(
            ensure_branch(&git, &tree, "ai-update").await.unwrap(),
            BranchOutcome::Created
        );
        sh_git(&tree, &["checkout", "-q", "main"]);
        assert_eq!(
            ensure_branch(&git, &tree, "ai-update").await.unwrap(),
            BranchOutcome::CheckedOut
        );
        let current = sh_git(&tree, &["rev-parse", "--abbrev-ref", "HEAD"]);
        assert_eq!(current.trim(), "ai-update");
    }

    #[tokio::test]
    async fn test_invalid_branch_name_is_stage_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let tree = checkout(tmp.path());
        let git = testutil::git();

        let err = ensure_branch(&git, &tree, "bad..name").await.unwrap_err();
        match err {
            MaintainerError::StageFailure { stage, message } => {
                assert_eq!(stage, "branch");
                assert!(message.contains("bad..name"));
            }
            other => panic!("expected StageFailure, got {:?}", other),
        }
    }
}
