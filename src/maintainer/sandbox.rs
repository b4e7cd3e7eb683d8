//! Fix-engine invocation: build the sandbox image and run it against the
//! job's working tree.
//!
//! The container's only contract is to edit files under the mount path in
//! place. Its output is treated like any other command's output and its
//! exit code decides success.

use std::path::{Path, PathBuf};

use bollard::Docker;
use bollard::query_parameters::RemoveContainerOptions;
use tracing::{info, warn};
use uuid::Uuid;

use super::process::{CommandSpec, ProcessRunner};
use crate::config::FixEngineSettings;
use crate::errors::{MaintainerError, Result};

const CONTAINER_PREFIX: &str = "maintainer";

pub struct FixEngine {
    settings: FixEngineSettings,
}

impl FixEngine {
    pub fn new(settings: FixEngineSettings) -> Self {
        Self { settings }
    }

    /// Per-job container name, so concurrent jobs never collide.
    pub fn container_name(job_id: Option<Uuid>) -> String {
        format!(
            "{}-{}",
            CONTAINER_PREFIX,
            job_id.unwrap_or_else(Uuid::new_v4).simple()
        )
    }

    /// The image build context: the configured directory, else the tree itself.
    pub fn build_context(&self, tree: &Path) -> PathBuf {
        self.settings
            .build_context
            .clone()
            .unwrap_or_else(|| tree.to_path_buf())
    }

    pub fn build_command(&self, context: &Path) -> CommandSpec {
        CommandSpec::new(&self.settings.program)
            .args(["build", "-t", self.settings.image.as_str()])
            .arg(context.display().to_string())
    }

    pub fn run_command(&self, container: &str, tree: &Path) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.settings.program)
            .args(["run", "--rm", "--name", container])
            .arg("-v")
            .arg(format!(
                "{}:{}:rw",
                tree.display(),
                self.settings.mount_path
            ));
        if let Some(memory) = &self.settings.memory {
            spec = spec.arg("--memory").arg(memory.as_str());
        }
        if let Some(cpus) = self.settings.cpus {
            spec = spec.arg("--cpus").arg(cpus.to_string());
        }
        for (key, value) in &self.settings.env {
            spec = spec.arg("-e").arg(format!("{}={}", key, value));
        }
        spec.arg(self.settings.image.as_str())
    }

    /// Build (unless prebuilt) and run the fix engine over `tree`.
    pub async fn execute(&self, runner: &ProcessRunner, tree: &Path) -> Result<()> {
        let runner = runner.with_timeout(self.settings.timeout());
        let tree = tokio::fs::canonicalize(tree).await?;

        if self.settings.prebuilt {
            info!(image = %self.settings.image, "using prebuilt fix-engine image");
        } else {
            let context = self.build_context(&tree);
            runner.run(&self.build_command(&context), None).await?;
        }

        let container = Self::container_name(runner.sink().job_id());
        info!(%container, "starting fix engine");
        match runner.run(&self.run_command(&container, &tree), None).await {
            Ok(_) => Ok(()),
            Err(e @ (MaintainerError::TimedOut { .. } | MaintainerError::Cancelled { .. })) => {
                force_remove(&container).await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

/// Killing the `docker run` client does not stop the container; remove it
/// through the daemon instead.
async fn force_remove(container: &str) {
    let docker = match Docker::connect_with_local_defaults() {
        Ok(docker) => docker,
        Err(e) => {
            warn!(%container, error = %e, "cannot reach Docker to remove container");
            return;
        }
    };
    let options = RemoveContainerOptions {
        force: true,
        ..Default::default()
    };
    match docker.remove_container(container, Some(options)).await {
        Ok(()) => info!(%container, "container removed"),
        Err(e) => warn!(%container, error = %e, "failed to remove container"),
    }
}
