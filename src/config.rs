//! Layered configuration for the maintainer.
//!
//! Values are resolved file → environment:
//! - built-in defaults
//! - `maintainer.toml` in the working directory (or an explicit `--config` path)
//! - environment variables (a `.env` file is loaded by the binary before this runs)
//!
//! # Configuration File Format
//!
//! ```toml
//! [github]
//! api_url = "https://api.github.com"
//! user = "maintainer-bot"
//!
//! [git]
//! branch = "ai-update"
//! commit_message = "AI Maintainer update"
//! command_timeout_secs = 600
//!
//! [git.config]
//! "http.proxy" = "http://proxy.internal:3128"
//!
//! [pull_request]
//! title = "AI Maintainer Update"
//!
//! [fix_engine]
//! program = "docker"
//! image = "ai-sandbox"
//! build_context = "./fix-engine"
//! mount_path = "/agent/repo"
//! timeout_secs = 1800
//!
//! [fix_engine.env]
//! MODEL = "small"
//!
//! [workspace]
//! root = ".maintainer/workspaces"
//! retain = false
//! ```
//!
//! The access token is only ever read from the environment (`GITHUB_TOK`,
//! falling back to `GITHUB_TOKEN`) so it never lands in a checked-in file.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{MaintainerError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "maintainer.toml";
pub const TOKEN_ENV: &str = "GITHUB_TOK";
pub const TOKEN_ENV_FALLBACK: &str = "GITHUB_TOKEN";
pub const USER_ENV: &str = "GITHUB_USER";
pub const API_URL_ENV: &str = "GITHUB_API_URL";

/// Hosting-provider credentials and endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct GitHubSettings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            user: None,
            token: None,
        }
    }
}

impl fmt::Debug for GitHubSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubSettings")
            .field("api_url", &self.api_url)
            .field("user", &self.user)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSettings {
    /// Working branch pushed to the fork and proposed upstream.
    pub branch: String,
    /// Upstream branch to sync and target. Looked up from the API when unset.
    pub base_branch: Option<String>,
    pub commit_message: String,
    pub author_name: String,
    pub author_email: String,
    /// Deadline applied to every git command.
    pub command_timeout_secs: u64,
    /// Extra `-c key=value` settings for every git command (proxies, CA
    /// bundles, URL rewrites).
    pub config: BTreeMap<String, String>,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            branch: "ai-update".to_string(),
            base_branch: None,
            commit_message: "AI Maintainer update".to_string(),
            author_name: "AI Maintainer".to_string(),
            author_email: "maintainer@users.noreply.github.com".to_string(),
            command_timeout_secs: 600,
            config: BTreeMap::new(),
        }
    }
}

impl GitSettings {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PullRequestSettings {
    pub title: String,
    pub body: String,
}

impl Default for PullRequestSettings {
    fn default() -> Self {
        Self {
            title: "AI Maintainer Update".to_string(),
            body: "Automated fixes and repository evolution by AI Agent.".to_string(),
        }
    }
}

/// Settings for the sandboxed fix-engine container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FixEngineSettings {
    /// Container CLI used for `build` and `run`.
    pub program: String,
    /// Image tag to build (or to run directly when `prebuilt` is set).
    pub image: String,
    /// Docker build context. When unset the cloned working tree is used.
    pub build_context: Option<PathBuf>,
    /// Skip `docker build` and run `image` as-is.
    pub prebuilt: bool,
    /// Where the working tree is mounted inside the container.
    pub mount_path: String,
    pub memory: Option<String>,
    pub cpus: Option<f64>,
    pub timeout_secs: u64,
    /// Extra environment passed to the container.
    pub env: BTreeMap<String, String>,
}

impl Default for FixEngineSettings {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
            image: "ai-sandbox".to_string(),
            build_context: None,
            prebuilt: false,
            mount_path: "/agent/repo".to_string(),
            memory: None,
            cpus: None,
            timeout_secs: 1800,
            env: BTreeMap::new(),
        }
    }
}

impl FixEngineSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSettings {
    pub root: PathBuf,
    /// Keep job directories after the job finishes (for debugging).
    pub retain: bool,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".maintainer/workspaces"),
            retain: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Complete maintainer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintainerConfig {
    pub github: GitHubSettings,
    pub git: GitSettings,
    pub pull_request: PullRequestSettings,
    pub fix_engine: FixEngineSettings,
    pub workspace: WorkspaceSettings,
    pub server: ServerSettings,
}

impl MaintainerConfig {
    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| MaintainerError::Configuration(format!("invalid TOML: {}", e)))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MaintainerError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Resolve the full configuration: explicit file, else `maintainer.toml`
    /// when present, else defaults; then apply the process environment.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::load(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overlay environment values. `lookup` is injectable so tests need not
    /// mutate the real process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty(TOKEN_ENV).or_else(|| non_empty(TOKEN_ENV_FALLBACK)) {
            self.github.token = Some(token.trim().to_string());
        }
        if let Some(user) = non_empty(USER_ENV) {
            self.github.user = Some(user.trim().to_string());
        }
        if let Some(api_url) = non_empty(API_URL_ENV) {
            self.github.api_url = api_url.trim().to_string();
        }
    }

    /// Fail fast when credentials needed by every pipeline run are missing.
    pub fn validate(&self) -> Result<()> {
        if self.github.token.is_none() {
            return Err(MaintainerError::Configuration(format!(
                "{} (or {}) is not set; a hosting-provider access token is required",
                TOKEN_ENV, TOKEN_ENV_FALLBACK
            )));
        }
        if self.github.user.is_none() {
            return Err(MaintainerError::Configuration(format!(
                "{} is not set; the fork owner account is required",
                USER_ENV
            )));
        }
        if self.git.branch.trim().is_empty() {
            return Err(MaintainerError::Configuration(
                "git.branch must not be empty".to_string(),
            ));
        }
        if self.fix_engine.program.trim().is_empty() {
            return Err(MaintainerError::Configuration(
                "fix_engine.program must not be empty".to_string(),
            ));
        }
        if self.fix_engine.mount_path.trim().is_empty() || !self.fix_engine.mount_path.starts_with('/') {
            return Err(MaintainerError::Configuration(format!(
                "fix_engine.mount_path must be an absolute container path, got '{}'",
                self.fix_engine.mount_path
            )));
        }
        Ok(())
    }

    /// The token, once `validate` has passed.
    pub fn token(&self) -> Result<&str> {
        self.github
            .token
            .as_deref()
            .ok_or_else(|| MaintainerError::Configuration(format!("{} is not set", TOKEN_ENV)))
    }

    /// The fork owner, once `validate` has passed.
    pub fn user(&self) -> Result<&str> {
        self.github
            .user
            .as_deref()
            .ok_or_else(|| MaintainerError::Configuration(format!("{} is not set", USER_ENV)))
    }

    /// Values that must never appear in logs.
    pub fn secrets(&self) -> Vec<String> {
        self.github.token.iter().cloned().collect()
    }
}
