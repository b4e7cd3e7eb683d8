//! Typed error hierarchy for the maintainer pipeline.
//!
//! Every stage returns `Result<T, MaintainerError>`. Failures that a stage
//! expects as part of idempotent operation (fork already exists, nothing to
//! commit, ...) never surface here; they are outcome variants of the stage
//! itself. What does surface is recorded verbatim as a job's terminal error.

use std::time::Duration;

use thiserror::Error;

/// Errors from the maintenance pipeline and the components it drives.
#[derive(Debug, Error)]
pub enum MaintainerError {
    /// An external command exited with a non-zero status.
    #[error("Command `{command}` failed with exit code {}:\n{output}", display_code(.exit_code))]
    ProcessFailure {
        command: String,
        exit_code: Option<i32>,
        output: String,
    },

    /// An external command could not be started at all.
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// An external command outlived its deadline and was killed.
    #[error("Command `{command}` timed out after {}s:\n{output}", .after.as_secs())]
    TimedOut {
        command: String,
        after: Duration,
        output: String,
    },

    /// The job was cancelled while a command was running.
    #[error("Command `{command}` was cancelled")]
    Cancelled { command: String, output: String },

    /// A hosting API call returned a status the caller does not handle.
    #[error("{operation} returned unexpected status {status}: {body}")]
    TransportFailure {
        operation: String,
        status: u16,
        body: String,
    },

    /// The HTTP request itself failed (DNS, TLS, connection reset, bad JSON).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A stage could not complete after its built-in fallbacks.
    #[error("{stage} stage failed: {message}")]
    StageFailure { stage: &'static str, message: String },

    /// Required credentials or settings are missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The caller-supplied repository reference cannot be interpreted.
    #[error("Invalid repository reference '{input}': {reason}")]
    InvalidReference { input: String, reason: String },

    #[error("Docker API error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("Git repository error: {0}")]
    Git(#[from] git2::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (killed by signal)".to_string(),
    }
}

impl MaintainerError {
    pub fn stage(stage: &'static str, message: impl Into<String>) -> Self {
        Self::StageFailure {
            stage,
            message: message.into(),
        }
    }

    /// Captured output of a failed or interrupted command, if this error carries one.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::ProcessFailure { output, .. }
            | Self::TimedOut { output, .. }
            | Self::Cancelled { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

pub type Result<T> = std::result::Result<T, MaintainerError>;
