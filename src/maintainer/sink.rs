use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

const REDACTED: &str = "***";

/// Producer half of a job's log channel.
///
/// Stages push one line per call; a single consumer (the job's log drain)
/// appends them to the job record. Every line is scrubbed of known secrets
/// before it leaves the pipeline.
#[derive(Clone)]
pub struct LogSink {
    job_id: Option<Uuid>,
    tx: Option<mpsc::UnboundedSender<String>>,
    secrets: Arc<Vec<String>>,
}

impl LogSink {
    /// Create a sink and the receiver that drains it.
    pub fn channel(
        job_id: Option<Uuid>,
        secrets: Vec<String>,
    ) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self {
            job_id,
            tx: Some(tx),
            secrets: Arc::new(secrets.into_iter().filter(|s| !s.is_empty()).collect()),
        };
        (sink, rx)
    }

    /// A sink that only traces; lines go nowhere else.
    pub fn discard() -> Self {
        Self {
            job_id: None,
            tx: None,
            secrets: Arc::new(Vec::new()),
        }
    }

    /// Push a line. Lines sent after the consumer has gone away are dropped.
    pub fn emit(&self, line: impl Into<String>) {
        let line = self.scrub(&line.into());
        match self.job_id {
            Some(job_id) => tracing::debug!(%job_id, "{}", line),
            None => tracing::debug!("{}", line),
        }
        if let Some(tx) = &self.tx {
            let _ = tx.send(line);
        }
    }

    /// Replace every configured secret in `text` with a placeholder.
    pub fn scrub(&self, text: &str) -> String {
        redact(text, &self.secrets)
    }

    pub fn job_id(&self) -> Option<Uuid> {
        self.job_id
    }
}

/// Replace every non-empty entry of `secrets` in `text` with a placeholder.
pub fn redact(text: &str, secrets: &[String]) -> String {
    secrets
        .iter()
        .filter(|s| !s.is_empty())
        .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), REDACTED))
}
