//! Foreground pipeline run: `maintainer run <repo_url>`.
//!
//! Log lines go to stderr as they arrive; the final report is printed to
//! stdout as JSON. Ctrl+C cancels the run.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use maintainer::config::MaintainerConfig;
use maintainer::maintainer::pipeline::{JobContext, MaintenancePipeline, RepoPipeline};
use maintainer::maintainer::sink::{LogSink, redact};

pub async fn cmd_run(config: MaintainerConfig, repo_url: &str) -> Result<()> {
    let secrets = config.secrets();
    let pipeline = RepoPipeline::new(config).context("Invalid maintainer configuration")?;

    let job_id = Uuid::new_v4();
    let (sink, mut lines) = LogSink::channel(Some(job_id), secrets.clone());
    let printer = tokio::spawn(async move {
        let mut logs = Vec::new();
        while let Some(line) = lines.recv().await {
            eprintln!("{}", line);
            logs.push(line);
        }
        logs
    });

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            on_interrupt.cancel();
        }
    });

    let ctx = JobContext {
        job_id,
        sink,
        cancel,
    };
    let result = pipeline.run(repo_url, ctx).await;
    let logs = printer.await.context("Log printer task failed")?;

    match result {
        Ok(mut report) => {
            report.logs = logs;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e) => anyhow::bail!("Pipeline failed: {}", redact(&e.to_string(), &secrets)),
    }
}
