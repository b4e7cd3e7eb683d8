//! External command execution with live, line-by-line output streaming.
//!
//! Every git and docker invocation goes through [`ProcessRunner::run`]:
//! stdout and stderr are read concurrently and merged in arrival order, each
//! line is delivered to the job's [`LogSink`] as soon as it is read, and the
//! full transcript is returned on success or carried by the error on failure.
//!
//! Commands are spawned in their own process group so a deadline or a
//! cancellation kills the command together with everything it started.

use std::fmt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::sink::LogSink;
use crate::errors::{MaintainerError, Result};

/// A program plus its arguments. Never run through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

enum Exit {
    Finished(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Runs commands on behalf of one job.
#[derive(Clone)]
pub struct ProcessRunner {
    sink: LogSink,
    cancel: CancellationToken,
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(sink: LogSink, cancel: CancellationToken, timeout: Duration) -> Self {
        Self {
            sink,
            cancel,
            timeout,
        }
    }

    /// Same sink and cancellation token, different deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            sink: self.sink.clone(),
            cancel: self.cancel.clone(),
            timeout,
        }
    }

    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute `spec` in `cwd`, streaming every output line to the sink.
    ///
    /// Returns the captured output (lines joined by `\n`) on a zero exit.
    /// Fails with `ProcessFailure` on a non-zero exit, `TimedOut` when the
    /// deadline passes and `Cancelled` when the job is cancelled; all three
    /// carry whatever output was captured.
    pub async fn run(&self, spec: &CommandSpec, cwd: Option<&Path>) -> Result<String> {
        let shown = self.sink.scrub(&spec.to_string());
        debug!(command = %shown, cwd = ?cwd, "spawning command");

        if self.cancel.is_cancelled() {
            return Err(MaintainerError::Cancelled {
                command: shown,
                output: String::new(),
            });
        }

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| MaintainerError::Spawn {
            command: shown.clone(),
            source,
        })?;

        let (line_tx, mut line_rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, line_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, line_tx.clone()));
        }
        drop(line_tx);

        let mut captured: Vec<String> = Vec::new();
        let exit = tokio::select! {
            status = pump(&mut child, &mut line_rx, &self.sink, &mut captured) => Exit::Finished(status),
            () = tokio::time::sleep(self.timeout) => Exit::TimedOut,
            () = self.cancel.cancelled() => Exit::Cancelled,
        };

        match exit {
            Exit::Finished(status) => {
                let status = status?;
                let output = captured.join("\n");
                if status.success() {
                    Ok(output)
                } else {
                    debug!(command = %shown, code = ?status.code(), "command failed");
                    Err(MaintainerError::ProcessFailure {
                        command: shown,
                        exit_code: status.code(),
                        output,
                    })
                }
            }
            Exit::TimedOut => {
                warn!(command = %shown, timeout_secs = self.timeout.as_secs(), "command timed out; killing process group");
                terminate(&mut child).await;
                drain_remaining(&mut line_rx, &self.sink, &mut captured);
                Err(MaintainerError::TimedOut {
                    command: shown,
                    after: self.timeout,
                    output: captured.join("\n"),
                })
            }
            Exit::Cancelled => {
                warn!(command = %shown, "cancellation requested; killing process group");
                terminate(&mut child).await;
                drain_remaining(&mut line_rx, &self.sink, &mut captured);
                Err(MaintainerError::Cancelled {
                    command: shown,
                    output: captured.join("\n"),
                })
            }
        }
    }

    /// Convenience for commands that always run inside a directory.
    pub async fn run_in(&self, spec: &CommandSpec, dir: &Path) -> Result<String> {
        self.run(spec, Some(dir)).await
    }
}

/// Deliver lines until both pipes close, then reap the child.
async fn pump(
    child: &mut Child,
    lines: &mut mpsc::UnboundedReceiver<String>,
    sink: &LogSink,
    captured: &mut Vec<String>,
) -> std::io::Result<ExitStatus> {
    while let Some(line) = lines.recv().await {
        deliver(line, sink, captured);
    }
    child.wait().await
}

fn deliver(line: String, sink: &LogSink, captured: &mut Vec<String>) {
    let line = sink.scrub(&line);
    sink.emit(line.clone());
    captured.push(line);
}

/// Pick up lines already read before the kill so the transcript is complete.
fn drain_remaining(
    lines: &mut mpsc::UnboundedReceiver<String>,
    sink: &LogSink,
    captured: &mut Vec<String>,
) {
    while let Ok(line) = lines.try_recv() {
        deliver(line, sink, captured);
    }
}

async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                if tx.send(line).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to read command output");
                break;
            }
        }
    }
}

/// Kill the child's whole process group, then the child itself, and reap it.
async fn terminate(child: &mut Child) {
    kill_process_group(child);
    if let Err(e) = child.kill().await {
        debug!(error = %e, "child already exited");
    }
    let _ = child.wait().await;
}

#[cfg(unix)]
fn kill_process_group(child: &Child) {
    let Some(pid) = child.id() else {
        return;
    };
    // The child leads its own group (process_group(0)), so pgid == pid.
    let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        debug!(pid, "killpg failed; process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}
