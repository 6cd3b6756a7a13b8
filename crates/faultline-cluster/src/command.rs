//! External control-script execution with bounded retry.
//!
//! Every cluster lifecycle operation goes through [`CommandRunner`]: a named
//! script under a configured directory, invoked once per attempt with the
//! target node names as arguments. Multi-node forms are a single joint
//! invocation; a failure against any node fails the whole attempt.

use crate::{Error, Result};
use faultline_config::LifecycleConfig;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Runs external control scripts and records every invocation to an
/// append-only log sink.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    scripts_dir: PathBuf,
    log_path: Option<PathBuf>,
}

impl CommandRunner {
    /// Creates a runner from the lifecycle configuration.
    pub fn new(lifecycle: &LifecycleConfig) -> Self {
        Self {
            scripts_dir: lifecycle.scripts_dir.clone(),
            log_path: lifecycle.command_log.clone(),
        }
    }

    /// Returns the directory the runner resolves scripts under.
    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    /// Runs `script` with `args`, retrying failed attempts.
    ///
    /// A retry budget of N allows up to N+1 attempts; the first attempt is
    /// free. A non-zero exit status or a spawn failure consumes one retry
    /// unit and sleeps `delay` before the next attempt. Exhausting the budget
    /// yields [`Error::Execution`]; a failure on the final attempt is never
    /// swallowed.
    pub async fn run(
        &self,
        script: &str,
        args: &[String],
        retries: u32,
        delay: Duration,
    ) -> Result<()> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let reason = match self.attempt(script, args, attempts).await {
                Ok(output) if output.status.success() => {
                    debug!(script, ?args, attempts, "script succeeded");
                    return Ok(());
                }
                Ok(output) => format!("exit status {:?}", output.status.code()),
                Err(err) => format!("spawn failed: {err}"),
            };

            if attempts > retries {
                return Err(Error::Execution {
                    script: script.to_string(),
                    targets: args.join(" "),
                    attempts,
                    reason,
                });
            }

            debug!(script, attempts, %reason, "attempt failed; retrying");
            sleep(delay).await;
        }
    }

    /// Runs `script` exactly once and reports whether it exited successfully.
    ///
    /// Used for status probes where a non-zero exit is an answer, not a
    /// failure. Spawn errors still surface as [`Error::Io`].
    pub async fn probe(&self, script: &str, args: &[String]) -> Result<bool> {
        let output = self.attempt(script, args, 1).await?;
        Ok(output.status.success())
    }

    async fn attempt(&self, script: &str, args: &[String], attempt: u32) -> std::io::Result<Output> {
        let path = self.scripts_dir.join(script);
        debug!(script = %path.display(), ?args, attempt, "running");

        let result = Command::new(&path).args(args).output().await;
        match &result {
            Ok(output) => {
                self.append_log(script, args, attempt, Some(output)).await;
            }
            Err(err) => {
                warn!(script, attempt, error = %err, "failed to spawn script");
                self.append_log(script, args, attempt, None).await;
            }
        }
        result
    }

    /// Appends the invocation and its combined output to the log sink.
    /// Log failures are traced and dropped; the sink is for post-mortem
    /// debugging only.
    async fn append_log(&self, script: &str, args: &[String], attempt: u32, output: Option<&Output>) {
        let Some(log_path) = &self.log_path else {
            return;
        };

        let mut record = format!("$ {} {} [attempt {}]\n", script, args.join(" "), attempt);
        match output {
            Some(output) => {
                record.push_str(&String::from_utf8_lossy(&output.stdout));
                record.push_str(&String::from_utf8_lossy(&output.stderr));
                record.push_str(&format!("= exit {:?}\n", output.status.code()));
            }
            None => record.push_str("= spawn failed\n"),
        }

        let opened = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .await;
        match opened {
            Ok(mut file) => {
                if let Err(err) = file.write_all(record.as_bytes()).await {
                    warn!(log = %log_path.display(), error = %err, "could not append to command log");
                }
            }
            Err(err) => {
                warn!(log = %log_path.display(), error = %err, "could not open command log");
            }
        }
    }
}
