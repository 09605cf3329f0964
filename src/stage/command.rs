// src/stage/command.rs

use std::process::Stdio;

use anyhow::{Context, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::sched::RunContext;
use crate::stage::{BoxFuture, Stage};

/// Stage that runs a shell command to completion.
///
/// This is what `[task.<name>]` sections bind to. The paths that triggered a
/// watch run are exposed to the command as the `PIPEWATCH_CHANGED`
/// environment variable (space-separated, empty for explicit runs).
pub struct CommandStage {
    cmd: String,
}

impl CommandStage {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

impl Stage for CommandStage {
    fn run(&self, ctx: RunContext) -> BoxFuture<anyhow::Result<()>> {
        let cmd = self.cmd.clone();
        Box::pin(async move { run_command(&cmd, ctx).await })
    }
}

async fn run_command(cmd: &str, ctx: RunContext) -> anyhow::Result<()> {
    debug!(cmd, "starting stage process");

    // Build a shell command appropriate for the platform.
    let mut shell = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    shell
        .env("PIPEWATCH_CHANGED", ctx.changed.join(" "))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = shell.spawn().with_context(|| format!("spawning `{cmd}`"))?;

    // Drain both pipes so the child never blocks on a full buffer.
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("stdout: {line}");
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("stderr: {line}");
            }
        });
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for `{cmd}`"))?;

    if !status.success() {
        bail!(
            "command `{cmd}` exited with status {}",
            status.code().unwrap_or(-1)
        );
    }
    Ok(())
}
