// src/process.rs
//
// `run_step`:      spawn a build tool with the terminal attached, optionally
//                  with an imported environment layered over the inherited one.
// `capture`:       run a command and collect its output; `capture_within`
//                  adds a wall-clock ceiling.
// `run_to_stderr`: run a command with both of its streams sent to our stderr.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::Command;

use crate::env_map::EnvironmentMap;

// ─── Invocation ───────────────────────────────────────────────────────────────

/// A program, its arguments and an optional verbatim tail.
///
/// The tail is handed to the child untouched on Windows (`cmd.exe` does its
/// own quote parsing and mangles the escaping `Command::arg` applies); on
/// other platforms it is just the last argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub verbatim_tail: Option<String>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            verbatim_tail: None,
            cwd: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn verbatim_tail(mut self, tail: impl Into<String>) -> Self {
        self.verbatim_tail = Some(tail.into());
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: Option<&Path>) -> Self {
        self.cwd = dir.map(Path::to_path_buf);
        self
    }

    /// Human-readable command line for status output.
    #[must_use]
    pub fn display(&self) -> String {
        let mut s = self.program.clone();
        for a in self.args.iter().chain(self.verbatim_tail.iter()) {
            s.push(' ');
            s.push_str(a);
        }
        s
    }

    fn command(&self) -> Command {
        let mut builder = Command::new(&self.program);
        builder
            .args(&self.args)
            .stdin(Stdio::null())
            // Ensures no orphaned children if the runner is interrupted or
            // a bounded wait gives up.
            .kill_on_drop(true);

        if let Some(tail) = &self.verbatim_tail {
            #[cfg(windows)]
            builder.raw_arg(tail);
            #[cfg(not(windows))]
            builder.arg(tail);
        }
        if let Some(dir) = &self.cwd {
            builder.current_dir(dir);
        }
        builder
    }
}

/// Outcome of a bounded capture.
#[derive(Debug)]
pub enum Capture {
    Finished(Output),
    TimedOut,
}

/// Exit code of a finished child; termination by signal counts as 1.
#[must_use]
pub fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

// ─── Runners ──────────────────────────────────────────────────────────────────

/// Execute `inv`, inheriting stdio, and return its exit code.
///
/// `env` is layered over the inherited environment; it is read, never
/// modified.  `Err` only when the child cannot be spawned or awaited.
pub async fn run_step(inv: &Invocation, env: Option<&EnvironmentMap>) -> Result<i32> {
    let cmd = inv.display();
    println!("$ {cmd}");

    let mut builder = inv.command();
    if let Some(env) = env {
        builder.envs(env.iter());
    }

    let status = builder
        .status()
        .await
        .with_context(|| format!("Failed to spawn: {cmd}"))?;

    Ok(exit_code(status))
}

/// Run `inv` to completion and capture stdout+stderr.
pub async fn capture(inv: &Invocation) -> Result<Output> {
    let cmd = inv.display();
    log::debug!("capture: {cmd}");

    let mut builder = inv.command();
    builder.stdout(Stdio::piped()).stderr(Stdio::piped());

    builder
        .output()
        .await
        .with_context(|| format!("Failed to run: {cmd}"))
}

/// Like `capture`, but a child still running after `limit` is killed and
/// `Capture::TimedOut` returned.
pub async fn capture_within(inv: &Invocation, limit: Duration) -> Result<Capture> {
    match tokio::time::timeout(limit, capture(inv)).await {
        Ok(res) => res.map(Capture::Finished),
        Err(_) => {
            log::debug!("capture: gave up after {limit:?}");
            Ok(Capture::TimedOut)
        }
    }
}

/// Run `inv` with its stdout and stderr both routed to our stderr, so the
/// output is visible to an operator without touching our stdout.
pub async fn run_to_stderr(inv: &Invocation) -> Result<i32> {
    let cmd = inv.display();
    log::debug!("visible rerun: {cmd}");

    let mut builder = inv.command();
    builder.stdout(std::io::stderr()).stderr(std::io::stderr());

    let status = builder
        .status()
        .await
        .with_context(|| format!("Failed to spawn: {cmd}"))?;

    Ok(exit_code(status))
}

#[cfg(all(test, unix))]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sh(script: &str) -> Invocation {
        Invocation::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn display_joins_program_args_and_tail() {
        let inv = Invocation::new("cmd.exe").args(["/d", "/s", "/c"]).verbatim_tail("\"set\"");
        assert_eq!(inv.display(), "cmd.exe /d /s /c \"set\"");
    }

    #[tokio::test]
    async fn run_step_propagates_exit_code() {
        assert_eq!(run_step(&sh("exit 0"), None).await.unwrap(), 0);
        assert_eq!(run_step(&sh("exit 7"), None).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn run_step_layers_env_over_inherited() {
        let mut env = EnvironmentMap::new();
        env.insert("VALIDATOR_OVERLAY", "on");

        let code = run_step(&sh(r#"test "$VALIDATOR_OVERLAY" = on && test -n "$PATH""#), Some(&env))
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn run_step_spawn_failure_is_error() {
        let res = run_step(&Invocation::new("definitely-not-a-real-program-xyz"), None).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn capture_collects_stdout() {
        let out = capture(&sh("echo A=1")).await.unwrap();
        assert!(out.status.success());
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "A=1");
    }

    #[tokio::test]
    async fn capture_times_out() {
        let res = capture_within(&sh("sleep 5"), Duration::from_millis(100))
            .await
            .unwrap();
        assert!(matches!(res, Capture::TimedOut));
    }

    #[tokio::test]
    async fn visible_rerun_reports_exit_code() {
        assert_eq!(run_to_stderr(&sh("echo diag; exit 4")).await.unwrap(), 4);
    }
}
