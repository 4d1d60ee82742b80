// src/importer.rs
//
// Import the environment produced by a vendor setup script.
//
// The script only mutates the environment of the interpreter session that
// runs it, so the importer runs it and dumps the full environment table in
// the same session, then parses that dump.  Two consumers:
//
// * `import_environment` — in-process: bounded wait, both key cases kept,
//   missing expected keys only warn.
// * `export_environment` — for rendering shell exports: unbounded wait, one
//   visible retry on failure, missing `INCLUDE` is fatal.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::env_map::{
    parse_env_dump, CaseMode, EnvironmentMap, CRITICAL_KEY, DEFAULT_ALLOW_LIST, EXPECTED_KEYS,
};
use crate::process::{capture, capture_within, run_to_stderr, Capture, Invocation};

/// Arguments passed to the setup script by the export variant when the
/// caller supplies none.
pub const DEFAULT_EXPORT_ARGS: &[&str] = &["intel64"];

/// Working-directory marker; `setvars.bat` chains into `VsDevCmd.bat`, which
/// stops with "STOP 1" when it cannot work out the caller's directory.
pub const START_DIR_MARKER: &str = "VSCMD_START_DIR";

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("setup script not found")]
    SetupScriptNotFound,

    #[error("setup script {} failed (exit {code})", .script.display())]
    SetupScriptExecutionFailed { script: PathBuf, code: i32 },

    #[error("setup script {} did not finish within {limit:?}", .script.display())]
    TimeoutExceeded { script: PathBuf, limit: Duration },

    #[error("{0} was not set by the setup script; the compiler environment did not load")]
    MissingCriticalVariable(String),

    #[error("could not run setup script: {0:#}")]
    Spawn(anyhow::Error),
}

impl ImportError {
    /// The script's own exit code when it ran and failed, 1 otherwise.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::SetupScriptExecutionFailed { code, .. } => *code,
            Self::SetupScriptNotFound
            | Self::TimeoutExceeded { .. }
            | Self::MissingCriticalVariable(_)
            | Self::Spawn(_) => 1,
        }
    }
}

// ─── Interpreter ──────────────────────────────────────────────────────────────

/// Command interpreter the setup script runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Interpreter {
    /// `cmd.exe` running a `.bat` script, dumped with `set`.
    Cmd,
    /// POSIX `sh` sourcing a `.sh` script, dumped with `env`.
    Sh,
}

impl Interpreter {
    #[must_use]
    pub const fn platform_default() -> Self {
        if cfg!(windows) {
            Self::Cmd
        } else {
            Self::Sh
        }
    }

    /// Composite command line: set the marker, run the script, dump the
    /// environment.  With `quiet`, the script's own output is discarded so
    /// only the dump reaches the captured stream.
    #[must_use]
    pub fn command_line(
        self,
        script: &Path,
        args: &[String],
        marker: Option<&str>,
        quiet: bool,
    ) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(3);
        match self {
            Self::Cmd => {
                if let Some(m) = marker {
                    parts.push(format!("set \"{m}=%CD%\""));
                }
                let mut call = format!("call \"{}\"", script.display());
                for a in args {
                    call.push(' ');
                    call.push_str(a);
                }
                if quiet {
                    call.push_str(" > nul 2>&1");
                }
                parts.push(call);
                parts.push("set".to_owned());
            }
            Self::Sh => {
                if let Some(m) = marker {
                    parts.push(format!("{m}=\"$PWD\"; export {m}"));
                }
                // `set --` makes the arguments visible to the sourced script
                // even in shells whose `.` ignores extra operands.
                let mut call = String::from("set --");
                for a in args {
                    call.push(' ');
                    call.push_str(&sh_quote(a));
                }
                call.push_str("; . ");
                call.push_str(&sh_quote(&script.to_string_lossy()));
                if quiet {
                    call.push_str(" >/dev/null 2>&1");
                }
                parts.push(call);
                parts.push("env".to_owned());
            }
        }
        parts.join(" && ")
    }

    /// Wrap a composite command line into a runnable invocation.
    #[must_use]
    pub fn invocation(self, line: String, cwd: Option<&Path>) -> Invocation {
        match self {
            // `/s` strips exactly the outer quote pair and keeps the rest.
            Self::Cmd => Invocation::new("cmd.exe")
                .args(["/d", "/s", "/c"])
                .verbatim_tail(format!("\"{line}\"")),
            Self::Sh => Invocation::new("sh").arg("-c").arg(line),
        }
        .current_dir(cwd)
    }
}

fn sh_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

// ─── Options ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub interpreter: Interpreter,
    /// Name of the working-directory marker variable, `None` to skip it.
    pub start_dir_marker: Option<String>,
    /// Ceiling for the in-process variant.
    pub timeout: Duration,
    pub allow_list: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            interpreter: Interpreter::platform_default(),
            start_dir_marker: Some(START_DIR_MARKER.to_owned()),
            timeout: Duration::from_secs(300),
            allow_list: DEFAULT_ALLOW_LIST.iter().map(|s| (*s).to_owned()).collect(),
            cwd: None,
        }
    }
}

// ─── Importer ─────────────────────────────────────────────────────────────────

pub struct Importer {
    options: ImportOptions,
}

impl Importer {
    #[must_use]
    pub fn new(options: ImportOptions) -> Self {
        Self { options }
    }

    fn invocation(&self, script: &Path, args: &[String], quiet: bool) -> Invocation {
        let line = self.options.interpreter.command_line(
            script,
            args,
            self.options.start_dir_marker.as_deref(),
            quiet,
        );
        log::debug!("setup command: {line}");
        self.options
            .interpreter
            .invocation(line, self.options.cwd.as_deref())
    }

    fn filter(&self, env: &EnvironmentMap) -> EnvironmentMap {
        let allow: Vec<&str> = self.options.allow_list.iter().map(String::as_str).collect();
        env.filter(&allow)
    }

    /// In-process import for spawning build tools.
    ///
    /// # Errors
    ///
    /// * `SetupScriptNotFound` if `script` is `None`
    /// * `TimeoutExceeded` if the script outlives `ImportOptions::timeout`
    /// * `SetupScriptExecutionFailed` if the session exits non-zero
    pub async fn import_environment(
        &self,
        script: Option<&Path>,
        extra_args: &[String],
    ) -> Result<EnvironmentMap, ImportError> {
        let script = script.ok_or(ImportError::SetupScriptNotFound)?;
        let inv = self.invocation(script, extra_args, true);

        let limit = self.options.timeout;
        let output = match capture_within(&inv, limit).await.map_err(ImportError::Spawn)? {
            Capture::Finished(out) => out,
            Capture::TimedOut => {
                return Err(ImportError::TimeoutExceeded {
                    script: script.to_path_buf(),
                    limit,
                })
            }
        };

        if !output.status.success() {
            log::debug!(
                "setup stderr: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(ImportError::SetupScriptExecutionFailed {
                script: script.to_path_buf(),
                code: crate::process::exit_code(output.status),
            });
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        let env = self.filter(&parse_env_dump(&raw, CaseMode::UpperAndOriginal));

        let missing = env.missing(EXPECTED_KEYS);
        if !missing.is_empty() {
            log::warn!(
                "setup script ran but did not set: {} (continuing)",
                missing.join(", ")
            );
        }

        if env.is_empty() {
            log::warn!("setup script {} set no compiler variables", script.display());
        } else {
            log::debug!("imported {} variables from {}", env.len(), script.display());
        }
        Ok(env)
    }

    /// Import for export rendering.  Empty `extra_args` means
    /// `DEFAULT_EXPORT_ARGS`.
    ///
    /// # Errors
    ///
    /// * `SetupScriptNotFound` if `script` is `None`
    /// * `SetupScriptExecutionFailed` if the session exits non-zero; the
    ///   script is first re-run once with its output on stderr
    /// * `MissingCriticalVariable` if `INCLUDE` is absent afterwards
    pub async fn export_environment(
        &self,
        script: Option<&Path>,
        extra_args: &[String],
    ) -> Result<EnvironmentMap, ImportError> {
        let script = script.ok_or(ImportError::SetupScriptNotFound)?;
        let args: Vec<String> = if extra_args.is_empty() {
            DEFAULT_EXPORT_ARGS.iter().map(|s| (*s).to_owned()).collect()
        } else {
            extra_args.to_vec()
        };

        let inv = self.invocation(script, &args, true);
        let output = capture(&inv).await.map_err(ImportError::Spawn)?;

        if !output.status.success() {
            let code = crate::process::exit_code(output.status);
            eprintln!("Warning: setup script failed (exit {code}). Retrying with visible output...");
            let visible = self.invocation(script, &args, false);
            if let Err(e) = run_to_stderr(&visible).await {
                eprintln!("{e:#}");
            }
            return Err(ImportError::SetupScriptExecutionFailed {
                script: script.to_path_buf(),
                code,
            });
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        let env = self.filter(&parse_env_dump(&raw, CaseMode::UpperOnly));

        if !env.contains_key(CRITICAL_KEY) {
            return Err(ImportError::MissingCriticalVariable(CRITICAL_KEY.to_owned()));
        }
        Ok(env)
    }
}
