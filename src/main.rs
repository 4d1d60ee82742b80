// src/main.rs — toolchain-validator entry point.

mod cli;
mod config;
mod env_map;
mod env_source;
mod exports;
mod importer;
mod locator;
mod presets;
mod process;
mod validation;

use std::io::Write;

use clap::Parser;

use cli::{Cli, Commands, ToolchainArgs, ValidateArgs};
use config::{import_options, locator_config, ValidatorConfig};
use env_source::{EnvSource, SystemEnv};
use exports::{render_exports, PathStyle};
use importer::Importer;
use locator::Locator;
use validation::{run_validation, OneApiEnv, ProcessRunner, BANNER};

fn main() {
    // ── 0. Diagnostics on stderr, RUST_LOG overrides ──────────────────────────
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let Cli { toolchain, command } = Cli::parse();

    // ── 1. Tokio runtime ──────────────────────────────────────────────────────
    // One thread: every child process is awaited before the next one starts.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("[ERROR] Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    // ── 2. Dispatch ───────────────────────────────────────────────────────────
    let env = SystemEnv;
    let code = runtime.block_on(async {
        match command {
            None => validate(&toolchain, &ValidateArgs::default(), &env).await,
            Some(Commands::Validate(args)) => validate(&toolchain, &args, &env).await,
            Some(Commands::Locate) => locate(&toolchain, &env, &mut std::io::stdout()),
            Some(Commands::Exports { style, args }) => {
                exports(&toolchain, style, &args, &env, &mut std::io::stdout()).await
            }
        }
    });

    drop(runtime);
    std::process::exit(code);
}

// ─── Subcommands ──────────────────────────────────────────────────────────────

async fn validate(toolchain: &ToolchainArgs, args: &ValidateArgs, env: &dyn EnvSource) -> i32 {
    let cfg = match ValidatorConfig::from_args(toolchain, args, env) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("[ERROR] {e:#}");
            return 1;
        }
    };

    let vendor = OneApiEnv::new(&cfg, env);
    match run_validation(&cfg, &vendor, &mut ProcessRunner).await {
        Ok(summary) => {
            println!("\n{BANNER}");
            if summary.skipped.is_empty() {
                println!(" SUCCESS: every preset configured, built and passed its tests.");
            } else {
                println!(
                    " SUCCESS: {} passed; skipped (not installed): {}",
                    summary.passed.join(", "),
                    summary.skipped.join(", ")
                );
            }
            println!("{BANNER}");
            0
        }
        Err(e) => {
            println!("\n[ERROR] {e}");
            println!("Stopping to avoid cascading errors.");
            e.exit_code()
        }
    }
}

/// Print the setup script path to `out`; 1 when it is not installed.
fn locate(toolchain: &ToolchainArgs, env: &dyn EnvSource, out: &mut impl Write) -> i32 {
    let cfg = locator_config(toolchain, env);
    let Some(script) = Locator::new(&cfg, env).locate_setup_script() else {
        return 1;
    };
    emit(out, &[script.display().to_string()])
}

/// Print `export` statements to `out`.  Only statements go there; warnings,
/// the visible retry and errors go to stderr.
async fn exports(
    toolchain: &ToolchainArgs,
    style: PathStyle,
    args: &[String],
    env: &dyn EnvSource,
    out: &mut impl Write,
) -> i32 {
    let cfg = locator_config(toolchain, env);
    let Some(script) = Locator::new(&cfg, env).locate_setup_script() else {
        eprintln!("ERROR: Intel oneAPI setup script ({}) not found", cfg.script_name);
        return 1;
    };

    let importer = Importer::new(import_options(toolchain, None));
    match importer.export_environment(Some(&script), args).await {
        Ok(imported) => emit(out, &render_exports(&imported, style)),
        Err(e) => {
            eprintln!("ERROR: {e}");
            e.exit_code()
        }
    }
}

fn emit(out: &mut impl Write, lines: &[String]) -> i32 {
    let written = lines
        .iter()
        .try_for_each(|line| writeln!(out, "{line}"))
        .and_then(|()| out.flush());
    match written {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("ERROR: failed to write output: {e}");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::env_source::MapEnv;
    use crate::importer::Interpreter;

    /// Toolchain options pointing only at `root`, with the real environment
    /// kept out of discovery.
    fn toolchain_at(root: &Path) -> ToolchainArgs {
        ToolchainArgs {
            override_var: Some("VALIDATOR_TEST_ONEAPI_ROOT".to_owned()),
            candidates: vec![root.to_path_buf()],
            script_name: Some("setvars.sh".to_owned()),
            interpreter: Some(Interpreter::Sh),
        }
    }

    fn install(body: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("oneapi");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("setvars.sh"), body).unwrap();
        (dir, root)
    }

    #[test]
    fn locate_prints_the_script_path() {
        let (_dir, root) = install("true\n");
        let mut out = Vec::new();

        let code = locate(&toolchain_at(&root), &MapEnv::new(), &mut out);

        assert_eq!(code, 0);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("{}\n", root.join("setvars.sh").display())
        );
    }

    #[test]
    fn locate_not_installed_exits_one_silently() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();

        let code = locate(&toolchain_at(&dir.path().join("missing")), &MapEnv::new(), &mut out);

        assert_eq!(code, 1);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn exports_not_installed_exits_one() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();

        let code = exports(
            &toolchain_at(&dir.path().join("missing")),
            PathStyle::Msys,
            &[],
            &MapEnv::new(),
            &mut out,
        )
        .await;

        assert_eq!(code, 1);
        assert!(out.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exports_stream_holds_only_statements() {
        let (_dir, root) = install(
            "echo 'loading oneAPI'\n\
             echo 'diagnostic' >&2\n\
             INCLUDE='C:\\X\\include'; export INCLUDE\n\
             ONEAPI_ROOT='C:\\IntelOneAPI'; export ONEAPI_ROOT\n",
        );
        let mut out = Vec::new();

        let code = exports(&toolchain_at(&root), PathStyle::Msys, &[], &MapEnv::new(), &mut out).await;

        assert_eq!(code, 0);
        let text = String::from_utf8(out).unwrap();
        assert!(text.lines().all(|l| l.starts_with("export ")), "{text}");
        assert!(text.lines().any(|l| l == r#"export INCLUDE="C:\\X\\include""#), "{text}");
        assert!(text.lines().any(|l| l == r#"export ONEAPI_ROOT="C:\\IntelOneAPI""#), "{text}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exports_script_failure_keeps_stdout_clean() {
        let (_dir, root) = install("echo 'partial output'\nexit 3\n");
        let mut out = Vec::new();

        let code = exports(&toolchain_at(&root), PathStyle::Msys, &[], &MapEnv::new(), &mut out).await;

        assert_eq!(code, 3);
        assert!(out.is_empty());
    }
}
