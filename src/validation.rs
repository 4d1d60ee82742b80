// src/validation.rs
//
// The multi-preset run: for each preset in order, prepare the toolchain
// environment if it needs one, then configure, build and test.  A missing
// vendor toolchain skips its preset; any other failure ends the whole run.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::ValidatorConfig;
use crate::env_map::EnvironmentMap;
use crate::env_source::EnvSource;
use crate::importer::{ImportError, Importer};
use crate::locator::{Locator, LocatorConfig};
use crate::presets::{declared_presets, Preset, Step, StepKind, MANIFEST};
use crate::process::run_step;

pub const BANNER: &str = "======================================================================";
const RULE: &str = "--------------------------------------------------";

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("CMakePresets.json not found in {}", .0.display())]
    ManifestMissing(PathBuf),

    #[error("{step} failed for preset {preset} (exit {code})")]
    StepFailed {
        preset: String,
        step: StepKind,
        code: i32,
    },

    #[error("could not run {step} for preset {preset}: {message}")]
    Launch {
        preset: String,
        step: StepKind,
        message: String,
    },

    #[error("preset {preset}: {source}")]
    Toolchain {
        preset: String,
        #[source]
        source: ImportError,
    },
}

impl ValidationError {
    /// Process exit code: the failing tool's own code, 1 otherwise.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::StepFailed { code, .. } => *code,
            Self::Toolchain { source, .. } => source.exit_code(),
            Self::ManifestMissing(_) | Self::Launch { .. } => 1,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub passed: Vec<String>,
    pub skipped: Vec<String>,
}

// ─── Seams ────────────────────────────────────────────────────────────────────

/// Environment a toolchain needs before its steps can run.
#[derive(Debug)]
pub enum VendorEnv {
    Ready(EnvironmentMap),
    NotInstalled,
}

#[allow(async_fn_in_trait)]
pub trait VendorEnvProvider {
    async fn prepare(&self, preset: &Preset) -> Result<VendorEnv, ImportError>;
}

#[allow(async_fn_in_trait)]
pub trait StepRunner {
    /// Run one step and return its exit code.  `Err` means it never ran.
    async fn run(&mut self, step: &Step, env: Option<&EnvironmentMap>) -> anyhow::Result<i32>;
}

/// Runs steps as real child processes.
#[derive(Debug, Default)]
pub struct ProcessRunner;

impl StepRunner for ProcessRunner {
    async fn run(&mut self, step: &Step, env: Option<&EnvironmentMap>) -> anyhow::Result<i32> {
        run_step(&step.invocation, env).await
    }
}

/// Intel oneAPI: locate `setvars` and import what it sets.
pub struct OneApiEnv<'a> {
    locator: &'a LocatorConfig,
    env: &'a dyn EnvSource,
    importer: Importer,
    setup_args: &'a [String],
}

impl<'a> OneApiEnv<'a> {
    #[must_use]
    pub fn new(cfg: &'a ValidatorConfig, env: &'a dyn EnvSource) -> Self {
        Self {
            locator: &cfg.locator,
            env,
            importer: Importer::new(cfg.import.clone()),
            setup_args: &cfg.setup_args,
        }
    }
}

impl VendorEnvProvider for OneApiEnv<'_> {
    async fn prepare(&self, _preset: &Preset) -> Result<VendorEnv, ImportError> {
        let Some(script) = Locator::new(self.locator, self.env).locate_setup_script() else {
            return Ok(VendorEnv::NotInstalled);
        };

        println!("[Intel] Loading environment from: {} ...", script.display());
        let env = self
            .importer
            .import_environment(Some(&script), self.setup_args)
            .await?;
        Ok(VendorEnv::Ready(env))
    }
}

// ─── Run ──────────────────────────────────────────────────────────────────────

fn check_manifest(root: &Path, presets: &[Preset]) -> Result<(), ValidationError> {
    let manifest = root.join(MANIFEST);
    if !manifest.is_file() {
        return Err(ValidationError::ManifestMissing(root.to_path_buf()));
    }

    match declared_presets(&manifest) {
        Ok(declared) => {
            for p in presets.iter().filter(|p| !declared.contains(&p.name)) {
                log::warn!("preset {} is not declared in {MANIFEST}", p.name);
            }
        }
        Err(e) => log::warn!("{e:#}"),
    }
    Ok(())
}

/// Validate every preset in `cfg.presets`, in order.
///
/// # Errors
///
/// * `ManifestMissing` if the project root has no `CMakePresets.json`
/// * `Toolchain` if a vendor environment exists but cannot be imported
/// * `StepFailed` / `Launch` for the first step that fails; nothing after
///   it runs
pub async fn run_validation<V, R>(
    cfg: &ValidatorConfig,
    vendor: &V,
    runner: &mut R,
) -> Result<RunSummary, ValidationError>
where
    V: VendorEnvProvider,
    R: StepRunner,
{
    let names: Vec<&str> = cfg.presets.iter().map(|p| p.name.as_str()).collect();
    println!("{BANNER}");
    println!("   CROSS VALIDATION: {}", names.join(", "));
    println!("{BANNER}");
    println!("Project directory: {}", cfg.root.display());

    check_manifest(&cfg.root, &cfg.presets)?;

    let mut summary = RunSummary::default();

    for preset in &cfg.presets {
        println!("\n{RULE}");
        println!(" PRESET: {}", preset.name.to_uppercase());
        println!("{RULE}");

        let env = if preset.toolchain.needs_vendor_env() {
            match vendor.prepare(preset).await {
                Ok(VendorEnv::Ready(env)) => Some(env),
                Ok(VendorEnv::NotInstalled) => {
                    println!("[WARN] Toolchain for {} not installed; skipping.", preset.name);
                    summary.skipped.push(preset.name.clone());
                    continue;
                }
                Err(source) => {
                    return Err(ValidationError::Toolchain {
                        preset: preset.name.clone(),
                        source,
                    })
                }
            }
        } else {
            None
        };

        for step in preset.steps(&cfg.root, &cfg.multi_config) {
            println!("\n[Running] {} {}", step.kind, preset.name);

            let code = runner
                .run(&step, env.as_ref())
                .await
                .map_err(|e| ValidationError::Launch {
                    preset: preset.name.clone(),
                    step: step.kind,
                    message: format!("{e:#}"),
                })?;

            if code != 0 {
                return Err(ValidationError::StepFailed {
                    preset: preset.name.clone(),
                    step: step.kind,
                    code,
                });
            }
        }

        summary.passed.push(preset.name.clone());
    }

    Ok(summary)
}
