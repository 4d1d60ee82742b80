// src/config.rs
//
// Runtime configuration assembled from the command line plus the ambient
// environment.  Everything the locator and importer need is resolved here
// once and passed down explicitly.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::cli::{ToolchainArgs, ValidateArgs};
use crate::env_source::EnvSource;
use crate::importer::ImportOptions;
use crate::locator::LocatorConfig;
use crate::presets::{Preset, DEFAULT_PRESETS};

/// Locator settings: platform defaults with command-line overrides applied.
#[must_use]
pub fn locator_config(args: &ToolchainArgs, env: &dyn EnvSource) -> LocatorConfig {
    let mut cfg = LocatorConfig::platform_default(env);
    if let Some(var) = &args.override_var {
        cfg.override_var.clone_from(var);
    }
    if !args.candidates.is_empty() {
        cfg.candidates.clone_from(&args.candidates);
    }
    if let Some(name) = &args.script_name {
        cfg.script_name.clone_from(name);
    }
    cfg
}

/// Importer settings for a given working directory.  The ceiling stays at
/// its default; only the in-process import applies it.
#[must_use]
pub fn import_options(args: &ToolchainArgs, cwd: Option<PathBuf>) -> ImportOptions {
    let mut opts = ImportOptions {
        cwd,
        ..ImportOptions::default()
    };
    if let Some(interp) = args.interpreter {
        opts.interpreter = interp;
    }
    opts
}

// ─── Validation run ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Project root; every step runs here.
    pub root: PathBuf,
    /// Presets in run order.
    pub presets: Vec<Preset>,
    pub locator: LocatorConfig,
    pub import: ImportOptions,
    /// Arguments for the vendor setup script.
    pub setup_args: Vec<String>,
    /// Configuration name `ctest` gets for multi-config generators.
    pub multi_config: String,
}

impl ValidatorConfig {
    /// # Errors
    ///
    /// * If no `--root` is given and the current directory cannot be read
    pub fn from_args(
        toolchain: &ToolchainArgs,
        validate: &ValidateArgs,
        env: &dyn EnvSource,
    ) -> Result<Self> {
        let root = match &validate.root {
            Some(r) => r.clone(),
            None => std::env::current_dir().context("Failed to read current directory")?,
        };

        let presets = if validate.presets.is_empty() {
            DEFAULT_PRESETS.iter().map(|n| Preset::new(n)).collect()
        } else {
            validate.presets.iter().map(|n| Preset::new(n)).collect()
        };

        Ok(Self {
            locator: locator_config(toolchain, env),
            import: ImportOptions {
                timeout: Duration::from_secs(validate.timeout_secs),
                ..import_options(toolchain, Some(root.clone()))
            },
            root,
            presets,
            setup_args: validate.setup_args.clone(),
            multi_config: validate.msvc_config.clone(),
        })
    }
}
